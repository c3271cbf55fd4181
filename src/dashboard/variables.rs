//! Variable loading context
//!
//! Dashboard variables are loaded per scope: once for the dashboard, per tab,
//! or per panel. A variable whose query references other variables may only
//! load once those are settled. Lookups fall back from a panel to its tab
//! and then to the dashboard, so a panel variable can depend on a global one.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Level a variable is defined at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableScope {
    Global,
    Tabs,
    Panels,
}

/// `(scope, tab_id, panel_id)` identifying one set of variables
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableScopeKey {
    pub scope: VariableScope,
    pub tab_id: Option<String>,
    pub panel_id: Option<String>,
}

impl VariableScopeKey {
    pub fn global() -> Self {
        Self {
            scope: VariableScope::Global,
            tab_id: None,
            panel_id: None,
        }
    }

    pub fn tab(tab_id: impl Into<String>) -> Self {
        Self {
            scope: VariableScope::Tabs,
            tab_id: Some(tab_id.into()),
            panel_id: None,
        }
    }

    pub fn panel(tab_id: impl Into<String>, panel_id: impl Into<String>) -> Self {
        Self {
            scope: VariableScope::Panels,
            tab_id: Some(tab_id.into()),
            panel_id: Some(panel_id.into()),
        }
    }

    /// Enclosing scope, `None` for the dashboard itself
    pub fn parent(&self) -> Option<Self> {
        match self.scope {
            VariableScope::Global => None,
            VariableScope::Tabs => Some(Self::global()),
            VariableScope::Panels => Some(match &self.tab_id {
                Some(tab_id) => Self::tab(tab_id.clone()),
                None => Self::global(),
            }),
        }
    }
}

/// Which variables are currently loading, per scope
///
/// Owned by the dashboard and passed to whatever loads variables.
#[derive(Debug, Clone, Default)]
pub struct VariableLoadContext {
    loading: HashMap<VariableScopeKey, HashSet<String>>,
}

impl VariableLoadContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_loading(&mut self, key: &VariableScopeKey, variable: &str, loading: bool) {
        if loading {
            self.loading
                .entry(key.clone())
                .or_default()
                .insert(variable.to_string());
        } else if let Some(names) = self.loading.get_mut(key) {
            names.remove(variable);
            if names.is_empty() {
                self.loading.remove(key);
            }
        }

        tracing::trace!(scope = ?key.scope, variable = %variable, loading, "Variable loading state");
    }

    /// Whether `variable` is loading in `key` or any enclosing scope
    pub fn is_loading(&self, key: &VariableScopeKey, variable: &str) -> bool {
        let mut current = Some(key.clone());
        while let Some(scope) = current {
            if self
                .loading
                .get(&scope)
                .is_some_and(|names| names.contains(variable))
            {
                return true;
            }
            current = scope.parent();
        }
        false
    }

    /// True only when none of `dependencies` is still loading
    pub fn can_load<S: AsRef<str>>(&self, key: &VariableScopeKey, dependencies: &[S]) -> bool {
        dependencies
            .iter()
            .all(|dep| !self.is_loading(key, dep.as_ref()))
    }

    /// Forget the loading state of one scope
    pub fn clear_scope(&mut self, key: &VariableScopeKey) {
        self.loading.remove(key);
    }

    pub fn clear(&mut self) {
        self.loading.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_clear_loading() {
        let mut ctx = VariableLoadContext::new();
        let global = VariableScopeKey::global();

        ctx.set_loading(&global, "region", true);
        assert!(ctx.is_loading(&global, "region"));
        assert!(!ctx.is_loading(&global, "host"));

        ctx.set_loading(&global, "region", false);
        assert!(!ctx.is_loading(&global, "region"));
    }

    #[test]
    fn test_can_load_waits_for_dependencies() {
        let mut ctx = VariableLoadContext::new();
        let global = VariableScopeKey::global();

        ctx.set_loading(&global, "region", true);
        assert!(!ctx.can_load(&global, &["region", "cluster"]));
        assert!(ctx.can_load(&global, &["cluster"]));
        assert!(ctx.can_load::<&str>(&global, &[]));

        ctx.set_loading(&global, "region", false);
        assert!(ctx.can_load(&global, &["region", "cluster"]));
    }

    #[test]
    fn test_panel_sees_enclosing_scopes() {
        let mut ctx = VariableLoadContext::new();
        let panel = VariableScopeKey::panel("t1", "p1");
        let other_panel = VariableScopeKey::panel("t2", "p1");

        ctx.set_loading(&VariableScopeKey::global(), "region", true);
        ctx.set_loading(&VariableScopeKey::tab("t1"), "service", true);

        assert!(ctx.is_loading(&panel, "region"));
        assert!(ctx.is_loading(&panel, "service"));
        assert!(!ctx.is_loading(&other_panel, "service"));
        // enclosing scopes do not see inner ones
        ctx.set_loading(&panel, "pod", true);
        assert!(!ctx.is_loading(&VariableScopeKey::tab("t1"), "pod"));
    }

    #[test]
    fn test_clear_scope() {
        let mut ctx = VariableLoadContext::new();
        let tab = VariableScopeKey::tab("t1");
        ctx.set_loading(&tab, "a", true);
        ctx.set_loading(&VariableScopeKey::global(), "b", true);

        ctx.clear_scope(&tab);
        assert!(!ctx.is_loading(&tab, "a"));
        assert!(ctx.is_loading(&tab, "b"));

        ctx.clear();
        assert!(!ctx.is_loading(&tab, "b"));
    }

    #[test]
    fn test_parent_chain() {
        let panel = VariableScopeKey::panel("t1", "p1");
        assert_eq!(panel.parent(), Some(VariableScopeKey::tab("t1")));
        assert_eq!(
            VariableScopeKey::tab("t1").parent(),
            Some(VariableScopeKey::global())
        );
        assert_eq!(VariableScopeKey::global().parent(), None);
    }
}
