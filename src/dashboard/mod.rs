//! Dashboard support
//!
//! - **Variables**: loading state for dashboard variables, shared between
//!   the global, tab and panel scopes

mod variables;

pub use variables::{VariableLoadContext, VariableScope, VariableScopeKey};
