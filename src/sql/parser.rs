//! SQL text ↔ AST conversion
//!
//! Thin wrapper over `sqlparser` that strips comment lines before parsing,
//! never surfaces the raw parser error, and rewrites backtick quoting to
//! double quotes when printing.

use regex::Regex;
use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::sync::OnceLock;

fn comment_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^[ \t]*--.*$").expect("comment regex is valid"))
}

/// Remove every line whose first non-blank characters are `--`
pub fn strip_comment_lines(text: &str) -> String {
    let stripped = comment_line_regex().replace_all(text, "");
    stripped
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse SQL text into statements
///
/// Returns `None` when the parser rejects the input. An empty statement list
/// is returned as `Some(vec![])`; callers decide whether that is an error.
pub fn parse(sql: &str) -> Option<Vec<Statement>> {
    let cleaned = strip_comment_lines(sql);

    match Parser::parse_sql(&GenericDialect {}, &cleaned) {
        Ok(statements) => Some(statements),
        Err(e) => {
            tracing::debug!(error = %e, "SQL parse failed");
            None
        }
    }
}

/// Print statements back to SQL text with double-quoted identifiers
pub fn unparse(statements: &[Statement]) -> String {
    statements
        .iter()
        .map(|statement| statement.to_string())
        .collect::<Vec<_>>()
        .join("; ")
        .replace('`', "\"")
}
