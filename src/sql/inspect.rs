//! Query property helpers over a parsed AST

use sqlparser::ast::{visit_expressions, Expr, Query, Select, SelectItem, SetExpr, Statement};
use std::collections::BTreeSet;
use std::ops::ControlFlow;

/// Function names treated as aggregates when projected
const AGGREGATE_FUNCTIONS: &[&str] = &[
    "count",
    "sum",
    "avg",
    "min",
    "max",
    "median",
    "stddev",
    "variance",
    "array_agg",
    "approx_distinct",
    "approx_median",
    "approx_percentile_cont",
    "approx_topk",
    "first_value",
    "last_value",
];

fn query_of(statement: &Statement) -> Option<&Query> {
    match statement {
        Statement::Query(query) => Some(&**query),
        _ => None,
    }
}

fn select_of(query: &Query) -> Option<&Select> {
    match query.body.as_ref() {
        SetExpr::Select(select) => Some(&**select),
        SetExpr::Query(inner) => select_of(inner),
        _ => None,
    }
}

fn selects(statements: &[Statement]) -> impl Iterator<Item = &Select> {
    statements.iter().filter_map(query_of).filter_map(select_of)
}

/// Any statement carries a LIMIT clause
pub fn has_limit(statements: &[Statement]) -> bool {
    statements
        .iter()
        .filter_map(query_of)
        .any(|query| query.limit.is_some())
}

/// Any SELECT uses DISTINCT
pub fn has_distinct(statements: &[Statement]) -> bool {
    selects(statements).any(|select| select.distinct.is_some())
}

/// Any projected column is an aggregate function call
pub fn has_aggregation(statements: &[Statement]) -> bool {
    selects(statements).any(|select| select.projection.iter().any(is_aggregate_item))
}

fn is_aggregate_item(item: &SelectItem) -> bool {
    let expr = match item {
        SelectItem::UnnamedExpr(expr) => expr,
        SelectItem::ExprWithAlias { expr, .. } => expr,
        _ => return false,
    };

    match expr {
        Expr::Function(function) => {
            let name = function.name.to_string().to_lowercase();
            AGGREGATE_FUNCTIONS.contains(&name.as_str())
        }
        _ => false,
    }
}

/// An ORDER BY entry sorts the timestamp column ascending
///
/// An entry without an explicit direction counts as ascending.
pub fn is_timestamp_ascending(statements: &[Statement], timestamp_column: &str) -> bool {
    statements
        .iter()
        .filter_map(query_of)
        .flat_map(|query| query.order_by.iter())
        .any(|order| {
            column_name(&order.expr) == Some(timestamp_column) && order.asc.unwrap_or(true)
        })
}

fn column_name(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.as_str()),
        Expr::CompoundIdentifier(idents) => idents.last().map(|ident| ident.value.as_str()),
        _ => None,
    }
}

/// WHERE expression of the first SELECT printed back to text
pub fn where_clause(statements: &[Statement]) -> Option<String> {
    selects(statements)
        .find_map(|select| select.selection.as_ref())
        .map(|expr| expr.to_string().replace('`', "\""))
}

fn integer_literal(expr: &Expr) -> Option<i64> {
    expr.to_string().trim().parse().ok()
}

/// Remove numeric LIMIT and OFFSET from the first query statement
///
/// Returns `(limit, offset)`; a clause whose value is not an integer literal
/// is left in place and reported as `None`.
pub fn take_limit_offset(statements: &mut [Statement]) -> (Option<i64>, Option<i64>) {
    let query = statements.iter_mut().find_map(|statement| match statement {
        Statement::Query(query) => Some(query),
        _ => None,
    });

    let Some(query) = query else {
        return (None, None);
    };

    let limit = query.limit.as_ref().and_then(integer_literal);
    if limit.is_some() {
        query.limit = None;
    }

    let offset = query
        .offset
        .as_ref()
        .and_then(|offset| integer_literal(&offset.value));
    if offset.is_some() {
        query.offset = None;
    }

    (limit, offset)
}

/// Column names referenced by a filter expression
///
/// Returns `None` if the expression does not parse.
pub fn filter_fields(where_clause: &str) -> Option<BTreeSet<String>> {
    let sql = format!("SELECT * FROM _filter WHERE {}", where_clause);
    let statements = super::parse(&sql)?;

    let mut fields = BTreeSet::new();
    for statement in &statements {
        let _ = visit_expressions(statement, |expr| {
            if let Some(name) = column_name(expr) {
                fields.insert(name.to_string());
            }
            ControlFlow::<()>::Continue(())
        });
    }

    Some(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{parse, unparse};

    #[test]
    fn test_has_limit() {
        assert!(has_limit(&parse("SELECT * FROM t LIMIT 5").unwrap()));
        assert!(!has_limit(&parse("SELECT * FROM t").unwrap()));
    }

    #[test]
    fn test_has_distinct() {
        assert!(has_distinct(&parse("SELECT DISTINCT a FROM t").unwrap()));
        assert!(!has_distinct(&parse("SELECT a FROM t").unwrap()));
    }

    #[test]
    fn test_has_aggregation() {
        assert!(has_aggregation(&parse("SELECT count(*) FROM t").unwrap()));
        assert!(has_aggregation(&parse("SELECT host, AVG(took) AS avg_took FROM t GROUP BY host").unwrap()));
        assert!(!has_aggregation(&parse("SELECT lower(host) FROM t").unwrap()));
        assert!(!has_aggregation(&parse("SELECT * FROM t").unwrap()));
    }

    #[test]
    fn test_timestamp_ascending() {
        let asc = parse("SELECT * FROM t ORDER BY _timestamp ASC").unwrap();
        let implicit = parse("SELECT * FROM t ORDER BY _timestamp").unwrap();
        let desc = parse("SELECT * FROM t ORDER BY _timestamp DESC").unwrap();
        let other = parse("SELECT * FROM t ORDER BY host ASC").unwrap();

        assert!(is_timestamp_ascending(&asc, "_timestamp"));
        assert!(is_timestamp_ascending(&implicit, "_timestamp"));
        assert!(!is_timestamp_ascending(&desc, "_timestamp"));
        assert!(!is_timestamp_ascending(&other, "_timestamp"));
    }

    #[test]
    fn test_take_limit_offset() {
        let mut statements = parse("SELECT * FROM t LIMIT 10 OFFSET 5").unwrap();
        assert_eq!(take_limit_offset(&mut statements), (Some(10), Some(5)));

        let sql = unparse(&statements);
        assert_eq!(sql, "SELECT * FROM t");
        assert!(!sql.contains("LIMIT"));
    }

    #[test]
    fn test_take_limit_without_offset() {
        let mut statements = parse("SELECT a FROM t WHERE a > 1 LIMIT 3").unwrap();
        assert_eq!(take_limit_offset(&mut statements), (Some(3), None));
        assert_eq!(unparse(&statements), "SELECT a FROM t WHERE a > 1");
    }

    #[test]
    fn test_where_clause() {
        let statements = parse("SELECT * FROM t WHERE `code` = 500 AND host = 'a'").unwrap();
        assert_eq!(
            where_clause(&statements).as_deref(),
            Some("\"code\" = 500 AND host = 'a'")
        );
        assert_eq!(where_clause(&parse("SELECT * FROM t").unwrap()), None);
    }

    #[test]
    fn test_filter_fields() {
        let fields = filter_fields("status = 200 AND (level = 'error' OR t.host != 'a')").unwrap();
        let expected: BTreeSet<String> =
            ["status", "level", "host"].iter().map(|s| s.to_string()).collect();
        assert_eq!(fields, expected);
    }

    #[test]
    fn test_filter_fields_invalid() {
        assert!(filter_fields("status = = 200").is_none());
    }
}
