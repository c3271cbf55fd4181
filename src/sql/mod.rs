//! SQL parser adapter
//!
//! Wraps `sqlparser` for the log search builder:
//!
//! - **Parser**: `parse` / `unparse` with comment stripping and quote rewriting
//! - **Inspect**: LIMIT, DISTINCT, aggregation and ordering checks, LIMIT/OFFSET
//!   extraction, filter field collection
//!
//! # Example
//!
//! ```rust
//! use logscope::sql;
//!
//! let mut statements = sql::parse("SELECT * FROM t LIMIT 10 OFFSET 5").unwrap();
//! assert_eq!(sql::take_limit_offset(&mut statements), (Some(10), Some(5)));
//! assert_eq!(sql::unparse(&statements), "SELECT * FROM t");
//! ```

mod inspect;
mod parser;

pub use inspect::{
    filter_fields, has_aggregation, has_distinct, has_limit, is_timestamp_ascending,
    take_limit_offset, where_clause,
};
pub use parser::{parse, strip_comment_lines, unparse};
pub use sqlparser::ast::Statement;
