//! Simple (non-SQL) query syntax
//!
//! ```text
//! [<functions> |] <filter>
//! ```
//!
//! The optional prefix before the first `|` is appended to the projection;
//! the rest becomes the WHERE clause. Comparison operators get a single space
//! on each side so the backend tokenizer accepts `status=200`.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{anychar, char},
    combinator::{map, opt, recognize},
    sequence::tuple,
    IResult,
};

use crate::sql::strip_comment_lines;

/// A simple query split into its two halves
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SimpleQuery {
    /// Function pipeline before the `|`, trimmed
    pub functions: String,
    /// Filter expression with normalized operators
    pub filter: String,
}

impl SimpleQuery {
    /// Projection suffix for the SQL template
    pub fn query_functions(&self) -> String {
        if self.functions.is_empty() {
            String::new()
        } else {
            format!(",{}", self.functions)
        }
    }
}

/// Split and clean a simple-mode query
pub fn parse_simple_query(query: &str) -> SimpleQuery {
    let cleaned = strip_comment_lines(query);

    let (functions, filter) = match find_unquoted_pipe(&cleaned) {
        Some(idx) => (&cleaned[..idx], &cleaned[idx + 1..]),
        None => ("", cleaned.as_str()),
    };

    SimpleQuery {
        functions: functions.trim().to_string(),
        filter: normalize_operators(filter.trim()),
    }
}

fn find_unquoted_pipe(text: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (idx, c) in text.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == '|' => return Some(idx),
            None => {}
        }
    }
    None
}

#[derive(Debug, PartialEq)]
enum Token<'a> {
    Literal(&'a str),
    Operator(&'a str),
    Text(&'a str),
}

fn quoted<'a>(quote: char) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    move |input: &'a str| {
        recognize(tuple((
            char(quote),
            take_while(move |c: char| c != quote),
            opt(char(quote)),
        )))(input)
    }
}

fn operator(input: &str) -> IResult<&str, &str> {
    alt((
        tag(">="),
        tag("<="),
        tag("!="),
        tag("<>"),
        tag("=="),
        tag("="),
        tag(">"),
        tag("<"),
    ))(input)
}

fn is_special(c: char) -> bool {
    matches!(c, '\'' | '"' | '=' | '<' | '>' | '!')
}

fn token(input: &str) -> IResult<&str, Token<'_>> {
    alt((
        map(quoted('\''), Token::Literal),
        map(quoted('"'), Token::Literal),
        map(operator, Token::Operator),
        map(take_while1(|c: char| !is_special(c)), Token::Text),
        map(recognize(anychar), Token::Text),
    ))(input)
}

/// Put exactly one space on each side of comparison operators
///
/// Text inside single or double quotes is copied unchanged.
pub fn normalize_operators(filter: &str) -> String {
    let mut out = String::with_capacity(filter.len() + 8);
    let mut rest = filter;
    let mut after_operator = false;

    while !rest.is_empty() {
        let Ok((next, tok)) = token(rest) else {
            out.push_str(rest);
            break;
        };

        match tok {
            Token::Operator(op) => {
                let len = out.trim_end().len();
                out.truncate(len);
                out.push(' ');
                out.push_str(op);
                out.push(' ');
                after_operator = true;
            }
            Token::Text(text) if after_operator => {
                let text = text.trim_start();
                out.push_str(text);
                after_operator = text.is_empty();
            }
            Token::Text(text) | Token::Literal(text) => {
                out.push_str(text);
                after_operator = false;
            }
        }

        rest = next;
    }

    out.trim().to_string()
}
