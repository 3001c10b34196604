//! Filter-expression parsing and WHERE-clause rendering.
//!
//! Expressions are terse filter strings: comma-separated terms ANDed
//! together, each term a field name with an optional operator suffix.
//! A bare field name means equality.
//!
//! ```text
//! "name"                 -> name = ?
//! "age >=, name like"    -> age >= ? AND name LIKE ?
//! "id in"                -> id IN (?, ?, ...)    (one List parameter)
//! "score between"        -> score BETWEEN ? AND ?
//! "deleted_at isnull"    -> deleted_at IS NULL
//! ```

use stele_core::{SteleError, SteleResult, Value};

/// Comparison operator of a filter term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    In,
    Between,
    IsNull,
    NotNull,
}

impl Op {
    /// Number of positional parameters the operator consumes.
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::IsNull | Self::NotNull => 0,
            Self::Between => 2,
            _ => 1,
        }
    }

    fn parse(token: &str) -> SteleResult<Self> {
        match token.to_ascii_lowercase().as_str() {
            "=" | "eq" => Ok(Self::Eq),
            "!=" | "<>" | "ne" => Ok(Self::Ne),
            ">" | "gt" => Ok(Self::Gt),
            ">=" | "gte" => Ok(Self::Gte),
            "<" | "lt" => Ok(Self::Lt),
            "<=" | "lte" => Ok(Self::Lte),
            "like" => Ok(Self::Like),
            "in" => Ok(Self::In),
            "between" => Ok(Self::Between),
            "isnull" => Ok(Self::IsNull),
            "notnull" => Ok(Self::NotNull),
            other => Err(SteleError::invalid_expression(format!(
                "unknown filter operator: {other}"
            ))),
        }
    }
}

/// One parsed filter term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub field: String,
    pub op: Op,
}

/// Parses a filter expression into terms. Empty input means no filter.
pub fn parse(expression: &str) -> SteleResult<Vec<Term>> {
    let expression = expression.trim();
    if expression.is_empty() {
        return Ok(Vec::new());
    }
    expression
        .split(',')
        .map(|term| {
            let mut tokens = term.split_whitespace();
            let field = tokens.next().ok_or_else(|| {
                SteleError::invalid_expression("empty filter term")
            })?;
            let op = match tokens.next() {
                Some(token) => Op::parse(token)?,
                None => Op::Eq,
            };
            if let Some(extra) = tokens.next() {
                return Err(SteleError::invalid_expression(format!(
                    "unexpected token in filter term: {extra}"
                )));
            }
            Ok(Term {
                field: field.to_string(),
                op,
            })
        })
        .collect()
}

/// A rendered WHERE clause: SQL fragment plus flattened bind parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Renders parsed terms against the supplied positional parameters.
///
/// Parameters are consumed left to right per term arity; a leftover or
/// missing parameter is an error. `IN` terms consume one parameter,
/// expanding a [`Value::List`] into a placeholder per element (a plain
/// value is treated as a one-element list, an empty list matches nothing).
pub fn render_where(terms: &[Term], params: &[Value]) -> SteleResult<Condition> {
    let mut sql = String::new();
    let mut out = Vec::new();
    let mut cursor = 0usize;

    for (i, term) in terms.iter().enumerate() {
        if i > 0 {
            sql.push_str(" AND ");
        }
        let take = |cursor: &mut usize| -> SteleResult<Value> {
            let value = params.get(*cursor).cloned().ok_or_else(|| {
                SteleError::invalid_expression(format!(
                    "filter term `{}` is missing a parameter",
                    term.field
                ))
            })?;
            *cursor += 1;
            Ok(value)
        };
        match term.op {
            Op::Eq => {
                sql.push_str(&format!("{} = ?", term.field));
                out.push(take(&mut cursor)?);
            }
            Op::Ne => {
                sql.push_str(&format!("{} != ?", term.field));
                out.push(take(&mut cursor)?);
            }
            Op::Gt => {
                sql.push_str(&format!("{} > ?", term.field));
                out.push(take(&mut cursor)?);
            }
            Op::Gte => {
                sql.push_str(&format!("{} >= ?", term.field));
                out.push(take(&mut cursor)?);
            }
            Op::Lt => {
                sql.push_str(&format!("{} < ?", term.field));
                out.push(take(&mut cursor)?);
            }
            Op::Lte => {
                sql.push_str(&format!("{} <= ?", term.field));
                out.push(take(&mut cursor)?);
            }
            Op::Like => {
                sql.push_str(&format!("{} LIKE ?", term.field));
                out.push(take(&mut cursor)?);
            }
            Op::Between => {
                sql.push_str(&format!("{} BETWEEN ? AND ?", term.field));
                out.push(take(&mut cursor)?);
                out.push(take(&mut cursor)?);
            }
            Op::IsNull => sql.push_str(&format!("{} IS NULL", term.field)),
            Op::NotNull => sql.push_str(&format!("{} IS NOT NULL", term.field)),
            Op::In => {
                let items = match take(&mut cursor)? {
                    Value::List(items) => items,
                    single => vec![single],
                };
                if items.is_empty() {
                    // empty membership matches no rows
                    sql.push_str("1 = 0");
                } else {
                    let placeholders = vec!["?"; items.len()].join(", ");
                    sql.push_str(&format!("{} IN ({placeholders})", term.field));
                    out.extend(items);
                }
            }
        }
    }

    if cursor != params.len() {
        return Err(SteleError::invalid_expression(format!(
            "expression consumes {cursor} parameters, {} supplied",
            params.len()
        )));
    }

    Ok(Condition { sql, params: out })
}

/// Splits a field-list string on the common separators (comma, semicolon,
/// whitespace).
#[must_use]
pub fn split_field_list(field_list: &str) -> Vec<String> {
    field_list
        .split([',', ';', ' ', '\t'])
        .filter(|field| !field.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stele_core::params;

    #[test]
    fn test_parse_bare_field_is_equality() {
        let terms = parse("name").unwrap();
        assert_eq!(
            terms,
            vec![Term {
                field: "name".into(),
                op: Op::Eq
            }]
        );
    }

    #[test]
    fn test_parse_multi_term() {
        let terms = parse("age >=, name like, deleted_at isnull").unwrap();
        assert_eq!(terms.len(), 3);
        assert_eq!(terms[0].op, Op::Gte);
        assert_eq!(terms[1].op, Op::Like);
        assert_eq!(terms[2].op, Op::IsNull);
    }

    #[test]
    fn test_parse_word_operators() {
        assert_eq!(parse("a eq").unwrap()[0].op, Op::Eq);
        assert_eq!(parse("a ne").unwrap()[0].op, Op::Ne);
        assert_eq!(parse("a gt").unwrap()[0].op, Op::Gt);
        assert_eq!(parse("a lte").unwrap()[0].op, Op::Lte);
    }

    #[test]
    fn test_parse_empty_expression() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("   ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_unknown_operator() {
        let err = parse("age ~~").unwrap_err();
        assert!(matches!(err, SteleError::InvalidExpression(_)));
    }

    #[test]
    fn test_render_simple() {
        let terms = parse("name, age >").unwrap();
        let cond = render_where(&terms, &params!["bob", 30]).unwrap();
        assert_eq!(cond.sql, "name = ? AND age > ?");
        assert_eq!(cond.params.len(), 2);
    }

    #[test]
    fn test_render_between() {
        let terms = parse("score between").unwrap();
        let cond = render_where(&terms, &params![1, 10]).unwrap();
        assert_eq!(cond.sql, "score BETWEEN ? AND ?");
        assert_eq!(cond.params.len(), 2);
    }

    #[test]
    fn test_render_in_expands_list() {
        let terms = parse("id in").unwrap();
        let cond = render_where(&terms, &[Value::list([1i64, 2, 3])]).unwrap();
        assert_eq!(cond.sql, "id IN (?, ?, ?)");
        assert_eq!(cond.params.len(), 3);
    }

    #[test]
    fn test_render_in_empty_list_matches_nothing() {
        let terms = parse("id in").unwrap();
        let cond = render_where(&terms, &[Value::List(Vec::new())]).unwrap();
        assert_eq!(cond.sql, "1 = 0");
        assert!(cond.params.is_empty());
    }

    #[test]
    fn test_render_arity_mismatch() {
        let terms = parse("name").unwrap();
        assert!(render_where(&terms, &params!["a", "b"]).is_err());
        assert!(render_where(&terms, &[]).is_err());
    }

    #[test]
    fn test_split_field_list() {
        assert_eq!(split_field_list("a,b;c d"), vec!["a", "b", "c", "d"]);
        assert_eq!(split_field_list("title"), vec!["title"]);
        assert!(split_field_list("").is_empty());
    }
}
