//! Predicate filter language
//!
//! User expressions such as `"size > 10K and name like 'main%'"` are
//! compiled into a [`ConditionFilter`], a conjunction of typed conditions
//! evaluated inline against every entry the walker discovers.
//!
//! # Grammar
//!
//! The expression is split on the word `and` (case-insensitive); each
//! clause is `property operator value`. The operator is located by a
//! longest-match scan over the fixed set `{>=, <=, ==, !=, in, like, >, <}`.
//!
//! | property   | value                         | operators              |
//! |------------|-------------------------------|------------------------|
//! | `name`     | quoted or bare string         | `== != in like`        |
//! | `path`     | quoted or bare string         | `== != in like`        |
//! | `type`     | `'file'` or `'dir'`           | `== != in like`        |
//! | `size`     | `N[.N][kKmMgGtT]?` bytes      | `== != > < >= <=`      |
//! | `modified` | float hours, relative to now  | `== != > < >= <=`      |
//!
//! `in` is case-insensitive substring containment. `like` uses SQL
//! wildcards (`%` any sequence, `_` one character) anchored to the whole
//! string. `modified < 24` reads "mtime is before 24 hours ago", i.e.
//! older than a day; the reference instant is computed per evaluation.
//!
//! There is no `or`, no parenthesisation and no negation.

use crate::error::{FilterError, FilterResult};
use crate::storage::Entry;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use std::sync::LazyLock;

/// Operators ordered longest-first so that the per-position scan always
/// prefers `>=` over `>` and `like` over everything shorter.
const OPERATORS: [&str; 8] = ["like", ">=", "<=", "==", "!=", "in", ">", "<"];

/// `size` values: a float followed by an optional binary unit letter
static SIZE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9.]+)([kKmMgGtT]?)$").expect("Invalid size regex"));

/// String-valued property of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrProp {
    /// Basename of the key
    Name,
    /// The full key
    Path,
    /// `"dir"` for directories, `"file"` for everything else
    Type,
}

/// Operators admissible on string properties
#[derive(Debug, Clone)]
pub enum StrOp {
    Eq,
    Ne,
    /// Case-insensitive substring containment
    In,
    /// Anchored SQL-wildcard pattern, compiled once at parse time
    Like(Regex),
}

/// Operators admissible on numeric and time properties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl CmpOp {
    fn matches<T: PartialOrd>(self, value: T, target: T) -> bool {
        match self {
            CmpOp::Eq => value == target,
            CmpOp::Ne => value != target,
            CmpOp::Gt => value > target,
            CmpOp::Lt => value < target,
            CmpOp::Ge => value >= target,
            CmpOp::Le => value <= target,
        }
    }
}

/// One compiled condition. The tagged representation makes inadmissible
/// property/operator pairings unrepresentable after compilation.
#[derive(Debug, Clone)]
pub enum Condition {
    Str {
        prop: StrProp,
        op: StrOp,
        value: String,
    },
    Size {
        op: CmpOp,
        bytes: i64,
    },
    /// `modified` - the right-hand side is `now - within` at evaluation time
    Age {
        op: CmpOp,
        within: Duration,
    },
}

/// An ordered conjunction of conditions; the empty filter accepts everything
#[derive(Debug, Clone, Default)]
pub struct ConditionFilter {
    conditions: Vec<Condition>,
}

impl ConditionFilter {
    /// Compile a full expression: split into clauses, parse each
    pub fn compile(expr: &str) -> FilterResult<Self> {
        let mut conditions = Vec::new();
        for clause in split_clauses(expr) {
            conditions.push(parse_condition(&clause)?);
        }
        Ok(Self { conditions })
    }

    /// Compile pre-split clauses
    pub fn from_clauses(clauses: &[String]) -> FilterResult<Self> {
        let mut conditions = Vec::new();
        for clause in clauses {
            conditions.push(parse_condition(clause)?);
        }
        Ok(Self { conditions })
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// True when every condition holds for the entry
    pub fn is_satisfied(&self, entry: &Entry) -> bool {
        let now = Utc::now();
        self.conditions
            .iter()
            .all(|c| match_condition(entry, c, now))
    }
}

/// Split an expression on the word `and`, trimming whitespace and dropping
/// empty clauses. A string of only whitespace and `and` tokens therefore
/// compiles to the empty filter.
pub fn split_clauses(expr: &str) -> Vec<String> {
    static AND_TOKEN: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)\band\b").expect("Invalid and-token regex"));
    AND_TOKEN
        .split(expr)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

/// Locate the leftmost operator, preferring the longest candidate at each
/// position. Alphabetic operators match case-insensitively.
fn find_operator(clause: &str) -> Option<(usize, &'static str)> {
    let bytes = clause.as_bytes();
    for i in 0..bytes.len() {
        for op in OPERATORS {
            if i + op.len() <= bytes.len()
                && bytes[i..i + op.len()].eq_ignore_ascii_case(op.as_bytes())
            {
                return Some((i, op));
            }
        }
    }
    None
}

/// Parse one `property operator value` clause
pub fn parse_condition(clause: &str) -> FilterResult<Condition> {
    let clause = clause.trim();
    let (pos, op) = find_operator(clause).ok_or_else(|| FilterError::InvalidOperator {
        clause: clause.to_string(),
    })?;

    let property = clause[..pos].trim();
    let value = clause[pos + op.len()..].trim();
    if property.is_empty() || value.is_empty() {
        return Err(FilterError::MalformedClause {
            clause: clause.to_string(),
        });
    }

    match property.to_ascii_lowercase().as_str() {
        "name" => str_condition(StrProp::Name, op, value, clause),
        "path" => str_condition(StrProp::Path, op, value, clause),
        "type" => str_condition(StrProp::Type, op, value, clause),
        "size" => Ok(Condition::Size {
            op: cmp_op(op, clause)?,
            bytes: parse_size(value)?,
        }),
        "modified" => Ok(Condition::Age {
            op: cmp_op(op, clause)?,
            within: parse_duration(value)?,
        }),
        other => Err(FilterError::InvalidProperty {
            property: other.to_string(),
        }),
    }
}

fn str_condition(
    prop: StrProp,
    op: &str,
    value: &str,
    clause: &str,
) -> FilterResult<Condition> {
    let value = value
        .trim_matches(|c| c == '\'' || c == '"')
        .to_string();
    let op = match op {
        "==" => StrOp::Eq,
        "!=" => StrOp::Ne,
        "in" => StrOp::In,
        "like" => StrOp::Like(like_pattern(&value)?),
        _ => {
            return Err(FilterError::InvalidOperator {
                clause: clause.to_string(),
            })
        }
    };
    Ok(Condition::Str { prop, op, value })
}

fn cmp_op(op: &str, clause: &str) -> FilterResult<CmpOp> {
    match op {
        "==" => Ok(CmpOp::Eq),
        "!=" => Ok(CmpOp::Ne),
        ">" => Ok(CmpOp::Gt),
        "<" => Ok(CmpOp::Lt),
        ">=" => Ok(CmpOp::Ge),
        "<=" => Ok(CmpOp::Le),
        _ => Err(FilterError::InvalidOperator {
            clause: clause.to_string(),
        }),
    }
}

/// Parse a size literal: `100`, `10K`, `2M`, `1.5K`. The numeric part is a
/// float, scaled by 1024 per unit step, rounded toward zero.
pub fn parse_size(value: &str) -> FilterResult<i64> {
    let value = value.trim();
    let caps = SIZE_REGEX
        .captures(value)
        .ok_or_else(|| FilterError::InvalidSizeFormat {
            value: value.to_string(),
        })?;

    let num: f64 = caps[1]
        .parse()
        .map_err(|_| FilterError::InvalidSizeFormat {
            value: value.to_string(),
        })?;

    let multiplier = match caps[2].to_ascii_lowercase().as_str() {
        "" => 1i64,
        "k" => 1 << 10,
        "m" => 1 << 20,
        "g" => 1 << 30,
        "t" => 1i64 << 40,
        _ => unreachable!("size regex admits only kmgt"),
    };

    Ok((num * multiplier as f64) as i64)
}

/// Parse a `modified` literal: float hours
pub fn parse_duration(value: &str) -> FilterResult<Duration> {
    let hours: f64 = value
        .trim()
        .parse()
        .map_err(|_| FilterError::InvalidDuration {
            value: value.to_string(),
        })?;
    Ok(Duration::milliseconds((hours * 3_600_000.0) as i64))
}

/// Translate a SQL-wildcard pattern to an anchored regex. `%` becomes any
/// sequence, `_` one character; everything else is matched literally.
fn like_pattern(target: &str) -> FilterResult<Regex> {
    let mut pattern = String::with_capacity(target.len() + 2);
    pattern.push('^');
    for c in target.chars() {
        match c {
            '%' => pattern.push_str(".*"),
            '_' => pattern.push('.'),
            c => pattern.push_str(&regex::escape(&c.to_string())),
        }
    }
    pattern.push('$');
    Regex::new(&pattern).map_err(|_| FilterError::MalformedClause {
        clause: target.to_string(),
    })
}

fn match_condition(entry: &Entry, cond: &Condition, now: DateTime<Utc>) -> bool {
    match cond {
        Condition::Str { prop, op, value } => {
            let projected = match prop {
                StrProp::Name => entry.basename(),
                StrProp::Path => entry.key.as_str(),
                StrProp::Type => {
                    if entry.is_dir {
                        "dir"
                    } else {
                        "file"
                    }
                }
            };
            match_string(projected, op, value)
        }
        Condition::Size { op, bytes } => op.matches(entry.size, *bytes),
        Condition::Age { op, within } => op.matches(entry.mtime, now - *within),
    }
}

fn match_string(value: &str, op: &StrOp, target: &str) -> bool {
    match op {
        StrOp::Eq => value == target,
        StrOp::Ne => value != target,
        StrOp::In => value.to_lowercase().contains(&target.to_lowercase()),
        StrOp::Like(pattern) => pattern.is_match(value),
    }
}
