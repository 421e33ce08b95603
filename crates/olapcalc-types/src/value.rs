//! Runtime values produced by compiled calculations

use chrono::NaiveDateTime;
use olapcalc_diagnostics::ErrorCode;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

use crate::category::Category;
use crate::member::{DimensionId, HierarchyId, LevelId, Member};
use crate::tuple::{Tuple, TupleList};

/// A recoverable evaluation fault carried as a cell value.
///
/// Error values flow through aggregates like any other value so that a
/// single failing cell does not abort the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellError {
    pub code: ErrorCode,
    pub message: String,
}

impl CellError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// The value of an evaluated expression
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Null,
    Numeric(Decimal),
    Integer(i64),
    String(String),
    Logical(bool),
    DateTime(NaiveDateTime),
    /// A reserved word such as `ASC` or `POST`
    Symbol(String),
    Member(Member),
    Tuple(Tuple),
    Set(TupleList),
    Level(LevelId),
    Hierarchy(HierarchyId),
    Dimension(DimensionId),
    Error(CellError),
}

impl Value {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error(CellError::new(code, message))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Whether the value counts as an empty cell (null or error)
    pub fn is_empty_cell(&self) -> bool {
        matches!(self, Self::Null | Self::Error(_))
    }

    pub fn category(&self) -> Category {
        match self {
            Self::Null => Category::Null,
            Self::Numeric(_) => Category::Numeric,
            Self::Integer(_) => Category::Integer,
            Self::String(_) => Category::String,
            Self::Logical(_) => Category::Logical,
            Self::DateTime(_) => Category::DateTime,
            Self::Symbol(_) => Category::Symbol,
            Self::Member(_) => Category::Member,
            Self::Tuple(_) => Category::Tuple,
            Self::Set(_) => Category::Set,
            Self::Level(_) => Category::Level,
            Self::Hierarchy(_) => Category::Hierarchy,
            Self::Dimension(_) => Category::Dimension,
            Self::Error(_) => Category::Value,
        }
    }

    /// Numeric view of the value, if it has one
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Numeric(d) => Some(*d),
            Self::Integer(i) => Some(Decimal::from(*i)),
            Self::Logical(b) => Some(if *b { Decimal::ONE } else { Decimal::ZERO }),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Numeric(d) => d.trunc().to_i64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Logical(b) => Some(*b),
            Self::Numeric(d) => Some(!d.is_zero()),
            Self::Integer(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_member(&self) -> Option<&Member> {
        match self {
            Self::Member(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&TupleList> {
        match self {
            Self::Set(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Self::Numeric(d)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Logical(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<Member> for Value {
    fn from(m: Member) -> Self {
        Self::Member(m)
    }
}

impl From<TupleList> for Value {
    fn from(s: TupleList) -> Self {
        Self::Set(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("(null)"),
            Self::Numeric(d) => write!(f, "{}", d.normalize()),
            Self::Integer(i) => write!(f, "{i}"),
            Self::String(s) => f.write_str(s),
            Self::Logical(b) => write!(f, "{b}"),
            Self::DateTime(dt) => write!(f, "{dt}"),
            Self::Symbol(s) => f.write_str(s),
            Self::Member(m) => write!(f, "{m}"),
            Self::Tuple(t) => write!(f, "{t}"),
            Self::Set(s) => {
                f.write_str("{")?;
                for (i, t) in s.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if t.arity() == 1 {
                        write!(f, "{}", t[0])?;
                    } else {
                        write!(f, "{t}")?;
                    }
                }
                f.write_str("}")
            }
            Self::Level(l) => write!(f, "Level#{}", l.0),
            Self::Hierarchy(h) => write!(f, "Hierarchy#{}", h.0),
            Self::Dimension(d) => write!(f, "Dimension#{}", d.0),
            Self::Error(e) => write!(f, "#ERR {e}"),
        }
    }
}

fn kind_rank(v: &Value) -> u8 {
    match v {
        Value::Null | Value::Error(_) => 0,
        Value::Numeric(_) | Value::Integer(_) => 1,
        Value::String(_) => 2,
        Value::Logical(_) => 3,
        Value::DateTime(_) => 4,
        Value::Symbol(_) => 5,
        _ => 6,
    }
}

/// Total order over scalar values used by sorting and ranking.
///
/// Null and error values sort lowest, then numbers, strings, logicals and
/// date-times. Numbers of different representations compare by value.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let (ra, rb) = (kind_rank(a), kind_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) | (Value::Symbol(x), Value::Symbol(y)) => x.cmp(y),
        (Value::Logical(x), Value::Logical(y)) => x.cmp(y),
        (Value::DateTime(x), Value::DateTime(y)) => x.cmp(y),
        (Value::Member(x), Value::Member(y)) => x.ordinal().cmp(&y.ordinal()),
        _ => match (a.as_decimal(), b.as_decimal()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => Ordering::Equal,
        },
    }
}
