//! Literal nodes

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Null,
    Numeric(Decimal),
    Integer(i64),
    String(String),
    Logical(bool),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Numeric(d) => write!(f, "{d}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::String(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            Self::Logical(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
        }
    }
}
