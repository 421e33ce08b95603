//! Dotted, optionally bracketed identifiers such as `[Product].[Drink]`

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use thiserror::Error;
use winnow::combinator::{alt, delimited, repeat, separated};
use winnow::prelude::*;
use winnow::token::{none_of, take_till};

/// Errors raised while parsing an identifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("Empty identifier")]
    Empty,

    #[error("Empty segment in identifier '{0}'")]
    EmptySegment(String),

    #[error("Invalid identifier '{text}' at offset {offset}")]
    Invalid { text: String, offset: usize },
}

/// `[name]`, where `]]` stands for a literal `]`
fn bracketed(input: &mut &str) -> ModalResult<String> {
    delimited('[', repeat(0.., alt(("]]".value(']'), none_of(']')))), ']').parse_next(input)
}

/// A bare word up to the next dot
fn bare(input: &mut &str) -> ModalResult<String> {
    take_till(0.., |c: char| matches!(c, '.' | '[' | ']'))
        .map(|s: &str| s.trim().to_string())
        .parse_next(input)
}

fn segments(input: &mut &str) -> ModalResult<Vec<String>> {
    separated(1.., alt((bracketed, bare)), '.').parse_next(input)
}

/// A compound identifier: a sequence of name segments
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier {
    pub segments: SmallVec<[String; 4]>,
}

impl Identifier {
    pub fn new(segments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse `[A].[B]`, `A.B` or a mix of both
    pub fn parse(text: &str) -> Result<Self, IdentifierError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(IdentifierError::Empty);
        }
        let parsed = segments.parse(trimmed).map_err(|e| IdentifierError::Invalid {
            text: text.to_string(),
            offset: e.offset(),
        })?;
        if parsed.iter().any(String::is_empty) {
            return Err(IdentifierError::EmptySegment(text.to_string()));
        }
        Ok(Self {
            segments: SmallVec::from_vec(parsed),
        })
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The last segment
    pub fn name(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// Whether this is a single bare word, e.g. a symbol like `ASC`
    pub fn is_simple(&self) -> bool {
        self.segments.len() == 1
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, s) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "[{}]", s.replace(']', "]]"))?;
        }
        Ok(())
    }
}

impl TryFrom<String> for Identifier {
    type Error = IdentifierError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("[Product].[Drink]", &["Product", "Drink"])]
    #[case("Measures.Sales", &["Measures", "Sales"])]
    #[case("[Time].2024.[Q1]", &["Time", "2024", "Q1"])]
    #[case("[A.B].[x]]y]", &["A.B", "x]y"])]
    #[case("ASC", &["ASC"])]
    fn test_parse(#[case] text: &str, #[case] expected: &[&str]) {
        let id = Identifier::parse(text).unwrap();
        assert_eq!(id.segments.as_slice(), expected);
    }

    #[rstest]
    #[case("", IdentifierError::Empty)]
    #[case("  ", IdentifierError::Empty)]
    #[case("A..B", IdentifierError::EmptySegment("A..B".to_string()))]
    #[case("[].[B]", IdentifierError::EmptySegment("[].[B]".to_string()))]
    fn test_parse_errors(#[case] text: &str, #[case] expected: IdentifierError) {
        assert_eq!(Identifier::parse(text), Err(expected));
    }

    #[rstest]
    #[case("[Product")]
    #[case("[A] [B]")]
    #[case("A]")]
    #[case("[A]x")]
    fn test_malformed_brackets(#[case] text: &str) {
        assert!(matches!(
            Identifier::parse(text),
            Err(IdentifierError::Invalid { .. })
        ));
    }

    #[test]
    fn test_display_round_trips() {
        let id = Identifier::parse("[A.B].[x]]y]").unwrap();
        assert_eq!(Identifier::parse(&id.to_string()).unwrap(), id);
    }
}
