//! Function signatures and the compact signature string codec
//!
//! A signature string has one character per slot: the syntax class, the
//! return category, then each parameter category. An optional `*` starts a
//! repeated group: arguments past the fixed parameters are matched against
//! the group cyclically, so `bx*x` reads "braces returning a set, taking any
//! number of sets".

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::category::Category;

/// Errors raised while decoding a signature string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("Empty signature string")]
    Empty,

    #[error("Unknown syntax code '{0}' in signature")]
    InvalidSyntaxCode(char),

    #[error("Unknown category code '{code}' at position {position} in signature '{signature}'")]
    InvalidCategoryCode {
        code: char,
        position: usize,
        signature: String,
    },

    #[error("Signature '{0}' has no return category")]
    MissingReturn(String),

    #[error("Signature '{0}' has an empty repeated group")]
    EmptyRepeat(String),
}

/// How a function is written in the query language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Syntax {
    /// `Name(a, b)`
    Function,
    /// `a.Name(b)`
    Method,
    /// `a.Name`
    Property,
    /// `a Name b`
    Infix,
    /// `Name a`
    Prefix,
    /// `a Name`
    Postfix,
    /// Not callable from the query language
    Internal,
    /// `{a, b}`
    Braces,
    /// `(a, b)`
    Parentheses,
}

impl Syntax {
    pub fn from_code(code: char) -> Option<Self> {
        Some(match code {
            'f' => Self::Function,
            'm' => Self::Method,
            'p' => Self::Property,
            'i' => Self::Infix,
            'P' => Self::Prefix,
            'Q' => Self::Postfix,
            'I' => Self::Internal,
            'b' => Self::Braces,
            'r' => Self::Parentheses,
            _ => return None,
        })
    }

    pub fn code(&self) -> char {
        match self {
            Self::Function => 'f',
            Self::Method => 'm',
            Self::Property => 'p',
            Self::Infix => 'i',
            Self::Prefix => 'P',
            Self::Postfix => 'Q',
            Self::Internal => 'I',
            Self::Braces => 'b',
            Self::Parentheses => 'r',
        }
    }
}

/// Decode one category code. Constant markers decode to their base category.
pub fn category_from_code(code: char) -> Option<Category> {
    Some(match code {
        'a' => Category::Array,
        'd' => Category::Dimension,
        'h' => Category::Hierarchy,
        'l' => Category::Level,
        'b' => Category::Logical,
        'm' => Category::Member,
        'N' | 'n' => Category::Numeric,
        'I' | 'i' => Category::Integer,
        'x' => Category::Set,
        '#' | 'S' => Category::String,
        't' => Category::Tuple,
        'v' => Category::Value,
        'y' => Category::Symbol,
        'U' => Category::Null,
        'e' => Category::Empty,
        'D' => Category::DateTime,
        _ => return None,
    })
}

/// Immutable description of one overload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub syntax: Syntax,
    pub return_category: Category,
    pub params: Vec<Category>,
    /// Repeated group matched cyclically past the fixed parameters
    pub repeat: Vec<Category>,
}

impl Signature {
    pub fn new(syntax: Syntax, return_category: Category, params: Vec<Category>) -> Self {
        Self {
            syntax,
            return_category,
            params,
            repeat: Vec::new(),
        }
    }

    /// Decode a compact signature string such as `fnxn` or `bx*x`
    pub fn decode(s: &str) -> Result<Self, SignatureError> {
        let mut chars = s.chars();
        let syntax_code = chars.next().ok_or(SignatureError::Empty)?;
        let syntax =
            Syntax::from_code(syntax_code).ok_or(SignatureError::InvalidSyntaxCode(syntax_code))?;

        let (fixed, repeat) = match s[syntax_code.len_utf8()..].split_once('*') {
            Some((fixed, repeat)) => (fixed, Some(repeat)),
            None => (&s[syntax_code.len_utf8()..], None),
        };

        let decode_all = |part: &str, offset: usize| {
            part.chars()
                .enumerate()
                .map(|(i, c)| {
                    category_from_code(c).ok_or_else(|| SignatureError::InvalidCategoryCode {
                        code: c,
                        position: offset + i,
                        signature: s.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        };

        let mut categories = decode_all(fixed, 1)?;
        if categories.is_empty() {
            return Err(SignatureError::MissingReturn(s.to_string()));
        }
        let return_category = categories.remove(0);
        let repeat = match repeat {
            Some(r) if r.is_empty() => return Err(SignatureError::EmptyRepeat(s.to_string())),
            Some(r) => decode_all(r, fixed.chars().count() + 2)?,
            None => Vec::new(),
        };

        Ok(Self {
            syntax,
            return_category,
            params: categories,
            repeat,
        })
    }

    pub fn is_variadic(&self) -> bool {
        !self.repeat.is_empty()
    }

    /// Whether a call with `count` arguments fits this signature
    pub fn matches_arity(&self, count: usize) -> bool {
        if self.repeat.is_empty() {
            count == self.params.len()
        } else {
            count >= self.params.len()
        }
    }

    /// Declared category of the argument at `index`
    pub fn param_at(&self, index: usize) -> Option<Category> {
        if let Some(c) = self.params.get(index) {
            return Some(*c);
        }
        if self.repeat.is_empty() {
            return None;
        }
        let extra = index - self.params.len();
        Some(self.repeat[extra % self.repeat.len()])
    }

    /// Render the call form, e.g. `Rank(<Tuple>, <Set>)`
    pub fn describe(&self, name: &str) -> String {
        let mut params: Vec<String> = self.params.iter().map(|c| format!("<{c}>")).collect();
        if self.is_variadic() {
            let group: Vec<String> = self.repeat.iter().map(|c| format!("<{c}>")).collect();
            params.push(format!("[{}]...", group.join(", ")));
        }
        let list = params.join(", ");
        match self.syntax {
            Syntax::Function | Syntax::Internal => format!("{name}({list})"),
            Syntax::Method => match params.split_first() {
                Some((first, rest)) => format!("{first}.{name}({})", rest.join(", ")),
                None => format!("{name}()"),
            },
            Syntax::Property => match params.first() {
                Some(first) => format!("{first}.{name}"),
                None => name.to_string(),
            },
            Syntax::Infix => format!("{} {name} {}", slot(&params, 0), slot(&params, 1)),
            Syntax::Prefix => format!("{name} {}", slot(&params, 0)),
            Syntax::Postfix => format!("{} {name}", slot(&params, 0)),
            Syntax::Braces => format!("{{{list}}}"),
            Syntax::Parentheses => format!("({list})"),
        }
    }
}

fn slot(params: &[String], i: usize) -> &str {
    params.get(i).map_or("", String::as_str)
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.describe("_"), self.return_category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_function() {
        let sig = Signature::decode("fnxn").unwrap();
        assert_eq!(sig.syntax, Syntax::Function);
        assert_eq!(sig.return_category, Category::Numeric);
        assert_eq!(sig.params, vec![Category::Set, Category::Numeric]);
        assert!(!sig.is_variadic());
        assert!(sig.matches_arity(2));
        assert!(!sig.matches_arity(3));
    }

    #[test]
    fn test_decode_repeat_group() {
        let sig = Signature::decode("fxxv*yv").unwrap();
        assert!(sig.matches_arity(2));
        assert!(sig.matches_arity(5));
        assert!(!sig.matches_arity(1));
        assert_eq!(sig.param_at(2), Some(Category::Symbol));
        assert_eq!(sig.param_at(3), Some(Category::Value));
        assert_eq!(sig.param_at(4), Some(Category::Symbol));
    }

    #[test]
    fn test_constant_markers_decode_to_base() {
        let sig = Signature::decode("fNI#").unwrap();
        assert_eq!(sig.return_category, Category::Numeric);
        assert_eq!(sig.params, vec![Category::Integer, Category::String]);
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(Signature::decode(""), Err(SignatureError::Empty));
        assert_eq!(Signature::decode("z"), Err(SignatureError::InvalidSyntaxCode('z')));
        assert!(matches!(
            Signature::decode("fxq"),
            Err(SignatureError::InvalidCategoryCode { code: 'q', position: 2, .. })
        ));
        assert!(matches!(Signature::decode("f"), Err(SignatureError::MissingReturn(_))));
        assert!(matches!(Signature::decode("bx*"), Err(SignatureError::EmptyRepeat(_))));
    }

    #[test]
    fn test_describe() {
        let rank = Signature::decode("fitx").unwrap();
        assert_eq!(rank.describe("Rank"), "Rank(<Tuple>, <Set>)");
        let children = Signature::decode("pxm").unwrap();
        assert_eq!(children.describe("Children"), "<Member>.Children");
        let plus = Signature::decode("innn").unwrap();
        assert_eq!(
            plus.describe("+"),
            "<Numeric Expression> + <Numeric Expression>"
        );
        let braces = Signature::decode("bx*x").unwrap();
        assert_eq!(braces.describe("{}"), "{[<Set>]...}");
    }
}
