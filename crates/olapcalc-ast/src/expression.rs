//! Expression and call nodes

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Identifier, Literal, Syntax};

/// An unresolved expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exp {
    Literal(Literal),
    /// Compound identifier naming a member, level, hierarchy, dimension,
    /// named set or reserved symbol
    Id(Identifier),
    Call(Call),
}

/// A function or operator application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub name: String,
    #[serde(default = "default_syntax")]
    pub syntax: Syntax,
    #[serde(default)]
    pub args: Vec<Exp>,
}

fn default_syntax() -> Syntax {
    Syntax::Function
}

impl Call {
    pub fn new(name: impl Into<String>, syntax: Syntax, args: Vec<Exp>) -> Self {
        Self {
            name: name.into(),
            syntax,
            args,
        }
    }
}

impl Exp {
    /// Identifier expression. Text that does not parse as a compound
    /// identifier becomes a single segment.
    pub fn id(text: &str) -> Self {
        Self::Id(Identifier::parse(text).unwrap_or_else(|_| Identifier::new([text])))
    }

    pub fn integer(i: i64) -> Self {
        Self::Literal(Literal::Integer(i))
    }

    pub fn numeric(d: rust_decimal::Decimal) -> Self {
        Self::Literal(Literal::Numeric(d))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::Literal(Literal::String(s.into()))
    }

    pub fn null() -> Self {
        Self::Literal(Literal::Null)
    }

    pub fn call(name: impl Into<String>, syntax: Syntax, args: Vec<Exp>) -> Self {
        Self::Call(Call::new(name, syntax, args))
    }

    /// `Name(args)`
    pub fn func(name: impl Into<String>, args: Vec<Exp>) -> Self {
        Self::call(name, Syntax::Function, args)
    }

    /// `target.Name`
    pub fn property(target: Exp, name: impl Into<String>) -> Self {
        Self::call(name, Syntax::Property, vec![target])
    }

    /// `target.Name(args)`
    pub fn method(target: Exp, name: impl Into<String>, args: Vec<Exp>) -> Self {
        let mut all = Vec::with_capacity(args.len() + 1);
        all.push(target);
        all.extend(args);
        Self::call(name, Syntax::Method, all)
    }

    /// `left op right`
    pub fn infix(op: impl Into<String>, left: Exp, right: Exp) -> Self {
        Self::call(op, Syntax::Infix, vec![left, right])
    }

    /// `op operand`
    pub fn prefix(op: impl Into<String>, operand: Exp) -> Self {
        Self::call(op, Syntax::Prefix, vec![operand])
    }

    /// `{a, b, ...}`
    pub fn braces(args: Vec<Exp>) -> Self {
        Self::call("{}", Syntax::Braces, args)
    }

    /// `(a, b, ...)`
    pub fn parens(args: Vec<Exp>) -> Self {
        Self::call("()", Syntax::Parentheses, args)
    }

    /// `set AS alias`
    pub fn alias(set: Exp, alias: &str) -> Self {
        Self::infix("AS", set, Self::id(alias))
    }

    pub fn as_call(&self) -> Option<&Call> {
        match self {
            Self::Call(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_id(&self) -> Option<&Identifier> {
        match self {
            Self::Id(id) => Some(id),
            _ => None,
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, args: &[Exp]) -> fmt::Result {
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{a}")?;
    }
    Ok(())
}

impl fmt::Display for Exp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(l) => write!(f, "{l}"),
            Self::Id(id) => write!(f, "{id}"),
            Self::Call(c) => write!(f, "{c}"),
        }
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = &self.args;
        match self.syntax {
            Syntax::Function | Syntax::Internal => {
                write!(f, "{}(", self.name)?;
                write_list(f, args)?;
                f.write_str(")")
            }
            Syntax::Method => match args.split_first() {
                Some((target, rest)) => {
                    write!(f, "{target}.{}(", self.name)?;
                    write_list(f, rest)?;
                    f.write_str(")")
                }
                None => write!(f, "{}()", self.name),
            },
            Syntax::Property => match args.first() {
                Some(target) => write!(f, "{target}.{}", self.name),
                None => f.write_str(&self.name),
            },
            Syntax::Infix if args.len() == 2 => {
                write!(f, "({} {} {})", args[0], self.name, args[1])
            }
            Syntax::Prefix if args.len() == 1 => write!(f, "{} {}", self.name, args[0]),
            Syntax::Postfix if args.len() == 1 => write!(f, "{} {}", args[0], self.name),
            Syntax::Braces => {
                f.write_str("{")?;
                write_list(f, args)?;
                f.write_str("}")
            }
            Syntax::Parentheses | Syntax::Infix | Syntax::Prefix | Syntax::Postfix => {
                f.write_str("(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display() {
        let exp = Exp::func(
            "Order",
            vec![
                Exp::property(Exp::id("[Product].[All]"), "Children"),
                Exp::id("[Measures].[Sales]"),
                Exp::id("BDESC"),
            ],
        );
        assert_eq!(
            exp.to_string(),
            "Order([Product].[All].Children, [Measures].[Sales], [BDESC])"
        );
        assert_eq!(
            Exp::infix("*", Exp::integer(2), Exp::braces(vec![])).to_string(),
            "(2 * {})"
        );
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{"call": {"name": "Count", "args": [{"id": "[Product].[Drink]"}]}}"#;
        let exp: Exp = serde_json::from_str(json).unwrap();
        assert_eq!(exp, Exp::func("Count", vec![Exp::id("[Product].[Drink]")]));
    }
}
