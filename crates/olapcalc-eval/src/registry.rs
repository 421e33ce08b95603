//! Function table and overload dispatch
//!
//! Built-ins are variants of the closed [`FunctionKind`] enum. Each
//! [`FunctionDef`] pairs one kind with one resolver: either a decoded
//! [`Signature`] matched against the argument types, or a structural rule
//! that inspects the resolved arguments directly. Definitions are looked up
//! by case-insensitive name and syntax; the first registered definition that
//! accepts the arguments wins.

use indexmap::IndexMap;
use olapcalc_types::{Category, Conversion, ConversionRules, Signature, Syntax};
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;

use crate::error::EvalResult;
use crate::validator::Expr;

/// Binary arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Equal,
    NotEqual,
}

/// Every built-in function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// `{a, b, ...}`
    Braces,
    /// `(m1, m2, ...)`
    Tuple,
    /// `(expr)`
    Grouping,
    Arithmetic(ArithmeticOp),
    Negate,
    Compare(CompareOp),
    /// `<level>.Members` or `<hierarchy>.Members`
    Members,
    Children,
    Parent,
    CurrentMember,
    CrossJoin,
    NonEmptyCrossJoin,
    Order,
    Rank,
    Distinct,
    Extract,
    Hierarchize,
    Count,
    Sum,
    /// `set AS name`
    Alias,
}

/// Resolvers that do not match on categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralResolver {
    /// Second argument must be the named set the alias defines
    Alias,
    /// Exactly one argument of any type
    Grouping,
}

impl StructuralResolver {
    fn accepts(&self, args: &[Expr]) -> bool {
        match self {
            Self::Alias => {
                matches!(args, [set, Expr::NamedSet(_)] if set.data_type().to_set().is_some())
            }
            Self::Grouping => args.len() == 1,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Resolver {
    Signature(Signature),
    Structural(StructuralResolver),
}

/// One overload of a built-in
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub syntax: Syntax,
    pub resolver: Resolver,
    pub kind: FunctionKind,
}

impl FunctionDef {
    pub fn signature(&self) -> Option<&Signature> {
        match &self.resolver {
            Resolver::Signature(s) => Some(s),
            Resolver::Structural(_) => None,
        }
    }

    /// Declared category of argument `index`, `Unknown` for structural
    /// resolvers
    pub fn param_category(&self, index: usize) -> Category {
        self.signature()
            .and_then(|s| s.param_at(index))
            .unwrap_or(Category::Unknown)
    }

    pub fn return_category(&self) -> Category {
        self.signature()
            .map_or(Category::Unknown, |s| s.return_category)
    }

    /// Human-readable call form
    pub fn describe(&self) -> String {
        match &self.resolver {
            Resolver::Signature(s) => s.describe(&self.name),
            Resolver::Structural(StructuralResolver::Alias) => format!("<Set> {} <Name>", self.name),
            Resolver::Structural(StructuralResolver::Grouping) => "(<Expression>)".to_string(),
        }
    }

    /// Try to match `args`; on success the non-identity conversions are
    /// returned
    pub fn matches(&self, args: &[Expr], rules: &ConversionRules) -> Option<Vec<Conversion>> {
        match &self.resolver {
            Resolver::Structural(s) => s.accepts(args).then(Vec::new),
            Resolver::Signature(sig) => {
                if !sig.matches_arity(args.len()) {
                    return None;
                }
                let mut conversions = Vec::new();
                for (i, arg) in args.iter().enumerate() {
                    let category = sig.param_at(i)?;
                    if !rules.can_convert(i, &arg.data_type(), category, &mut conversions) {
                        return None;
                    }
                }
                Some(conversions)
            }
        }
    }
}

impl fmt::Display for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

type Key = (String, Syntax);

/// Registry of function definitions
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    functions: IndexMap<Key, Vec<Arc<FunctionDef>>>,
}

static STANDARD: Lazy<EvalResult<Arc<FunctionTable>>> =
    Lazy::new(|| FunctionTable::with_builtins().map(Arc::new));

impl FunctionTable {
    /// Create a new empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared table of built-in functions, built on first use
    pub fn standard() -> EvalResult<Arc<FunctionTable>> {
        (*STANDARD).clone()
    }

    /// Register a definition after the existing overloads of its name
    pub fn register(&mut self, def: FunctionDef) {
        let key = (def.name.to_ascii_lowercase(), def.syntax);
        self.functions.entry(key).or_default().push(Arc::new(def));
    }

    /// Register an overload from a compact signature string
    pub fn define(
        &mut self,
        name: &str,
        signature: &str,
        description: &str,
        kind: FunctionKind,
    ) -> EvalResult<()> {
        let signature = Signature::decode(signature)?;
        self.register(FunctionDef {
            name: name.to_string(),
            description: description.to_string(),
            syntax: signature.syntax,
            resolver: Resolver::Signature(signature),
            kind,
        });
        Ok(())
    }

    pub fn define_structural(
        &mut self,
        name: &str,
        syntax: Syntax,
        resolver: StructuralResolver,
        description: &str,
        kind: FunctionKind,
    ) {
        self.register(FunctionDef {
            name: name.to_string(),
            description: description.to_string(),
            syntax,
            resolver: Resolver::Structural(resolver),
            kind,
        });
    }

    /// Overloads of `name` with the given syntax, in registration order
    pub fn lookup(&self, name: &str, syntax: Syntax) -> &[Arc<FunctionDef>] {
        self.functions
            .get(&(name.to_ascii_lowercase(), syntax))
            .map_or(&[], Vec::as_slice)
    }

    /// Overloads of `name` under any syntax
    pub fn lookup_any(&self, name: &str) -> Vec<Arc<FunctionDef>> {
        let name = name.to_ascii_lowercase();
        self.functions
            .iter()
            .filter(|((n, _), _)| *n == name)
            .flat_map(|(_, defs)| defs.iter().cloned())
            .collect()
    }

    /// Select the first overload of `name` and `syntax` accepting `args`
    pub fn resolve(
        &self,
        name: &str,
        syntax: Syntax,
        args: &[Expr],
        rules: &ConversionRules,
    ) -> Option<(Arc<FunctionDef>, Vec<Conversion>)> {
        self.lookup(name, syntax)
            .iter()
            .find_map(|def| def.matches(args, rules).map(|c| (def.clone(), c)))
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Arc<FunctionDef>> {
        self.functions.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.functions.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// The built-in functions. More specific overloads are registered
    /// before more general ones.
    pub fn with_builtins() -> EvalResult<Self> {
        use FunctionKind as K;

        let mut t = Self::new();
        t.define("{}", "bx*x", "Set of the listed members, tuples and sets", K::Braces)?;
        t.define_structural(
            "()",
            Syntax::Parentheses,
            StructuralResolver::Grouping,
            "Parenthesized expression",
            K::Grouping,
        );
        t.define("()", "rtmm*m", "Tuple of members of distinct hierarchies", K::Tuple)?;

        t.define("*", "ixxx", "Cross join of two sets", K::CrossJoin)?;
        for (name, op, description) in [
            ("+", ArithmeticOp::Add, "Sum of two numbers"),
            ("-", ArithmeticOp::Subtract, "Difference of two numbers"),
            ("*", ArithmeticOp::Multiply, "Product of two numbers"),
            ("/", ArithmeticOp::Divide, "Quotient of two numbers"),
        ] {
            t.define(name, "innn", description, K::Arithmetic(op))?;
        }
        t.define("-", "Pnn", "Negation", K::Negate)?;
        for (name, op) in [
            ("<", CompareOp::Less),
            ("<=", CompareOp::LessOrEqual),
            (">", CompareOp::Greater),
            (">=", CompareOp::GreaterOrEqual),
            ("=", CompareOp::Equal),
            ("<>", CompareOp::NotEqual),
        ] {
            t.define(name, "ibnn", "Numeric comparison", K::Compare(op))?;
            t.define(name, "ibSS", "String comparison", K::Compare(op))?;
        }

        t.define("Members", "pxl", "Members of a level", K::Members)?;
        t.define("Members", "pxh", "Members of a hierarchy in hierarchical order", K::Members)?;
        t.define("Children", "pxm", "Children of a member", K::Children)?;
        t.define("Parent", "pmm", "Parent of a member", K::Parent)?;
        t.define("CurrentMember", "pmh", "Current member of a hierarchy", K::CurrentMember)?;

        t.define("CrossJoin", "fxxx*x", "Cross join of sets", K::CrossJoin)?;
        t.define(
            "NonEmptyCrossJoin",
            "fxxx*x",
            "Cross join keeping only tuples with a non-empty cell",
            K::NonEmptyCrossJoin,
        )?;
        t.define("Order", "fxxv*yv", "Sort a set by one or more keys", K::Order)?;
        t.define("Rank", "fitx", "1-based position of a tuple in a set", K::Rank)?;
        t.define("Rank", "fitxn", "1-based rank of a tuple by value", K::Rank)?;
        t.define("Distinct", "fxx", "Remove duplicate tuples", K::Distinct)?;
        t.define("Extract", "fxxh*h", "Project a set onto hierarchies", K::Extract)?;
        t.define("Hierarchize", "fxx", "Sort a set in hierarchical order", K::Hierarchize)?;
        t.define("Hierarchize", "fxxy", "Sort a set in post order", K::Hierarchize)?;
        t.define("Count", "fix", "Number of tuples in a set", K::Count)?;
        t.define("Sum", "fnx", "Sum of the current cell over a set", K::Sum)?;
        t.define("Sum", "fnxn", "Sum of an expression over a set", K::Sum)?;
        t.define_structural(
            "AS",
            Syntax::Infix,
            StructuralResolver::Alias,
            "Name a set for the rest of the query",
            K::Alias,
        );
        Ok(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use olapcalc_types::{DataType, HierarchyId, Value};

    fn numeric(i: i64) -> Expr {
        Expr::Literal(Value::Integer(i), DataType::Integer)
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let table = FunctionTable::with_builtins().unwrap();
        assert_eq!(table.lookup("ORDER", Syntax::Function).len(), 1);
        assert_eq!(table.lookup("rank", Syntax::Function).len(), 2);
        assert!(table.lookup("Rank", Syntax::Method).is_empty());
    }

    #[test]
    fn test_star_prefers_cross_join_for_sets() {
        let table = FunctionTable::with_builtins().unwrap();
        let rules = ConversionRules::new();
        let sets = [
            Expr::Literal(Value::Null, DataType::member_set(Some(HierarchyId(1)))),
            Expr::Literal(Value::Null, DataType::member_set(Some(HierarchyId(2)))),
        ];
        let (def, _) = table.resolve("*", Syntax::Infix, &sets, &rules).unwrap();
        assert_eq!(def.kind, FunctionKind::CrossJoin);

        let (def, conversions) = table
            .resolve("*", Syntax::Infix, &[numeric(2), numeric(3)], &rules)
            .unwrap();
        assert_eq!(def.kind, FunctionKind::Arithmetic(ArithmeticOp::Multiply));
        assert_eq!(conversions.len(), 2);
    }

    #[test]
    fn test_single_parenthesized_argument_is_grouping() {
        let table = FunctionTable::with_builtins().unwrap();
        let rules = ConversionRules::new();
        let (def, _) = table
            .resolve("()", Syntax::Parentheses, &[numeric(1)], &rules)
            .unwrap();
        assert_eq!(def.kind, FunctionKind::Grouping);
    }

    #[test]
    fn test_no_match() {
        let table = FunctionTable::with_builtins().unwrap();
        let rules = ConversionRules::new();
        assert!(table.resolve("Count", Syntax::Function, &[numeric(1)], &rules).is_none());
    }
}
