//! Unresolved call tree for olapcalc queries
//!
//! The query-language front end produces these nodes; the validator in
//! `olapcalc-eval` resolves them against the catalog and function table.
//! Every node is serde-serializable so that queries can be supplied as JSON.

mod expression;
mod identifier;
mod literal;
mod query;
mod visitor;

pub use expression::*;
pub use identifier::*;
pub use literal::*;
pub use query::*;
pub use visitor::*;

pub use olapcalc_types::Syntax;
