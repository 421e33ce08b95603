//! OLAP expression compile and evaluation core
//!
//! This crate bundles:
//! - Typed function signatures and overload resolution
//! - Compilation of expressions into calculation trees
//! - An evaluation context with savepoints
//! - Tuple set algebra, the non-empty cross-join optimizer, ordering and
//!   ranking
//! - An in-memory cube model backed by a JSON schema
//!
//! # Example
//!
//! ```ignore
//! use olapcalc::{CubeSchema, InMemoryCatalog, InMemoryCellReader, Statement};
//! use std::sync::Arc;
//!
//! let schema = CubeSchema::from_json_file("sales.json")?;
//! let catalog = Arc::new(InMemoryCatalog::from_schema(&schema)?);
//! let reader = Arc::new(InMemoryCellReader::from_schema(&schema, &catalog)?);
//! let statement = Statement::new(catalog, reader)?;
//! let result = statement.execute(&query)?;
//! ```

// Re-export all public APIs from internal crates
pub use olapcalc_ast as ast;
pub use olapcalc_diagnostics as diagnostics;
pub use olapcalc_eval as eval;
pub use olapcalc_model as model;
pub use olapcalc_types as types;

// Convenience re-exports
pub use olapcalc_ast::{Axis, Exp, Query};
pub use olapcalc_eval::{EngineConfig, EvalError, EvalResult, QueryPlan, QueryResult, Statement};
pub use olapcalc_model::{Catalog, CellReader, CubeSchema, InMemoryCatalog, InMemoryCellReader};

// CLI module (only available with cli feature)
#[cfg(feature = "cli")]
pub mod cli;
