//! Metadata model for the olapcalc engine
//!
//! This crate provides:
//! - The `Catalog` trait: hierarchy, level and member lookup and navigation
//! - The `CellReader` trait: cell values for a full coordinate
//! - A JSON cube schema
//! - In-memory implementations of both traits built from a schema

pub mod catalog;
pub mod memory;
pub mod reader;
pub mod schema;

pub use catalog::*;
pub use memory::*;
pub use reader::*;
pub use schema::*;
