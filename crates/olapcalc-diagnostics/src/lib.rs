//! Diagnostics for the olapcalc engine
//!
//! This crate provides the error handling infrastructure shared by the
//! resolver, compiler and evaluator: structured error codes, severities and
//! the [`Diagnostic`] report type surfaced to callers.

mod error;
mod error_code;

pub use error::*;
pub use error_code::*;
