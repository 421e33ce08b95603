//! CLI functionality for the olapcalc tool
//!
//! - Query execution and plan display
//! - Function table listing
//! - Output formatting
//! - Stderr logging

pub mod execute;
pub mod logger;
pub mod output;
