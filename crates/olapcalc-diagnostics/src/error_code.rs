//! Error codes following a structured numbering system
//!
//! Error code ranges:
//! - OLAP0001-OLAP0099: Resolution errors (no applicable function, unknown identifier)
//! - OLAP0100-OLAP0199: Evaluation errors (runtime faults)
//! - OLAP0200-OLAP0299: Resource limits (result limit, cancellation, timeout)
//! - OLAP0300-OLAP0399: Invariant violations (arity, hierarchy mismatch)
//! - OLAP0400-OLAP0499: Model errors (catalog, schema)
//! - OLAP0500-OLAP0599: System errors (I/O, configuration)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Error code identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode(u16);

impl ErrorCode {
    /// Create a new error code
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Get the numeric code
    pub const fn code(&self) -> u16 {
        self.0
    }

    /// Get error information for this code
    pub fn info(&self) -> &'static ErrorInfo {
        ERROR_INFO.get(&self.0).unwrap_or(&UNKNOWN_ERROR)
    }

    /// Check if this is a resolution error (0001-0099)
    pub const fn is_resolution_error(&self) -> bool {
        self.0 >= 1 && self.0 < 100
    }

    /// Check if this is an evaluation error (0100-0199)
    pub const fn is_evaluation_error(&self) -> bool {
        self.0 >= 100 && self.0 < 200
    }

    /// Check if this is a resource limit error (0200-0299)
    pub const fn is_resource_error(&self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Check if this is an invariant violation (0300-0399)
    pub const fn is_invariant_error(&self) -> bool {
        self.0 >= 300 && self.0 < 400
    }

    /// Check if this is a model error (0400-0499)
    pub const fn is_model_error(&self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// Check if this is a system error (0500-0599)
    pub const fn is_system_error(&self) -> bool {
        self.0 >= 500 && self.0 < 600
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OLAP{:04}", self.0)
    }
}

/// Information about an error code
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// Short description of the error
    pub description: &'static str,
    /// Detailed help text
    pub help: Option<&'static str>,
}

impl ErrorInfo {
    const fn new(description: &'static str) -> Self {
        Self {
            description,
            help: None,
        }
    }

    const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

static UNKNOWN_ERROR: ErrorInfo = ErrorInfo::new("Unknown error");

static ERROR_INFO: LazyLock<HashMap<u16, ErrorInfo>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    // Resolution errors (0001-0099)
    map.insert(1, ErrorInfo::new("No applicable function")
        .with_help("Check the argument types against the function signatures"));
    map.insert(2, ErrorInfo::new("Unknown identifier")
        .with_help("Check that the member, level or hierarchy exists in the cube"));
    map.insert(3, ErrorInfo::new("Unknown function"));
    map.insert(4, ErrorInfo::new("Invalid signature string"));
    map.insert(5, ErrorInfo::new("Unsupported result style"));
    map.insert(6, ErrorInfo::new("Invalid alias"));
    map.insert(7, ErrorInfo::new("Type mismatch"));

    // Evaluation errors (0100-0199)
    map.insert(100, ErrorInfo::new("Evaluation failed"));
    map.insert(101, ErrorInfo::new("Invalid conversion"));
    map.insert(102, ErrorInfo::new("Cyclic calculated member"));
    map.insert(103, ErrorInfo::new("Recursion limit exceeded"));

    // Resource limits (0200-0299)
    map.insert(200, ErrorInfo::new("Result limit exceeded")
        .with_help("Reduce the size of the cross join or raise the result limit"));
    map.insert(201, ErrorInfo::new("Execution cancelled"));
    map.insert(202, ErrorInfo::new("Execution timed out"));

    // Invariant violations (0300-0399)
    map.insert(300, ErrorInfo::new("Arity mismatch"));
    map.insert(301, ErrorInfo::new("Hierarchy mismatch"));
    map.insert(302, ErrorInfo::new("Unbalanced savepoint"));

    // Model errors (0400-0499)
    map.insert(400, ErrorInfo::new("Invalid cube schema"));
    map.insert(401, ErrorInfo::new("Member not found"));
    map.insert(402, ErrorInfo::new("Invalid member range"));

    // System errors (0500-0599)
    map.insert(500, ErrorInfo::new("Internal error"));
    map.insert(501, ErrorInfo::new("I/O error"));
    map.insert(502, ErrorInfo::new("Configuration error"));

    map
});

// Resolution errors
pub const OLAP0001: ErrorCode = ErrorCode::new(1);
pub const OLAP0002: ErrorCode = ErrorCode::new(2);
pub const OLAP0003: ErrorCode = ErrorCode::new(3);
pub const OLAP0004: ErrorCode = ErrorCode::new(4);
pub const OLAP0005: ErrorCode = ErrorCode::new(5);
pub const OLAP0006: ErrorCode = ErrorCode::new(6);
pub const OLAP0007: ErrorCode = ErrorCode::new(7);

// Evaluation errors
pub const OLAP0100: ErrorCode = ErrorCode::new(100);
pub const OLAP0101: ErrorCode = ErrorCode::new(101);
pub const OLAP0102: ErrorCode = ErrorCode::new(102);
pub const OLAP0103: ErrorCode = ErrorCode::new(103);

// Resource limits
pub const OLAP0200: ErrorCode = ErrorCode::new(200);
pub const OLAP0201: ErrorCode = ErrorCode::new(201);
pub const OLAP0202: ErrorCode = ErrorCode::new(202);

// Invariant violations
pub const OLAP0300: ErrorCode = ErrorCode::new(300);
pub const OLAP0301: ErrorCode = ErrorCode::new(301);
pub const OLAP0302: ErrorCode = ErrorCode::new(302);

// Model errors
pub const OLAP0400: ErrorCode = ErrorCode::new(400);
pub const OLAP0401: ErrorCode = ErrorCode::new(401);
pub const OLAP0402: ErrorCode = ErrorCode::new(402);

// System errors
pub const OLAP0500: ErrorCode = ErrorCode::new(500);
pub const OLAP0501: ErrorCode = ErrorCode::new(501);
pub const OLAP0502: ErrorCode = ErrorCode::new(502);
