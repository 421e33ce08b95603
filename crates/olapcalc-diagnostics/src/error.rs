//! Diagnostic reports

use crate::ErrorCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Error - compilation or evaluation cannot proceed
    Error,
    /// Warning - potential issue but can continue
    Warning,
    /// Information - informational message
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// A diagnostic message with context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity level
    pub severity: Severity,
    /// Error code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Additional context or help
    pub help: Option<String>,
    /// Related information, e.g. the candidate signatures of a failed call
    pub related: Vec<String>,
}

impl Diagnostic {
    /// Create a new error diagnostic
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            help: code.info().help.map(str::to_string),
            related: Vec::new(),
        }
    }

    /// Create a new warning diagnostic
    pub fn warning(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message)
        }
    }

    /// Set help text
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Add related information
    pub fn with_related(mut self, info: impl Into<String>) -> Self {
        self.related.push(info.into());
        self
    }

    /// Render the diagnostic on several lines, colored when the
    /// `colored` feature is enabled.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.header());
        if let Some(help) = &self.help {
            out.push_str(&format!("\n  help: {help}"));
        }
        for related in &self.related {
            out.push_str(&format!("\n  note: {related}"));
        }
        out
    }

    #[cfg(feature = "colored")]
    fn header(&self) -> String {
        use colored::Colorize;
        let severity = match self.severity {
            Severity::Error => self.severity.to_string().red().bold(),
            Severity::Warning => self.severity.to_string().yellow().bold(),
            Severity::Info => self.severity.to_string().blue().bold(),
        };
        format!("{}[{}]: {}", severity, self.code, self.message)
    }

    #[cfg(not(feature = "colored"))]
    fn header(&self) -> String {
        format!("{}[{}]: {}", self.severity, self.code, self.message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} - {}", self.severity, self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OLAP0001, OLAP0200};

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::error(OLAP0001, "No function matches signature 'Foo(<Set>)'");
        assert!(diag.to_string().contains("OLAP0001"));
        assert!(diag.to_string().starts_with("error"));
    }

    #[test]
    fn test_diagnostic_render_includes_help() {
        let diag = Diagnostic::error(OLAP0200, "Cross join size 1000 exceeds limit 10")
            .with_related("CrossJoin(<Set>, <Set>)");
        let text = diag.render();
        assert!(text.contains("help:"));
        assert!(text.contains("note: CrossJoin"));
    }
}
