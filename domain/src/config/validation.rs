//! Configuration validation issues.
//!
//! Loaders collect every problem they find into a `Vec<ConfigIssue>` instead
//! of failing on the first one, so a user sees the full list at once.

use std::fmt;

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal: the configuration cannot work at all.
    Error,
    /// Non-fatal: a default is used instead.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// A numeric value outside its allowed range.
    OutOfRange {
        field: String,
        value: String,
        expected: String,
    },
    /// A string that does not name a known variant.
    InvalidEnumValue {
        field: String,
        value: String,
        valid_values: Vec<String>,
    },
    /// A governance policy record that cannot be used.
    InvalidPolicy { name: String },
    /// A name referring to something that is not defined.
    UnknownReference { field: String, value: String },
}

/// A detected issue in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", level, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_level() {
        let issue = ConfigIssue::error(
            ConfigIssueCode::OutOfRange {
                field: "orchestrator.max_phases".to_string(),
                value: "0".to_string(),
                expected: ">= 1".to_string(),
            },
            "orchestrator.max_phases must be at least 1",
        );
        assert!(issue.is_error());
        assert_eq!(
            issue.to_string(),
            "error: orchestrator.max_phases must be at least 1"
        );
    }
}
