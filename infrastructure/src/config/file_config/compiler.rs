//! Prompt compiler and IR configuration from TOML (`[compiler]`, `[ir]` sections)

use concord_domain::ir::{DEFAULT_DIGEST_THRESHOLD, DEFAULT_PRIORITY, MAX_PRIORITY, MIN_PRIORITY};
use concord_domain::prompt::PruneLimits;
use concord_domain::{CompilerConfig, ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};

/// Context pruning and budget defaults.
///
/// # Example
///
/// ```toml
/// [compiler]
/// max_files = 5
/// max_lines_per_file = 120
/// default_token_budget = 3000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCompilerConfig {
    pub max_files: usize,
    pub max_lines_per_file: usize,
    pub max_summary_lines: usize,
    /// Used when an instruction carries no budget of its own.
    pub default_token_budget: u32,
}

impl Default for FileCompilerConfig {
    fn default() -> Self {
        let config = CompilerConfig::default();
        Self {
            max_files: config.limits.max_files,
            max_lines_per_file: config.limits.max_lines_per_file,
            max_summary_lines: config.limits.max_summary_lines,
            default_token_budget: config.default_token_budget,
        }
    }
}

impl FileCompilerConfig {
    /// Convert to [`CompilerConfig`]; a zero budget falls back to the default.
    pub fn to_compiler_config(&self) -> (CompilerConfig, Vec<ConfigIssue>) {
        let mut config = CompilerConfig {
            limits: PruneLimits {
                max_files: self.max_files,
                max_lines_per_file: self.max_lines_per_file,
                max_summary_lines: self.max_summary_lines,
            },
            ..CompilerConfig::default()
        };

        let mut issues = Vec::new();
        if self.default_token_budget == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::OutOfRange {
                    field: "compiler.default_token_budget".to_string(),
                    value: "0".to_string(),
                    expected: ">= 1".to_string(),
                },
                format!(
                    "compiler.default_token_budget: 0 is not a budget, using {}",
                    config.default_token_budget
                ),
            ));
        } else {
            config.default_token_budget = self.default_token_budget;
        }

        (config, issues)
    }
}

/// Prompt IR defaults.
///
/// ```toml
/// [ir]
/// digest_threshold = 8
/// default_priority = 5
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileIrConfig {
    /// Context reference count above which references are digested.
    pub digest_threshold: usize,
    /// Priority for agents whose profile does not set one.
    pub default_priority: u8,
}

impl Default for FileIrConfig {
    fn default() -> Self {
        Self {
            digest_threshold: DEFAULT_DIGEST_THRESHOLD,
            default_priority: DEFAULT_PRIORITY,
        }
    }
}

impl FileIrConfig {
    pub fn validate(&self) -> Vec<ConfigIssue> {
        priority_issue("ir.default_priority", self.default_priority)
            .into_iter()
            .collect()
    }

    /// The configured default priority, or [`DEFAULT_PRIORITY`] when invalid.
    pub fn default_priority(&self) -> u8 {
        if (MIN_PRIORITY..=MAX_PRIORITY).contains(&self.default_priority) {
            self.default_priority
        } else {
            DEFAULT_PRIORITY
        }
    }
}

pub(super) fn priority_issue(field: &str, priority: u8) -> Option<ConfigIssue> {
    if (MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
        return None;
    }
    Some(ConfigIssue::error(
        ConfigIssueCode::OutOfRange {
            field: field.to_string(),
            value: priority.to_string(),
            expected: format!("{}..={}", MIN_PRIORITY, MAX_PRIORITY),
        },
        format!(
            "{}: priority {} is outside {}..={}",
            field, priority, MIN_PRIORITY, MAX_PRIORITY
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compiler_defaults() {
        let (config, issues) = FileCompilerConfig::default().to_compiler_config();
        assert!(issues.is_empty());
        assert_eq!(config, CompilerConfig::default());
    }

    #[test]
    fn test_zero_budget_falls_back() {
        let file = FileCompilerConfig {
            default_token_budget: 0,
            max_files: 3,
            ..Default::default()
        };
        let (config, issues) = file.to_compiler_config();
        assert_eq!(config.default_token_budget, 4000);
        assert_eq!(config.limits.max_files, 3);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_ir_priority_range() {
        let file = FileIrConfig {
            default_priority: 11,
            ..Default::default()
        };
        assert_eq!(file.validate().len(), 1);
        assert_eq!(file.default_priority(), DEFAULT_PRIORITY);
        assert!(FileIrConfig::default().validate().is_empty());
    }
}
