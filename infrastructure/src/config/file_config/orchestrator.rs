//! Orchestrator configuration from TOML (`[orchestrator]` section)

use concord_application::OrchestratorConfig;
use concord_domain::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};

/// Run loop settings.
///
/// # Example
///
/// ```toml
/// [orchestrator]
/// max_phases = 6
/// confidence_threshold = 0.8
/// parallel = true
/// max_workers = 4
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOrchestratorConfig {
    /// Hard ceiling on phase executions, refinement iterations included.
    pub max_phases: usize,
    pub confidence_threshold: f64,
    pub parallel: bool,
    pub max_workers: usize,
}

impl Default for FileOrchestratorConfig {
    fn default() -> Self {
        let config = OrchestratorConfig::default();
        Self {
            max_phases: config.max_phases,
            confidence_threshold: config.confidence_threshold,
            parallel: config.parallel,
            max_workers: config.max_workers,
        }
    }
}

impl FileOrchestratorConfig {
    /// Convert to [`OrchestratorConfig`], returning validation issues.
    ///
    /// Zero counts are raised to 1 with a warning. A threshold outside
    /// `[0, 1]` is an error and the default threshold is used in its place.
    pub fn to_orchestrator_config(&self) -> (OrchestratorConfig, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let mut config = OrchestratorConfig::default()
            .with_max_phases(self.max_phases)
            .with_max_workers(self.max_workers)
            .with_parallel(self.parallel);

        for (field, value) in [
            ("orchestrator.max_phases", self.max_phases),
            ("orchestrator.max_workers", self.max_workers),
        ] {
            if value == 0 {
                issues.push(ConfigIssue::warning(
                    ConfigIssueCode::OutOfRange {
                        field: field.to_string(),
                        value: value.to_string(),
                        expected: ">= 1".to_string(),
                    },
                    format!("{}: must be at least 1, using 1", field),
                ));
            }
        }

        if (0.0..=1.0).contains(&self.confidence_threshold) {
            config = config.with_confidence_threshold(self.confidence_threshold);
        } else {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange {
                    field: "orchestrator.confidence_threshold".to_string(),
                    value: self.confidence_threshold.to_string(),
                    expected: "0.0..=1.0".to_string(),
                },
                format!(
                    "orchestrator.confidence_threshold: {} is outside [0, 1]",
                    self.confidence_threshold
                ),
            ));
        }

        (config, issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_application() {
        let (config, issues) = FileOrchestratorConfig::default().to_orchestrator_config();
        assert!(issues.is_empty());
        assert_eq!(config, OrchestratorConfig::default());
    }

    #[test]
    fn test_zero_counts_are_raised() {
        let file = FileOrchestratorConfig {
            max_phases: 0,
            max_workers: 0,
            ..Default::default()
        };
        let (config, issues) = file.to_orchestrator_config();
        assert_eq!(config.max_phases, 1);
        assert_eq!(config.max_workers, 1);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| !i.is_error()));
    }

    #[test]
    fn test_threshold_out_of_range() {
        let file = FileOrchestratorConfig {
            confidence_threshold: 1.5,
            ..Default::default()
        };
        let (config, issues) = file.to_orchestrator_config();
        assert_eq!(config.confidence_threshold, 0.85);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].is_error());
    }
}
