//! Governance configuration from TOML (`[governance]` section)

use concord_domain::{ConfigIssue, ConfigIssueCode, PolicyRule};
use serde::{Deserialize, Serialize};

/// Action gating and instruction policies.
///
/// # Example
///
/// ```toml
/// [governance]
/// enabled = true
///
/// [[governance.policies]]
/// name = "no_secrets"
/// type = "context_ref"
/// patterns = [".env", "secrets/"]
/// action = "deny"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileGovernanceConfig {
    /// Gate the final output through the governance engine.
    pub enabled: bool,
    pub policies: Vec<FilePolicyConfig>,
}

impl Default for FileGovernanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            policies: Vec::new(),
        }
    }
}

/// One `[[governance.policies]]` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilePolicyConfig {
    pub name: String,
    /// `context_ref`, `intent` or `constraint`.
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(default)]
    pub patterns: Vec<String>,
    /// `deny` or `flag`.
    #[serde(default = "default_action")]
    pub action: String,
}

fn default_action() -> String {
    "deny".to_string()
}

impl FileGovernanceConfig {
    /// Parse every policy record, skipping the invalid ones.
    pub fn to_policy_rules(&self) -> (Vec<PolicyRule>, Vec<ConfigIssue>) {
        let mut rules = Vec::new();
        let mut issues = Vec::new();

        for policy in &self.policies {
            match PolicyRule::parse(
                &policy.name,
                &policy.rule_type,
                &policy.patterns,
                &policy.action,
            ) {
                Ok(rule) => rules.push(rule),
                Err(e) => issues.push(ConfigIssue::error(
                    ConfigIssueCode::InvalidPolicy {
                        name: policy.name.clone(),
                    },
                    format!("governance.policies: {}", e),
                )),
            }
        }

        (rules, issues)
    }
}
