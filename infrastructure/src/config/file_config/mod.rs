//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! Each section converts itself into the application/domain type it
//! configures and reports problems as [`ConfigIssue`]s instead of failing.

mod agents;
mod compiler;
mod governance;
mod logging;
mod orchestrator;
mod providers;
mod roles;

pub use agents::{FileAgentConfig, to_agent_profiles};
pub use compiler::{FileCompilerConfig, FileIrConfig};
pub use governance::{FileGovernanceConfig, FilePolicyConfig};
pub use logging::FileLoggingConfig;
pub use orchestrator::FileOrchestratorConfig;
pub use providers::FileProvidersConfig;
pub use roles::{FileOutputSchemaConfig, FileRoleConfig, to_template_library};

use concord_application::{AgentProfile, OrchestratorConfig};
use concord_domain::{CompilerConfig, ConfigIssue, PolicyRule, TemplateLibrary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub orchestrator: FileOrchestratorConfig,
    pub compiler: FileCompilerConfig,
    pub ir: FileIrConfig,
    pub governance: FileGovernanceConfig,
    /// Role templates added to or overriding the built-in ones
    pub roles: BTreeMap<String, FileRoleConfig>,
    /// Agent name to role/provider/model mapping
    pub agents: BTreeMap<String, FileAgentConfig>,
    pub providers: FileProvidersConfig,
    pub logging: FileLoggingConfig,
}

/// Everything a run needs, converted from a [`FileConfig`].
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub orchestrator: OrchestratorConfig,
    pub compiler: CompilerConfig,
    pub templates: TemplateLibrary,
    pub profiles: Vec<AgentProfile>,
    pub policies: Vec<PolicyRule>,
    pub governance_enabled: bool,
    pub digest_threshold: usize,
    pub default_provider: Option<String>,
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Convert every section, collecting all issues found along the way.
    ///
    /// Invalid values are replaced by defaults (or skipped, for policies,
    /// roles and agents) so the result is always usable; callers decide
    /// whether error-severity issues should stop the run.
    pub fn resolve(&self) -> (ResolvedConfig, Vec<ConfigIssue>) {
        let mut issues = Vec::new();

        let (orchestrator, found) = self.orchestrator.to_orchestrator_config();
        issues.extend(found);
        let (compiler, found) = self.compiler.to_compiler_config();
        issues.extend(found);
        issues.extend(self.ir.validate());
        let (policies, found) = self.governance.to_policy_rules();
        issues.extend(found);
        let (templates, found) = to_template_library(&self.roles);
        issues.extend(found);
        let (profiles, found) =
            to_agent_profiles(&self.agents, &templates, self.ir.default_priority());
        issues.extend(found);

        let resolved = ResolvedConfig {
            orchestrator,
            compiler,
            templates,
            profiles,
            policies,
            governance_enabled: self.governance.enabled,
            digest_threshold: self.ir.digest_threshold,
            default_provider: self.providers.default.clone(),
            logging: self.logging.clone(),
        };
        (resolved, issues)
    }

    /// Validate the entire configuration, returning all detected issues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        self.resolve().1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_domain::Severity;

    #[test]
    fn test_deserialize_full_config() {
        let toml_str = r#"
[orchestrator]
max_phases = 6
confidence_threshold = 0.7
parallel = false

[compiler]
max_files = 4
default_token_budget = 2500

[ir]
digest_threshold = 6

[[governance.policies]]
name = "no_env"
type = "context_ref"
patterns = [".env"]

[agents.scout]
role = "researcher"

[providers]
default = "echo"

[logging]
ledger_path = "runs/ledgers.jsonl"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        let (resolved, issues) = config.resolve();
        assert!(issues.is_empty(), "{:?}", issues);

        assert_eq!(resolved.orchestrator.max_phases, 6);
        assert_eq!(resolved.orchestrator.confidence_threshold, 0.7);
        assert!(!resolved.orchestrator.parallel);
        assert_eq!(resolved.orchestrator.max_workers, 4);
        assert_eq!(resolved.compiler.limits.max_files, 4);
        assert_eq!(resolved.compiler.default_token_budget, 2500);
        assert_eq!(resolved.digest_threshold, 6);
        assert_eq!(resolved.policies.len(), 1);
        assert!(resolved.governance_enabled);
        assert_eq!(resolved.profiles[0].role, "researcher");
        assert_eq!(resolved.default_provider.as_deref(), Some("echo"));
        assert_eq!(
            resolved.logging.ledger_path.as_deref(),
            Some(std::path::Path::new("runs/ledgers.jsonl"))
        );
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = FileConfig::default();
        assert!(config.validate().is_empty());
        let (resolved, _) = config.resolve();
        assert_eq!(resolved.templates.roles().count(), 5);
        assert!(resolved.profiles.is_empty());
        assert!(resolved.logging.events_path.is_none());
    }

    #[test]
    fn test_validate_collects_everything() {
        let toml_str = r#"
[orchestrator]
max_phases = 0
confidence_threshold = -0.1

[ir]
default_priority = 42

[[governance.policies]]
name = "broken"
type = "vibes"
patterns = ["x"]

[agents.ghost]
role = "poltergeist"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        let issues = config.validate();
        assert_eq!(issues.len(), 5);
        assert_eq!(
            issues.iter().filter(|i| i.severity == Severity::Error).count(),
            4
        );
    }
}
