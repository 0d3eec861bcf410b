//! Agent profile configuration from TOML (`[agents.<name>]` sections)

use super::compiler::priority_issue;
use concord_application::AgentProfile;
use concord_domain::{ConfigIssue, ConfigIssueCode, TemplateLibrary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maps an agent name to a role and a model.
///
/// # Example
///
/// ```toml
/// [agents.scout]
/// role = "researcher"
/// provider = "echo"
/// model = "small"
/// temperature = 0.2
/// priority = 7
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAgentConfig {
    /// Defaults to the agent name.
    pub role: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub priority: Option<u8>,
}

/// Build profiles for every configured agent.
///
/// Agents whose role is not in `templates` are reported and skipped.
pub fn to_agent_profiles(
    agents: &BTreeMap<String, FileAgentConfig>,
    templates: &TemplateLibrary,
    default_priority: u8,
) -> (Vec<AgentProfile>, Vec<ConfigIssue>) {
    let mut profiles = Vec::new();
    let mut issues = Vec::new();

    for (name, agent) in agents {
        let role = agent.role.clone().unwrap_or_else(|| name.clone());
        if !templates.contains(&role) {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::UnknownReference {
                    field: format!("agents.{}.role", name),
                    value: role.clone(),
                },
                format!("agents.{}: unknown role '{}'", name, role),
            ));
            continue;
        }

        let field = format!("agents.{}.priority", name);
        let priority = match agent.priority {
            Some(priority) => match priority_issue(&field, priority) {
                Some(issue) => {
                    issues.push(issue);
                    default_priority
                }
                None => priority,
            },
            None => default_priority,
        };

        let mut profile = AgentProfile::for_role(name.clone())
            .with_role(role)
            .with_priority(priority);
        if let Some(provider) = &agent.provider {
            profile = profile.with_provider(provider.clone());
        }
        if let Some(model) = &agent.model {
            profile = profile.with_model(model.clone());
        }
        if let Some(temperature) = agent.temperature {
            profile = profile.with_temperature(temperature);
        }
        profiles.push(profile);
    }

    (profiles, issues)
}
