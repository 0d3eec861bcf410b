//! Agent profiles: which role, provider and model an agent name maps to.

use concord_domain::ir::DEFAULT_PRIORITY;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub name: String,
    pub role: String,
    /// Registry name; `None` uses the registry default.
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub priority: u8,
}

impl AgentProfile {
    /// Profile whose role equals its name, on the default provider.
    pub fn for_role(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            role: name.clone(),
            name,
            provider: None,
            model: None,
            temperature: None,
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }
}
