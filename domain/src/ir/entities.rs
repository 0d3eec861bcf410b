//! Prompt IR entities

use crate::core::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Version of the IR record layout.
pub const IR_SCHEMA_VERSION: &str = "1.0";

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 10;
pub const DEFAULT_PRIORITY: u8 = 5;
pub const DEFAULT_TOKEN_BUDGET: u32 = 4000;

/// Kind of work an instruction belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseType {
    Planning,
    Research,
    #[default]
    Implementation,
    Review,
    Synthesis,
}

impl PhaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseType::Planning => "planning",
            PhaseType::Research => "research",
            PhaseType::Implementation => "implementation",
            PhaseType::Review => "review",
            PhaseType::Synthesis => "synthesis",
        }
    }

    /// Guess the phase type from a free-form phase name.
    pub fn infer(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("plan") || lower.contains("analy") || lower.contains("design") {
            PhaseType::Planning
        } else if lower.contains("research") || lower.contains("explor") || lower.contains("investigat") {
            PhaseType::Research
        } else if lower.contains("review") || lower.contains("valid") || lower.contains("test") || lower.contains("audit") {
            PhaseType::Review
        } else if lower.contains("synth") || lower.contains("summar") || lower.contains("final") {
            PhaseType::Synthesis
        } else {
            PhaseType::Implementation
        }
    }
}

impl FromStr for PhaseType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "planning" => Ok(PhaseType::Planning),
            "research" => Ok(PhaseType::Research),
            "implementation" => Ok(PhaseType::Implementation),
            "review" => Ok(PhaseType::Review),
            "synthesis" => Ok(PhaseType::Synthesis),
            other => Err(DomainError::UnknownPhaseType(other.to_string())),
        }
    }
}

impl std::fmt::Display for PhaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured description of one agent instruction.
///
/// Deliberately not `Clone`: [`PromptIR::fork`] is the only way to copy a
/// record and always yields a new id, so every transformed value is a
/// distinct, traceable entity.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct PromptIR {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub version: String,
    pub role: String,
    pub intent: String,
    pub phase: PhaseType,
    pub context_refs: Vec<String>,
    pub constraints: Vec<String>,
    pub output_requirements: BTreeMap<String, Value>,
    pub token_budget: u32,
    #[serde(deserialize_with = "deserialize_priority")]
    priority: u8,
    pub model_hint: Option<String>,
    pub temperature: Option<f32>,
    pub schema_id: Option<String>,
    pub metadata: BTreeMap<String, Value>,
}

impl PromptIR {
    pub fn builder(role: impl Into<String>, intent: impl Into<String>) -> PromptIRBuilder {
        PromptIRBuilder::new(role, intent)
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Copy every field into a new record with a fresh id and timestamp.
    ///
    /// The parent id is recorded in `metadata["parent_id"]`.
    pub fn fork(&self) -> PromptIR {
        let mut metadata = self.metadata.clone();
        metadata.insert("parent_id".to_string(), Value::String(self.id.clone()));
        PromptIR {
            id: new_ir_id(),
            created_at: Utc::now(),
            version: self.version.clone(),
            role: self.role.clone(),
            intent: self.intent.clone(),
            phase: self.phase,
            context_refs: self.context_refs.clone(),
            constraints: self.constraints.clone(),
            output_requirements: self.output_requirements.clone(),
            token_budget: self.token_budget,
            priority: self.priority,
            model_hint: self.model_hint.clone(),
            temperature: self.temperature,
            schema_id: self.schema_id.clone(),
            metadata,
        }
    }
}

fn deserialize_priority<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let priority = u8::deserialize(deserializer)?;
    if (MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
        Ok(priority)
    } else {
        Err(serde::de::Error::custom(DomainError::InvalidPriority(priority)))
    }
}

fn new_ir_id() -> String {
    format!("ir-{}", uuid::Uuid::new_v4())
}

/// Builder for [`PromptIR`]; `build` enforces the priority range.
#[derive(Debug, Clone)]
pub struct PromptIRBuilder {
    role: String,
    intent: String,
    phase: PhaseType,
    context_refs: Vec<String>,
    constraints: Vec<String>,
    output_requirements: BTreeMap<String, Value>,
    token_budget: u32,
    priority: u8,
    model_hint: Option<String>,
    temperature: Option<f32>,
    schema_id: Option<String>,
    metadata: BTreeMap<String, Value>,
}

impl PromptIRBuilder {
    fn new(role: impl Into<String>, intent: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            intent: intent.into(),
            phase: PhaseType::default(),
            context_refs: Vec::new(),
            constraints: Vec::new(),
            output_requirements: BTreeMap::new(),
            token_budget: DEFAULT_TOKEN_BUDGET,
            priority: DEFAULT_PRIORITY,
            model_hint: None,
            temperature: None,
            schema_id: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn phase(mut self, phase: PhaseType) -> Self {
        self.phase = phase;
        self
    }

    pub fn context_ref(mut self, reference: impl Into<String>) -> Self {
        self.context_refs.push(reference.into());
        self
    }

    pub fn context_refs(mut self, refs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.context_refs.extend(refs.into_iter().map(Into::into));
        self
    }

    pub fn constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    pub fn output_requirement(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.output_requirements.insert(key.into(), value.into());
        self
    }

    pub fn token_budget(mut self, budget: u32) -> Self {
        self.token_budget = budget;
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn model_hint(mut self, model: impl Into<String>) -> Self {
        self.model_hint = Some(model.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn schema_id(mut self, schema_id: impl Into<String>) -> Self {
        self.schema_id = Some(schema_id.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<PromptIR, DomainError> {
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&self.priority) {
            return Err(DomainError::InvalidPriority(self.priority));
        }
        Ok(PromptIR {
            id: new_ir_id(),
            created_at: Utc::now(),
            version: IR_SCHEMA_VERSION.to_string(),
            role: self.role,
            intent: self.intent,
            phase: self.phase,
            context_refs: self.context_refs,
            constraints: self.constraints,
            output_requirements: self.output_requirements,
            token_budget: self.token_budget,
            priority: self.priority,
            model_hint: self.model_hint,
            temperature: self.temperature,
            schema_id: self.schema_id,
            metadata: self.metadata,
        })
    }
}
