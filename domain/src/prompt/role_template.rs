//! Role templates: goal, constraints and output contract per agent role.

use crate::core::error::DomainError;
use crate::schema::{FormatType, OutputSchema};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What an agent in a given role is asked to do and how it must answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleTemplate {
    pub role: String,
    pub goal: String,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub output_schema: OutputSchema,
}

impl RoleTemplate {
    pub fn new(role: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            constraints: Vec::new(),
            output_schema: OutputSchema::default(),
        }
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    pub fn with_output_schema(mut self, schema: OutputSchema) -> Self {
        self.output_schema = schema;
        self
    }
}

/// Templates keyed by role name.
#[derive(Debug, Clone, Default)]
pub struct TemplateLibrary {
    templates: BTreeMap<String, RoleTemplate>,
}

impl TemplateLibrary {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The five built-in roles: planner, researcher, implementer, reviewer,
    /// synthesizer.
    pub fn builtin() -> Self {
        let planner = RoleTemplate::new(
            "planner",
            "Break the task into ordered, verifiable steps and identify the agents each step needs.",
        )
        .with_constraint("List steps in execution order")
        .with_constraint("Name open questions instead of guessing")
        .with_output_schema(
            OutputSchema::new(FormatType::Json)
                .with_required(["steps"])
                .with_field_type("steps", "array")
                .with_example(r#"{"steps": ["Read the parser", "Add the new marker"]}"#),
        );

        let researcher = RoleTemplate::new(
            "researcher",
            "Gather the facts needed for the task from the supplied context and report them precisely.",
        )
        .with_constraint("Cite the file or source for every finding")
        .with_constraint("Separate facts from assumptions")
        .with_output_schema(
            OutputSchema::new(FormatType::Markdown).with_required(["Findings", "Sources"]),
        );

        let implementer = RoleTemplate::new(
            "implementer",
            "Produce the concrete change that accomplishes the task.",
        )
        .with_constraint("Keep changes minimal and focused on the task")
        .with_constraint("Do not touch files outside the supplied context")
        .with_output_schema(
            OutputSchema::new(FormatType::Json)
                .with_required(["summary", "changes"])
                .with_field_type("summary", "string")
                .with_field_type("changes", "array"),
        );

        let reviewer = RoleTemplate::new(
            "reviewer",
            "Assess the work produced so far for correctness, safety and completeness.",
        )
        .with_constraint("Flag blocking problems with a CRITICAL risk flag")
        .with_constraint("Be specific about what must change")
        .with_output_schema(
            OutputSchema::new(FormatType::Json)
                .with_required(["approved", "issues"])
                .with_field_type("approved", "boolean")
                .with_field_type("issues", "array"),
        );

        let synthesizer = RoleTemplate::new(
            "synthesizer",
            "Combine the agents' results into one coherent final answer.",
        )
        .with_constraint("Resolve disagreements explicitly")
        .with_output_schema(OutputSchema::new(FormatType::Text));

        let mut library = Self::empty();
        for template in [planner, researcher, implementer, reviewer, synthesizer] {
            library.insert(template);
        }
        library
    }

    /// Add or replace the template for `template.role`.
    pub fn insert(&mut self, template: RoleTemplate) {
        self.templates.insert(template.role.clone(), template);
    }

    pub fn with_template(mut self, template: RoleTemplate) -> Self {
        self.insert(template);
        self
    }

    pub fn get(&self, role: &str) -> Result<&RoleTemplate, DomainError> {
        self.templates
            .get(role)
            .ok_or_else(|| DomainError::UnknownRole(role.to_string()))
    }

    pub fn contains(&self, role: &str) -> bool {
        self.templates.contains_key(role)
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }
}
