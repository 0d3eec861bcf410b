//! Role template configuration from TOML (`[roles.<name>]` sections)

use concord_domain::{
    ConfigIssue, ConfigIssueCode, FormatType, OutputSchema, RoleTemplate, TemplateLibrary,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A role template, or an override of a built-in one.
///
/// Fields left out keep the built-in value when the role already exists.
///
/// # Example
///
/// ```toml
/// [roles.security_reviewer]
/// goal = "Find injection and authorization flaws in the change."
/// constraints = ["Cite file and line for every finding"]
///
/// [roles.security_reviewer.output_schema]
/// format = "json"
/// required_fields = ["findings"]
/// definition = { findings = "array" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRoleConfig {
    pub goal: Option<String>,
    pub constraints: Option<Vec<String>>,
    pub output_schema: Option<FileOutputSchemaConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOutputSchemaConfig {
    /// `json`, `markdown`, `xml` or `text`.
    pub format: Option<String>,
    pub required_fields: Vec<String>,
    pub definition: BTreeMap<String, Value>,
    pub max_tokens: Option<usize>,
    pub example: Option<String>,
    pub error_format: Option<String>,
}

impl FileOutputSchemaConfig {
    fn to_output_schema(&self, role: &str) -> (OutputSchema, Option<ConfigIssue>) {
        let raw = self.format.as_deref().unwrap_or("text");
        let (format, issue) = match raw.parse::<FormatType>() {
            Ok(format) => (format, None),
            Err(_) => (
                FormatType::Text,
                Some(ConfigIssue::error(
                    ConfigIssueCode::InvalidEnumValue {
                        field: format!("roles.{}.output_schema.format", role),
                        value: raw.to_string(),
                        valid_values: ["json", "markdown", "xml", "text"]
                            .map(String::from)
                            .to_vec(),
                    },
                    format!("roles.{}.output_schema.format: unknown format '{}'", role, raw),
                )),
            ),
        };

        let schema = OutputSchema {
            format,
            required_fields: self.required_fields.clone(),
            definition: self.definition.clone(),
            max_tokens: self.max_tokens,
            example: self.example.clone(),
            error_format: self.error_format.clone(),
        };
        (schema, issue)
    }
}

/// Built-in templates with the configured roles added or overridden.
pub fn to_template_library(
    roles: &BTreeMap<String, FileRoleConfig>,
) -> (TemplateLibrary, Vec<ConfigIssue>) {
    let mut library = TemplateLibrary::builtin();
    let mut issues = Vec::new();

    for (name, role) in roles {
        let base = library.get(name).ok().cloned();
        let goal = match (&role.goal, &base) {
            (Some(goal), _) => goal.clone(),
            (None, Some(base)) => base.goal.clone(),
            (None, None) => {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::UnknownReference {
                        field: format!("roles.{}.goal", name),
                        value: name.clone(),
                    },
                    format!("roles.{}: a new role needs a goal", name),
                ));
                continue;
            }
        };

        let mut template = RoleTemplate::new(name.clone(), goal);
        template.constraints = match (&role.constraints, &base) {
            (Some(constraints), _) => constraints.clone(),
            (None, Some(base)) => base.constraints.clone(),
            (None, None) => Vec::new(),
        };
        template.output_schema = match (&role.output_schema, &base) {
            (Some(schema), _) => {
                let (schema, issue) = schema.to_output_schema(name);
                issues.extend(issue);
                schema
            }
            (None, Some(base)) => base.output_schema.clone(),
            (None, None) => OutputSchema::default(),
        };

        library.insert(template);
    }

    (library, issues)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles_from(toml_str: &str) -> BTreeMap<String, FileRoleConfig> {
        toml::from_str::<super::super::FileConfig>(toml_str)
            .unwrap()
            .roles
    }

    #[test]
    fn test_new_role() {
        let roles = roles_from(
            r#"
[roles.security_reviewer]
goal = "Find flaws"
constraints = ["Cite lines"]

[roles.security_reviewer.output_schema]
format = "json"
required_fields = ["findings"]
definition = { findings = "array" }
"#,
        );
        let (library, issues) = to_template_library(&roles);
        assert!(issues.is_empty());

        let template = library.get("security_reviewer").unwrap();
        assert_eq!(template.goal, "Find flaws");
        assert_eq!(template.constraints, vec!["Cite lines"]);
        assert_eq!(template.output_schema.format, FormatType::Json);
        assert_eq!(template.output_schema.field_type("findings"), Some("array"));
        assert!(library.contains("planner"));
    }

    #[test]
    fn test_override_keeps_builtin_fields() {
        let roles = roles_from(
            r#"
[roles.reviewer]
goal = "Review strictly"
"#,
        );
        let (library, issues) = to_template_library(&roles);
        assert!(issues.is_empty());

        let builtin = TemplateLibrary::builtin();
        let reviewer = library.get("reviewer").unwrap();
        assert_eq!(reviewer.goal, "Review strictly");
        assert_eq!(
            reviewer.output_schema,
            builtin.get("reviewer").unwrap().output_schema
        );
    }

    #[test]
    fn test_role_issues() {
        let roles = roles_from(
            r#"
[roles.nameless]
constraints = ["x"]

[roles.weird]
goal = "g"
output_schema = { format = "yaml" }
"#,
        );
        let (library, issues) = to_template_library(&roles);
        assert_eq!(issues.len(), 2);
        assert!(!library.contains("nameless"));
        assert_eq!(library.get("weird").unwrap().output_schema.format, FormatType::Text);
    }
}
