//! Policy rules evaluated against a [`PromptIR`] before any plugin runs.

use super::entities::PromptIR;
use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which part of the IR a rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyRuleType {
    /// Each context reference.
    ContextRef,
    /// The intent text.
    Intent,
    /// Each constraint string.
    Constraint,
}

impl PolicyRuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyRuleType::ContextRef => "context_ref",
            PolicyRuleType::Intent => "intent",
            PolicyRuleType::Constraint => "constraint",
        }
    }
}

impl FromStr for PolicyRuleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "context_ref" | "context" => Ok(PolicyRuleType::ContextRef),
            "intent" => Ok(PolicyRuleType::Intent),
            "constraint" => Ok(PolicyRuleType::Constraint),
            other => Err(format!("unknown policy type '{}'", other)),
        }
    }
}

impl fmt::Display for PolicyRuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyAction {
    #[default]
    Deny,
    Flag,
}

impl PolicyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyAction::Deny => "deny",
            PolicyAction::Flag => "flag",
        }
    }
}

impl FromStr for PolicyAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "deny" => Ok(PolicyAction::Deny),
            "flag" => Ok(PolicyAction::Flag),
            other => Err(format!("unknown policy action '{}'", other)),
        }
    }
}

/// A named list of forbidden substrings applied to one part of the IR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub name: String,
    #[serde(rename = "type")]
    pub rule_type: PolicyRuleType,
    pub patterns: Vec<String>,
    #[serde(default)]
    pub action: PolicyAction,
}

impl PolicyRule {
    pub fn new(
        name: impl Into<String>,
        rule_type: PolicyRuleType,
        patterns: impl IntoIterator<Item = impl Into<String>>,
        action: PolicyAction,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        let patterns: Vec<String> = patterns
            .into_iter()
            .map(Into::into)
            .filter(|p: &String| !p.trim().is_empty())
            .collect();
        if patterns.is_empty() {
            return Err(DomainError::InvalidPolicy {
                name,
                reason: "no patterns".to_string(),
            });
        }
        Ok(Self {
            name,
            rule_type,
            patterns,
            action,
        })
    }

    /// Build from loosely typed configuration values.
    pub fn parse(
        name: &str,
        rule_type: &str,
        patterns: &[String],
        action: &str,
    ) -> Result<Self, DomainError> {
        let invalid = |reason: String| DomainError::InvalidPolicy {
            name: name.to_string(),
            reason,
        };
        let rule_type = rule_type.parse::<PolicyRuleType>().map_err(invalid)?;
        let action = action.parse::<PolicyAction>().map_err(invalid)?;
        Self::new(name, rule_type, patterns.iter().cloned(), action)
    }

    /// Every `(pattern, subject)` pair this rule matches in `ir`.
    ///
    /// Matching is a case-insensitive substring test.
    pub fn matches<'a>(&'a self, ir: &'a PromptIR) -> Vec<(&'a str, &'a str)> {
        let subjects: Vec<&str> = match self.rule_type {
            PolicyRuleType::ContextRef => ir.context_refs.iter().map(String::as_str).collect(),
            PolicyRuleType::Intent => vec![ir.intent.as_str()],
            PolicyRuleType::Constraint => ir.constraints.iter().map(String::as_str).collect(),
        };

        let mut hits = Vec::new();
        for pattern in &self.patterns {
            let needle = pattern.to_lowercase();
            for subject in &subjects {
                if subject.to_lowercase().contains(&needle) {
                    hits.push((pattern.as_str(), *subject));
                }
            }
        }
        hits
    }
}

/// Outcome of a policy check.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyVerdict {
    pub approved: bool,
    /// Human-readable descriptions of every matched rule, deny and flag alike.
    pub violations: Vec<String>,
    /// Names of the rules whose action was deny.
    pub denied_by: Vec<String>,
}

impl PolicyVerdict {
    pub fn approved() -> Self {
        Self {
            approved: true,
            ..Default::default()
        }
    }
}

/// Governance hook run by the IR pipeline before any transformation.
pub trait IrGovernance: Send + Sync {
    fn check(&self, ir: &PromptIR) -> PolicyVerdict;
}

/// Applies a list of [`PolicyRule`]s in order.
#[derive(Debug, Clone, Default)]
pub struct PolicyRuleChecker {
    rules: Vec<PolicyRule>,
}

impl PolicyRuleChecker {
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        Self { rules }
    }

    pub fn with_rule(mut self, rule: PolicyRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }
}

impl IrGovernance for PolicyRuleChecker {
    fn check(&self, ir: &PromptIR) -> PolicyVerdict {
        let mut verdict = PolicyVerdict::approved();

        for rule in &self.rules {
            let hits = rule.matches(ir);
            if hits.is_empty() {
                continue;
            }
            for (pattern, subject) in hits {
                verdict.violations.push(format!(
                    "{} [{}]: '{}' matched in {} '{}'",
                    rule.name,
                    rule.action.as_str(),
                    pattern,
                    rule.rule_type,
                    subject
                ));
            }
            if rule.action == PolicyAction::Deny {
                verdict.approved = false;
                verdict.denied_by.push(rule.name.clone());
            }
        }

        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> PolicyRuleChecker {
        PolicyRuleChecker::new(vec![
            PolicyRule::new(
                "no_secrets_dir",
                PolicyRuleType::ContextRef,
                [".ssh", "secrets/"],
                PolicyAction::Deny,
            )
            .unwrap(),
            PolicyRule::new(
                "exfiltration",
                PolicyRuleType::Intent,
                ["exfiltrate"],
                PolicyAction::Deny,
            )
            .unwrap(),
            PolicyRule::new(
                "skip_tests",
                PolicyRuleType::Constraint,
                ["skip tests"],
                PolicyAction::Flag,
            )
            .unwrap(),
        ])
    }

    #[test]
    fn test_clean_ir_is_approved() {
        let ir = PromptIR::builder("implementer", "Add caching")
            .context_ref("file:src/cache.rs")
            .build()
            .unwrap();
        let verdict = checker().check(&ir);
        assert!(verdict.approved);
        assert!(verdict.violations.is_empty());
    }

    #[test]
    fn test_forbidden_context_ref_denies() {
        let ir = PromptIR::builder("implementer", "Add caching")
            .context_ref("file:/home/me/.SSH/id_rsa")
            .build()
            .unwrap();
        let verdict = checker().check(&ir);
        assert!(!verdict.approved);
        assert_eq!(verdict.denied_by, vec!["no_secrets_dir"]);
        assert!(verdict.violations[0].contains(".ssh"));
    }

    #[test]
    fn test_flag_rule_keeps_approval() {
        let ir = PromptIR::builder("implementer", "Ship it")
            .constraint("Skip tests for speed")
            .build()
            .unwrap();
        let verdict = checker().check(&ir);
        assert!(verdict.approved);
        assert_eq!(verdict.violations.len(), 1);
        assert!(verdict.denied_by.is_empty());
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        assert!(PolicyRule::parse("a", "bogus", &["x".to_string()], "deny").is_err());
        assert!(PolicyRule::parse("a", "intent", &["x".to_string()], "maybe").is_err());
        assert!(PolicyRule::parse("a", "intent", &[], "deny").is_err());

        let rule = PolicyRule::parse("a", "context-ref", &["x".to_string()], "FLAG").unwrap();
        assert_eq!(rule.rule_type, PolicyRuleType::ContextRef);
        assert_eq!(rule.action, PolicyAction::Flag);
    }
}
