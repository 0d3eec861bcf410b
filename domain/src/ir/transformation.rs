//! Transformation lineage records.

use super::entities::PromptIR;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// What a plugin did to an IR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationType {
    ContextDigest,
    BudgetOptimization,
    Custom(String),
}

impl TransformationType {
    pub fn as_str(&self) -> &str {
        match self {
            TransformationType::ContextDigest => "context_digest",
            TransformationType::BudgetOptimization => "budget_optimization",
            TransformationType::Custom(name) => name,
        }
    }
}

/// One applied transformation, linking the IR state before and after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IRTransformation {
    pub transformation_type: TransformationType,
    pub description: String,
    pub hash_before: String,
    pub hash_after: String,
    pub plugin: String,
    pub source_ir: String,
    pub result_ir: String,
    pub timestamp: DateTime<Utc>,
}

impl IRTransformation {
    pub fn record(
        plugin: &str,
        transformation_type: TransformationType,
        description: impl Into<String>,
        before: &PromptIR,
        after: &PromptIR,
    ) -> Self {
        Self {
            transformation_type,
            description: description.into(),
            hash_before: state_hash(before),
            hash_after: state_hash(after),
            plugin: plugin.to_string(),
            source_ir: before.id.clone(),
            result_ir: after.id.clone(),
            timestamp: Utc::now(),
        }
    }

    /// Whether the transformation left the IR content untouched.
    pub fn is_identity(&self) -> bool {
        self.hash_before == self.hash_after
    }
}

/// SHA-256 (hex) of an IR's content.
///
/// Identity fields (`id`, `created_at`, `metadata.parent_id`) are excluded so
/// equal content hashes equally across forks.
pub fn state_hash(ir: &PromptIR) -> String {
    let mut value = serde_json::to_value(ir).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.remove("id");
        map.remove("created_at");
        if let Some(Value::Object(metadata)) = map.get_mut("metadata") {
            metadata.remove("parent_id");
        }
    }

    let mut hasher = Sha256::new();
    hasher.update(value.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Check that consecutive records chain: each `hash_before` equals the
/// previous `hash_after`.
pub fn verify_chain(log: &[IRTransformation]) -> bool {
    log.windows(2)
        .all(|pair| pair[0].hash_after == pair[1].hash_before)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_ignores_identity_fields() {
        let ir = PromptIR::builder("r", "intent").build().unwrap();
        let forked = ir.fork();
        assert_ne!(ir.id, forked.id);
        assert_eq!(state_hash(&ir), state_hash(&forked));
    }

    #[test]
    fn test_hash_tracks_content() {
        let ir = PromptIR::builder("r", "intent").build().unwrap();
        let mut changed = ir.fork();
        changed.token_budget += 1;
        assert_ne!(state_hash(&ir), state_hash(&changed));
        assert_eq!(state_hash(&ir).len(), 64);
    }

    #[test]
    fn test_record_and_chain() {
        let a = PromptIR::builder("r", "i").build().unwrap();
        let mut b = a.fork();
        b.token_budget = 10;
        let mut c = b.fork();
        c.intent = "other".to_string();

        let log = vec![
            IRTransformation::record("p1", TransformationType::BudgetOptimization, "x", &a, &b),
            IRTransformation::record("p2", TransformationType::Custom("rewrite".into()), "y", &b, &c),
        ];
        assert!(verify_chain(&log));
        assert!(!log[0].is_identity());
        assert_eq!(log[0].source_ir, a.id);
        assert_eq!(log[1].result_ir, c.id);

        let broken = vec![log[1].clone(), log[0].clone()];
        assert!(!verify_chain(&broken));
    }
}
