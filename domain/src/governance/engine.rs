//! Principle-ordered governance evaluation with an append-only audit log.

use super::entities::{
    ActionType, AuditEntry, GovernanceDecision, GovernanceResult, Principle,
};
use super::patterns::{DESTRUCTIVE, SECRETS, protected_prefix};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Trust score below which a high-risk action goes to a human.
pub const SOVEREIGNTY_TRUST_FLOOR: f64 = 0.7;
/// Trust score at or above which any surviving action is approved.
pub const AUTO_APPROVE_TRUST: f64 = 0.95;
/// Trust score below which any surviving action goes to a human.
pub const REVIEW_TRUST_FLOOR: f64 = 0.5;

/// Detail keys inspected for write targets.
const PATH_KEYS: &[&str] = &["path", "target", "file", "destination", "dest"];

/// Counts per decision over the audit log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub total: usize,
    pub approved: usize,
    pub denied: usize,
    pub flagged: usize,
    pub review: usize,
}

/// Evaluates proposed actions. Shared across a process; the audit log only grows.
#[derive(Debug, Default)]
pub struct GovernanceEngine {
    audit_log: RwLock<Vec<AuditEntry>>,
}

impl GovernanceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate one action. Never fails; always appends exactly one audit entry.
    ///
    /// Rules, first match wins:
    /// 1. destructive command or protected-path write → deny
    /// 2. secret-shaped content → deny
    /// 3. high-risk action without a description → flag
    /// 4. high-risk action with trust below 0.7 → require review
    /// 5. trust banding: ≥0.95 approve; ≥0.5 approve (flag if high-risk); else review
    pub fn evaluate(
        &self,
        action: &ActionType,
        details: &BTreeMap<String, Value>,
        context: &BTreeMap<String, Value>,
        trust_score: f64,
    ) -> GovernanceResult {
        let trust = if trust_score.is_nan() {
            0.0
        } else {
            trust_score.clamp(0.0, 1.0)
        };
        let result = Self::decide(action, details, trust);

        self.append(AuditEntry {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            action_type: action.clone(),
            decision: result.decision,
            reason: result.reason.clone(),
            trust_score: trust,
            violated_principles: result.violated_principles.clone(),
            context_keys: context.keys().cloned().collect(),
        });

        result
    }

    fn decide(
        action: &ActionType,
        details: &BTreeMap<String, Value>,
        trust: f64,
    ) -> GovernanceResult {
        let content = format!(
            "{} {}",
            action.as_str(),
            serde_json::to_string(details).unwrap_or_default()
        );

        // 1. Harm prevention
        if let Some(pattern) = DESTRUCTIVE.first_match(&content) {
            return GovernanceResult::new(
                GovernanceDecision::Deny,
                format!("Harm prevention: {}", pattern.description),
                trust,
            )
            .violating(Principle::HarmPrevention)
            .requiring("block_action")
            .with_metadata("pattern", pattern.id);
        }
        if action.writes_files()
            && let Some((path, prefix)) = protected_target(details)
        {
            return GovernanceResult::new(
                GovernanceDecision::Deny,
                format!("Harm prevention: write to protected path {}", path),
                trust,
            )
            .violating(Principle::HarmPrevention)
            .requiring("block_action")
            .with_metadata("protected_prefix", prefix);
        }

        // 2. Privacy
        if let Some(pattern) = SECRETS.first_match(&content) {
            return GovernanceResult::new(
                GovernanceDecision::Deny,
                format!("Privacy: content contains {}", pattern.description),
                trust,
            )
            .violating(Principle::Privacy)
            .requiring("remove_secret")
            .with_metadata("pattern", pattern.id);
        }

        let high_risk = action.is_high_risk();

        // 3. Transparency
        if high_risk && !has_description(details) {
            return GovernanceResult::new(
                GovernanceDecision::Flag,
                format!("Transparency: high-risk action '{}' has no description", action),
                trust,
            )
            .violating(Principle::Transparency)
            .requiring("add_description");
        }

        // 4. Human sovereignty
        if high_risk && trust < SOVEREIGNTY_TRUST_FLOOR {
            return GovernanceResult::new(
                GovernanceDecision::RequireReview,
                format!(
                    "Human sovereignty: high-risk action '{}' at trust {:.2}",
                    action, trust
                ),
                trust,
            )
            .violating(Principle::HumanSovereignty)
            .requiring("request_human_review");
        }

        // 5. Trust banding
        if trust >= AUTO_APPROVE_TRUST {
            GovernanceResult::new(GovernanceDecision::Approve, "High trust", trust)
        } else if trust >= REVIEW_TRUST_FLOOR {
            if high_risk {
                GovernanceResult::new(
                    GovernanceDecision::Flag,
                    "Moderate trust for high-risk action",
                    trust,
                )
                .requiring("monitor_execution")
            } else {
                GovernanceResult::new(GovernanceDecision::Approve, "Moderate trust", trust)
            }
        } else {
            GovernanceResult::new(GovernanceDecision::RequireReview, "Low trust", trust)
                .requiring("request_human_review")
        }
    }

    fn append(&self, entry: AuditEntry) {
        match self.audit_log.write() {
            Ok(mut log) => log.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }

    /// Snapshot of the audit log in evaluation order.
    pub fn audit_log(&self) -> Vec<AuditEntry> {
        match self.audit_log.read() {
            Ok(log) => log.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn audit_len(&self) -> usize {
        match self.audit_log.read() {
            Ok(log) => log.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn summary(&self) -> AuditSummary {
        self.audit_log()
            .iter()
            .fold(AuditSummary::default(), |mut acc, entry| {
                acc.total += 1;
                match entry.decision {
                    GovernanceDecision::Approve => acc.approved += 1,
                    GovernanceDecision::Deny => acc.denied += 1,
                    GovernanceDecision::Flag => acc.flagged += 1,
                    GovernanceDecision::RequireReview => acc.review += 1,
                }
                acc
            })
    }
}

fn protected_target(details: &BTreeMap<String, Value>) -> Option<(String, &'static str)> {
    PATH_KEYS.iter().find_map(|key| {
        let path = details.get(*key)?.as_str()?;
        protected_prefix(path).map(|prefix| (path.to_string(), prefix))
    })
}

fn has_description(details: &BTreeMap<String, Value>) -> bool {
    details
        .get("description")
        .and_then(Value::as_str)
        .is_some_and(|d| !d.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn details(pairs: &[(&str, &str)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    fn eval(engine: &GovernanceEngine, action: ActionType, d: &[(&str, &str)], trust: f64) -> GovernanceResult {
        engine.evaluate(&action, &details(d), &BTreeMap::new(), trust)
    }

    #[test]
    fn test_destructive_denied_regardless_of_trust() {
        let engine = GovernanceEngine::new();
        for trust in [0.0, 0.5, 0.99, 1.0] {
            let result = eval(
                &engine,
                ActionType::CodeExecution,
                &[("command", "rm -rf /"), ("description", "cleanup")],
                trust,
            );
            assert_eq!(result.decision, GovernanceDecision::Deny);
            assert_eq!(result.violated_principles, vec![Principle::HarmPrevention]);
        }
        assert_eq!(engine.audit_len(), 4);
    }

    #[test]
    fn test_protected_path_write_denied() {
        let engine = GovernanceEngine::new();
        let result = eval(
            &engine,
            ActionType::FileWrite,
            &[("path", "/etc/hosts"), ("content", "127.0.0.1 x")],
            1.0,
        );
        assert!(result.is_denied());
        assert_eq!(result.metadata["protected_prefix"], "/etc/");

        let read = eval(&engine, ActionType::FileRead, &[("path", "/etc/hosts")], 1.0);
        assert_eq!(read.decision, GovernanceDecision::Approve);
    }

    #[test]
    fn test_secret_denied_under_privacy() {
        let engine = GovernanceEngine::new();
        let result = eval(
            &engine,
            ActionType::NetworkRequest,
            &[("header", "Bearer abcdefghijklmnopqrstuvwxyz"), ("description", "call api")],
            1.0,
        );
        assert!(result.is_denied());
        assert_eq!(result.violation_names(), vec!["privacy".to_string()]);
    }

    #[test]
    fn test_transparency_flag_before_sovereignty() {
        let engine = GovernanceEngine::new();
        let result = eval(&engine, ActionType::CodeExecution, &[("command", "ls")], 0.1);
        assert_eq!(result.decision, GovernanceDecision::Flag);
        assert_eq!(result.violated_principles, vec![Principle::Transparency]);
    }

    #[test]
    fn test_sovereignty_review_for_low_trust_high_risk() {
        let engine = GovernanceEngine::new();
        let result = eval(
            &engine,
            ActionType::FileDeletion,
            &[("path", "/tmp/x"), ("description", "remove temp")],
            0.69,
        );
        assert_eq!(result.decision, GovernanceDecision::RequireReview);
        assert_eq!(result.violated_principles, vec![Principle::HumanSovereignty]);
    }

    #[test]
    fn test_trust_banding() {
        let engine = GovernanceEngine::new();
        let desc = [("description", "fetch docs"), ("url", "https://example.com")];

        let high = eval(&engine, ActionType::NetworkRequest, &desc, 0.95);
        assert_eq!(high.decision, GovernanceDecision::Approve);

        let moderate_risky = eval(&engine, ActionType::NetworkRequest, &desc, 0.8);
        assert_eq!(moderate_risky.decision, GovernanceDecision::Flag);

        let moderate_safe = eval(&engine, ActionType::FileRead, &[("path", "a.rs")], 0.5);
        assert_eq!(moderate_safe.decision, GovernanceDecision::Approve);

        let low = eval(&engine, ActionType::FileRead, &[("path", "a.rs")], 0.49);
        assert_eq!(low.decision, GovernanceDecision::RequireReview);
    }

    #[test]
    fn test_trust_is_clamped() {
        let engine = GovernanceEngine::new();
        let result = eval(&engine, ActionType::FileRead, &[], 7.0);
        assert_eq!(result.trust_score, 1.0);
        let result = eval(&engine, ActionType::FileRead, &[], f64::NAN);
        assert_eq!(result.decision, GovernanceDecision::RequireReview);
    }

    #[test]
    fn test_audit_entry_per_evaluation() {
        let engine = GovernanceEngine::new();
        let mut context = BTreeMap::new();
        context.insert("run_id".to_string(), json!("r1"));
        engine.evaluate(&ActionType::FileRead, &BTreeMap::new(), &context, 1.0);
        eval(&engine, ActionType::CodeExecution, &[("command", "mkfs /dev/sda")], 1.0);

        let log = engine.audit_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].context_keys, vec!["run_id".to_string()]);
        assert_eq!(log[1].decision, GovernanceDecision::Deny);

        let summary = engine.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.approved, 1);
        assert_eq!(summary.denied, 1);
    }
}
