//! IR transformation plugins.
//!
//! A plugin takes the current IR and returns a new one built from
//! [`PromptIR::fork`]. Plugins never record lineage themselves; the pipeline
//! hashes before/after around every call.

use super::entities::{DEFAULT_PRIORITY, PhaseType, PromptIR};
use super::transformation::TransformationType;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PluginError {
    #[error("Plugin {plugin} failed: {reason}")]
    Failed { plugin: String, reason: String },
}

/// A plugin's output: the new IR plus a one-line account of the change.
#[derive(Debug)]
pub struct Transformed {
    pub ir: PromptIR,
    pub description: String,
}

/// `(IR) -> IR` transformation contract.
pub trait IrPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn transformation_type(&self) -> TransformationType;

    /// Produce a new IR. Must not return `ir` itself; start from `ir.fork()`.
    fn apply(&self, ir: &PromptIR) -> Result<Transformed, PluginError>;
}

// ==================== Context Digest ====================

pub const DEFAULT_DIGEST_THRESHOLD: usize = 10;

/// Sentinel reference left in place of a digested reference list.
pub const CONTEXT_DIGEST_SENTINEL: &str = "digest:context";

/// Collapses long context-reference lists into a single sentinel.
#[derive(Debug, Clone)]
pub struct ContextDigestPlugin {
    threshold: usize,
}

impl Default for ContextDigestPlugin {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_DIGEST_THRESHOLD,
        }
    }
}

impl ContextDigestPlugin {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Short summary such as `"12 context references (file: 9, git: 1, ctx: 2)"`.
    pub fn digest(refs: &[String]) -> String {
        let mut by_kind: BTreeMap<&str, usize> = BTreeMap::new();
        for reference in refs {
            let kind = reference
                .split_once(':')
                .map(|(kind, _)| kind)
                .unwrap_or("other");
            *by_kind.entry(kind).or_default() += 1;
        }
        let breakdown = by_kind
            .iter()
            .map(|(kind, count)| format!("{}: {}", kind, count))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} context references ({})", refs.len(), breakdown)
    }
}

impl IrPlugin for ContextDigestPlugin {
    fn name(&self) -> &str {
        "context_digest"
    }

    fn transformation_type(&self) -> TransformationType {
        TransformationType::ContextDigest
    }

    fn apply(&self, ir: &PromptIR) -> Result<Transformed, PluginError> {
        let mut next = ir.fork();
        let count = ir.context_refs.len();

        if count <= self.threshold {
            return Ok(Transformed {
                ir: next,
                description: format!(
                    "{} context references within threshold {}",
                    count, self.threshold
                ),
            });
        }

        let digest = Self::digest(&ir.context_refs);
        let original = std::mem::replace(
            &mut next.context_refs,
            vec![CONTEXT_DIGEST_SENTINEL.to_string()],
        );
        next.metadata
            .insert("original_context_refs".to_string(), json!(original));
        next.metadata
            .insert("context_digest".to_string(), Value::String(digest.clone()));

        Ok(Transformed {
            ir: next,
            description: format!("Digested {}", digest),
        })
    }
}

// ==================== Budget Optimizer ====================

/// Per-priority-point adjustment away from the neutral priority.
pub const PRIORITY_STEP: f64 = 0.1;

/// Rescales the token budget by phase type and priority.
///
/// `budget' = round(budget × phase_multiplier × (1 + (priority − 5) × 0.1))`
#[derive(Debug, Clone)]
pub struct BudgetOptimizerPlugin {
    multipliers: HashMap<PhaseType, f64>,
}

impl Default for BudgetOptimizerPlugin {
    fn default() -> Self {
        let multipliers = HashMap::from([
            (PhaseType::Planning, 1.2),
            (PhaseType::Research, 1.3),
            (PhaseType::Implementation, 1.0),
            (PhaseType::Review, 0.8),
            (PhaseType::Synthesis, 1.1),
        ]);
        Self { multipliers }
    }
}

impl BudgetOptimizerPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_multiplier(mut self, phase: PhaseType, multiplier: f64) -> Self {
        self.multipliers.insert(phase, multiplier);
        self
    }

    pub fn phase_multiplier(&self, phase: PhaseType) -> f64 {
        self.multipliers.get(&phase).copied().unwrap_or(1.0)
    }

    pub fn priority_factor(priority: u8) -> f64 {
        1.0 + (f64::from(priority) - f64::from(DEFAULT_PRIORITY)) * PRIORITY_STEP
    }

    pub fn optimized_budget(&self, budget: u32, phase: PhaseType, priority: u8) -> u32 {
        let scaled =
            f64::from(budget) * self.phase_multiplier(phase) * Self::priority_factor(priority);
        scaled.round().clamp(0.0, f64::from(u32::MAX)) as u32
    }
}

impl IrPlugin for BudgetOptimizerPlugin {
    fn name(&self) -> &str {
        "budget_optimizer"
    }

    fn transformation_type(&self) -> TransformationType {
        TransformationType::BudgetOptimization
    }

    fn apply(&self, ir: &PromptIR) -> Result<Transformed, PluginError> {
        let phase_multiplier = self.phase_multiplier(ir.phase);
        if !phase_multiplier.is_finite() || phase_multiplier < 0.0 {
            return Err(PluginError::Failed {
                plugin: self.name().to_string(),
                reason: format!("invalid multiplier {} for {}", phase_multiplier, ir.phase),
            });
        }

        let mut next = ir.fork();
        let factor = Self::priority_factor(ir.priority());
        let original = ir.token_budget;
        next.token_budget = self.optimized_budget(original, ir.phase, ir.priority());

        next.metadata
            .insert("original_token_budget".to_string(), json!(original));
        next.metadata
            .insert("phase_multiplier".to_string(), json!(phase_multiplier));
        next.metadata
            .insert("priority_factor".to_string(), json!(factor));
        next.metadata.insert(
            "budget_multiplier".to_string(),
            json!(phase_multiplier * factor),
        );

        Ok(Transformed {
            description: format!(
                "Token budget {} -> {} ({} x{:.2}, priority {} x{:.2})",
                original,
                next.token_budget,
                ir.phase,
                phase_multiplier,
                ir.priority(),
                factor
            ),
            ir: next,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ir_with_refs(n: usize) -> PromptIR {
        PromptIR::builder("researcher", "Survey the code")
            .context_refs((0..n).map(|i| format!("file:src/m{}.rs", i)))
            .build()
            .unwrap()
    }

    #[test]
    fn test_digest_leaves_short_lists_alone() {
        let plugin = ContextDigestPlugin::default();
        for n in [0, 1, 10] {
            let ir = ir_with_refs(n);
            let out = plugin.apply(&ir).unwrap();
            assert_eq!(out.ir.context_refs, ir.context_refs);
            assert!(!out.ir.metadata.contains_key("original_context_refs"));
            assert_ne!(out.ir.id, ir.id);
        }
    }

    #[test]
    fn test_digest_collapses_long_lists() {
        let plugin = ContextDigestPlugin::default();
        let mut ir = ir_with_refs(11);
        ir.context_refs.push("git:summary".to_string());

        let out = plugin.apply(&ir).unwrap();
        assert_eq!(out.ir.context_refs, vec![CONTEXT_DIGEST_SENTINEL.to_string()]);

        let original = out.ir.metadata["original_context_refs"].as_array().unwrap();
        assert_eq!(original.len(), 12);
        assert_eq!(
            out.ir.metadata["context_digest"],
            "12 context references (file: 11, git: 1)"
        );
    }

    #[test]
    fn test_digest_custom_threshold() {
        let plugin = ContextDigestPlugin::new(2);
        let out = plugin.apply(&ir_with_refs(3)).unwrap();
        assert_eq!(out.ir.context_refs.len(), 1);
    }

    #[test]
    fn test_budget_formula() {
        let plugin = BudgetOptimizerPlugin::new();
        let cases = [
            (PhaseType::Planning, 5, 1000, 1200),
            (PhaseType::Research, 5, 1000, 1300),
            (PhaseType::Implementation, 10, 1000, 1500),
            (PhaseType::Review, 1, 1000, 480),
            (PhaseType::Synthesis, 7, 2000, 2640),
        ];
        for (phase, priority, budget, expected) in cases {
            let ir = PromptIR::builder("r", "i")
                .phase(phase)
                .priority(priority)
                .token_budget(budget)
                .build()
                .unwrap();
            let out = plugin.apply(&ir).unwrap();
            assert_eq!(out.ir.token_budget, expected, "{phase} p{priority}");
            assert_eq!(out.ir.metadata["original_token_budget"], json!(budget));
        }
    }

    #[test]
    fn test_budget_records_multiplier() {
        let plugin = BudgetOptimizerPlugin::new();
        let ir = PromptIR::builder("r", "i")
            .phase(PhaseType::Review)
            .priority(10)
            .build()
            .unwrap();
        let out = plugin.apply(&ir).unwrap();
        let multiplier = out.ir.metadata["budget_multiplier"].as_f64().unwrap();
        assert!((multiplier - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_multiplier_is_an_error() {
        let plugin = BudgetOptimizerPlugin::new().with_multiplier(PhaseType::Review, f64::NAN);
        let ir = PromptIR::builder("r", "i").phase(PhaseType::Review).build().unwrap();
        assert!(plugin.apply(&ir).is_err());
    }
}
