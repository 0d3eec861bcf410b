//! Governance check followed by the plugin chain.

use super::entities::PromptIR;
use super::plugins::{BudgetOptimizerPlugin, ContextDigestPlugin, IrPlugin};
use super::policy::IrGovernance;
use super::transformation::{IRTransformation, verify_chain};
use std::sync::RwLock;
use tracing::{debug, warn};

/// Result of [`PromptIRPipeline::process`].
#[derive(Debug)]
pub struct PipelineOutcome {
    /// Last good IR. On denial this is the input, untouched.
    pub ir: PromptIR,
    pub approved: bool,
    pub violations: Vec<String>,
    /// Records appended during this call, in plugin order.
    pub transformations: Vec<IRTransformation>,
    /// `"<plugin>: <error>"` for every plugin that failed and was skipped.
    pub plugin_failures: Vec<String>,
}

/// A registered plugin together with the lineage log it owns.
struct PluginStage {
    plugin: Box<dyn IrPlugin>,
    log: RwLock<Vec<IRTransformation>>,
}

impl PluginStage {
    fn append(&self, record: IRTransformation) {
        match self.log.write() {
            Ok(mut log) => log.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }

    fn snapshot(&self) -> Vec<IRTransformation> {
        match self.log.read() {
            Ok(log) => log.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Runs an optional governance check, then each plugin in registration order.
///
/// A denial short-circuits: no plugin runs. A failing plugin is logged and
/// skipped, and the next plugin sees the last good IR.
#[derive(Default)]
pub struct PromptIRPipeline {
    governance: Option<Box<dyn IrGovernance>>,
    stages: Vec<PluginStage>,
}

impl PromptIRPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context digest followed by budget optimization.
    pub fn standard(digest_threshold: usize) -> Self {
        Self::new()
            .with_plugin(ContextDigestPlugin::new(digest_threshold))
            .with_plugin(BudgetOptimizerPlugin::new())
    }

    pub fn with_governance(mut self, governance: impl IrGovernance + 'static) -> Self {
        self.governance = Some(Box::new(governance));
        self
    }

    pub fn with_plugin(mut self, plugin: impl IrPlugin + 'static) -> Self {
        self.stages.push(PluginStage {
            plugin: Box::new(plugin),
            log: RwLock::new(Vec::new()),
        });
        self
    }

    pub fn has_governance(&self) -> bool {
        self.governance.is_some()
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.plugin.name()).collect()
    }

    pub fn process(&self, ir: PromptIR) -> PipelineOutcome {
        let mut outcome = PipelineOutcome {
            ir,
            approved: true,
            violations: Vec::new(),
            transformations: Vec::new(),
            plugin_failures: Vec::new(),
        };

        if let Some(governance) = &self.governance {
            let verdict = governance.check(&outcome.ir);
            outcome.violations = verdict.violations;
            if !verdict.approved {
                warn!(
                    "IR {} denied by policy: {}",
                    outcome.ir.id,
                    verdict.denied_by.join(", ")
                );
                outcome.approved = false;
                return outcome;
            }
        }

        for stage in &self.stages {
            let name = stage.plugin.name();
            match stage.plugin.apply(&outcome.ir) {
                Ok(transformed) => {
                    let record = IRTransformation::record(
                        name,
                        stage.plugin.transformation_type(),
                        transformed.description,
                        &outcome.ir,
                        &transformed.ir,
                    );
                    debug!("{}: {}", name, record.description);
                    stage.append(record.clone());
                    outcome.transformations.push(record);
                    outcome.ir = transformed.ir;
                }
                Err(e) => {
                    warn!("Plugin {} skipped: {}", name, e);
                    outcome.plugin_failures.push(format!("{}: {}", name, e));
                }
            }
        }

        outcome
    }

    /// Transformation records owned by the named plugin.
    pub fn transformation_log(&self, plugin: &str) -> Vec<IRTransformation> {
        self.stages
            .iter()
            .find(|s| s.plugin.name() == plugin)
            .map(PluginStage::snapshot)
            .unwrap_or_default()
    }

    /// Every plugin's records, merged by timestamp.
    pub fn all_transformations(&self) -> Vec<IRTransformation> {
        let mut all: Vec<IRTransformation> =
            self.stages.iter().flat_map(|s| s.snapshot()).collect();
        all.sort_by_key(|t| t.timestamp);
        all
    }

    /// Checks hash continuity of the records produced by one `process` call.
    pub fn verify(outcome: &PipelineOutcome) -> bool {
        verify_chain(&outcome.transformations)
    }
}
