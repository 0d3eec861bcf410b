//! Orchestrator parameters - run loop control.
//!
//! [`OrchestratorConfig`] groups the static parameters that bound a run in
//! [`Orchestrator`](crate::use_cases::run_orchestration::Orchestrator).

use concord_domain::DEFAULT_CONFIDENCE_THRESHOLD;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_PHASES: usize = 10;
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Run loop control parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Hard ceiling on phase executions, refinement iterations included.
    pub max_phases: usize,
    /// Threshold given to phases produced by the built-in plan.
    pub confidence_threshold: f64,
    /// Run a phase's agents concurrently when it has more than one.
    pub parallel: bool,
    /// Concurrent agent calls per phase.
    pub max_workers: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_phases: DEFAULT_MAX_PHASES,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            parallel: true,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

impl OrchestratorConfig {
    // ==================== Builder Methods ====================

    /// Values below 1 are raised to 1.
    pub fn with_max_phases(mut self, max: usize) -> Self {
        self.max_phases = max.max(1);
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Values below 1 are raised to 1.
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers.max(1);
        self
    }
}
