//! Progress notification port
//!
//! Defines the interface for reporting progress during an orchestration run.

use concord_domain::{Phase, PhaseVerdict};

/// Callback for progress updates during a run.
///
/// Implementations live in the composition root and can display progress
/// in various ways (console, log lines, etc.)
pub trait ProgressNotifier: Send + Sync {
    /// Called when a phase execution starts. `iteration` starts at 1.
    fn on_phase_start(&self, phase: &Phase, index: usize, iteration: u32);

    /// Called when one agent of the phase has produced a response.
    fn on_agent_complete(&self, phase: &Phase, agent: &str, success: bool);

    /// Called after VALIDATE for the phase execution.
    fn on_phase_complete(&self, phase: &Phase, verdict: &PhaseVerdict);
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl ProgressNotifier for NoProgress {
    fn on_phase_start(&self, _phase: &Phase, _index: usize, _iteration: u32) {}
    fn on_agent_complete(&self, _phase: &Phase, _agent: &str, _success: bool) {}
    fn on_phase_complete(&self, _phase: &Phase, _verdict: &PhaseVerdict) {}
}
