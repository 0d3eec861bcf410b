//! Run Orchestration use case
//!
//! Drives one run through the state machine:
//!
//! ```text
//! INIT → PLAN → EXECUTE_PHASE → SYNTHESIZE → VALIDATE ─┬→ EXECUTE_PHASE
//!                                                      └→ SYNTHESIZE → TERMINATE
//! ```
//!
//! Planned phases run in order. When the last planned phase's verdict says
//! continue, that phase is executed again with the previous confidence in
//! its context. The phase ceiling counts every execution and cannot be
//! extended by agent output.

use crate::config::OrchestratorConfig;
use crate::ports::agent_caller::AgentCaller;
use crate::ports::planner::{DefaultPlanner, Planner, PlannerError};
use crate::ports::progress::{NoProgress, ProgressNotifier};
use crate::ports::run_event_logger::{NoRunEventLogger, RunEvent, RunEventLogger};
use chrono::Utc;
use concord_domain::{
    ActionType, AgentResponse, ContextMap, Decision, GovernanceDecision, GovernanceEngine,
    GovernanceResult, OrchestratorState, Phase, PhaseOutcome, PhaseVerdict, RunLedger,
    aggregate_confidence, synthesize_final, synthesize_phase,
};
use futures::FutureExt;
use serde_json::{Value, json};
use std::any::Any;
use std::collections::BTreeMap;
use std::ops::Range;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Failures that end a run in the ERROR state.
///
/// These never escape [`Orchestrator::run`]; they are recorded as the
/// terminating [`Decision`].
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Planning failed: {0}")]
    Planning(#[from] PlannerError),

    #[error("Planner returned no phases")]
    EmptyPlan,

    #[error("Phase '{0}' has no agents")]
    NoAgents(String),

    #[error("Invalid transition {from} -> {to}")]
    InvalidTransition {
        from: OrchestratorState,
        to: OrchestratorState,
    },

    #[error("Agent task aborted: {0}")]
    TaskJoin(String),
}

/// Reason prefix of the decision recorded when the phase ceiling stops a run.
pub const FORCE_TERMINATED: &str = "Force terminated";

/// Mutable state of one run. Owned by a single `run` call.
struct RunContext<'a> {
    ledger: RunLedger,
    events: &'a dyn RunEventLogger,
    /// Response range and label of each phase execution, for final synthesis.
    sections: Vec<(String, Range<usize>)>,
}

impl RunContext<'_> {
    fn state(&self) -> OrchestratorState {
        self.ledger.state
    }

    fn transition(
        &mut self,
        to: OrchestratorState,
        reason: impl Into<String>,
    ) -> Result<(), OrchestratorError> {
        let from = self.ledger.state;
        if !from.can_transition_to(to) {
            return Err(OrchestratorError::InvalidTransition { from, to });
        }
        let reason = reason.into();
        debug!("{} -> {}: {}", from, to, reason);

        self.ledger.state = to;
        self.events.log(RunEvent::new(
            "state_transition",
            json!({
                "run_id": self.ledger.run_id,
                "from": from,
                "to": to,
                "reason": reason,
            }),
        ));
        self.decide(
            Decision::new(to, "transition", reason)
                .with_detail("from", from.as_str())
                .with_detail("to", to.as_str()),
        );
        Ok(())
    }

    fn decide(&mut self, decision: Decision) {
        self.events.log(RunEvent::new(
            "decision",
            json!({
                "run_id": self.ledger.run_id,
                "state": decision.state,
                "action": decision.action,
                "reason": decision.reason,
                "details": decision.details,
            }),
        ));
        self.ledger.decisions.push(decision);
    }

    fn record_response(&mut self, response: AgentResponse) {
        self.events.log(RunEvent::new(
            "agent_response",
            json!({
                "run_id": self.ledger.run_id,
                "phase": response.phase,
                "agent": response.agent,
                "role": response.role,
                "confidence": response.confidence,
                "risk_flags": response.risk_flags,
            }),
        ));
        self.ledger.responses.push(response);
    }
}

/// Use case for running one orchestration.
///
/// One instance drives at most one run at a time; concurrent runs need
/// separate instances.
pub struct Orchestrator<C: AgentCaller + 'static> {
    caller: Arc<C>,
    planner: Arc<dyn Planner>,
    governance: Option<Arc<GovernanceEngine>>,
    events: Arc<dyn RunEventLogger>,
    config: OrchestratorConfig,
}

impl<C: AgentCaller + 'static> Orchestrator<C> {
    /// Orchestrator using the built-in three-phase plan.
    pub fn new(caller: Arc<C>, config: OrchestratorConfig) -> Self {
        Self {
            caller,
            planner: Arc::new(DefaultPlanner::new(config.confidence_threshold)),
            governance: None,
            events: Arc::new(NoRunEventLogger),
            config,
        }
    }

    pub fn with_planner(mut self, planner: Arc<dyn Planner>) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_governance(mut self, engine: Arc<GovernanceEngine>) -> Self {
        self.governance = Some(engine);
        self
    }

    pub fn with_event_logger(mut self, events: Arc<dyn RunEventLogger>) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Execute a run with default (no-op) progress
    pub async fn run(&self, task: &str, context: ContextMap) -> RunLedger {
        self.run_with_progress(task, context, &NoProgress).await
    }

    /// Execute a run with progress callbacks.
    ///
    /// Always returns a complete ledger. Fatal failures leave it in the
    /// ERROR state with the failure recorded as the last decision.
    pub async fn run_with_progress(
        &self,
        task: &str,
        context: ContextMap,
        progress: &dyn ProgressNotifier,
    ) -> RunLedger {
        let mut run = RunContext {
            ledger: RunLedger::new(task),
            events: self.events.as_ref(),
            sections: Vec::new(),
        };
        info!("Starting run {} for task: {}", run.ledger.run_id, task);
        run.decide(
            Decision::new(OrchestratorState::Init, "run_started", "Run initialized")
                .with_detail("max_phases", self.config.max_phases)
                .with_detail("parallel", self.config.parallel),
        );

        if let Err(e) = self.drive(&mut run, task, &context, progress).await {
            warn!("Run {} failed: {}", run.ledger.run_id, e);
            let from = run.state();
            if from.can_transition_to(OrchestratorState::Error) {
                run.ledger.state = OrchestratorState::Error;
            }
            run.decide(
                Decision::new(OrchestratorState::Error, "error", e.to_string())
                    .with_detail("from", from.as_str()),
            );
        }

        run.ledger.completed_at = Some(Utc::now());
        info!(
            "Run {} finished in {} after {} phase executions (confidence {:.2})",
            run.ledger.run_id,
            run.ledger.state,
            run.ledger.executions(),
            run.ledger.aggregate_confidence
        );
        self.events.log(RunEvent::new(
            "run_completed",
            json!({
                "run_id": run.ledger.run_id,
                "state": run.ledger.state,
                "executions": run.ledger.executions(),
                "responses": run.ledger.responses.len(),
                "aggregate_confidence": run.ledger.aggregate_confidence,
            }),
        ));
        run.ledger
    }

    async fn drive(
        &self,
        run: &mut RunContext<'_>,
        task: &str,
        context: &ContextMap,
        progress: &dyn ProgressNotifier,
    ) -> Result<(), OrchestratorError> {
        // ==================== PLAN ====================
        run.transition(OrchestratorState::Plan, "Requesting plan")?;
        let phases = self.planner.plan(task, context).await?;
        if phases.is_empty() {
            return Err(OrchestratorError::EmptyPlan);
        }
        if let Some(empty) = phases.iter().find(|p| p.agents.is_empty()) {
            return Err(OrchestratorError::NoAgents(empty.name.clone()));
        }
        let names: Vec<&str> = phases.iter().map(|p| p.name.as_str()).collect();
        info!("Plan: {}", names.join(" -> "));
        run.decide(
            Decision::new(
                OrchestratorState::Plan,
                "plan_created",
                format!("{} phases planned", phases.len()),
            )
            .with_detail("phases", json!(names)),
        );
        run.ledger.phases = phases.clone();

        // ==================== EXECUTE / SYNTHESIZE / VALIDATE ====================
        let last = phases.len() - 1;
        let mut previous_summary: Option<String> = None;

        'phases: for (index, phase) in phases.iter().enumerate() {
            let mut iteration: u32 = 1;
            let mut previous_confidence: Option<f64> = None;

            loop {
                if run.ledger.executions() >= self.config.max_phases {
                    let reason = format!(
                        "{}: phase ceiling of {} executions reached with work remaining",
                        FORCE_TERMINATED, self.config.max_phases
                    );
                    warn!("{}", reason);
                    let state = run.state();
                    run.decide(
                        Decision::new(state, "force_terminated", reason)
                            .with_detail("max_phases", self.config.max_phases)
                            .with_detail("next_phase", phase.name.as_str())
                            .with_detail("iteration", iteration),
                    );
                    break 'phases;
                }

                run.transition(
                    OrchestratorState::ExecutePhase,
                    format!("Executing phase '{}' (iteration {})", phase.name, iteration),
                )?;
                progress.on_phase_start(phase, index, iteration);

                let mut phase_context = context.clone();
                phase_context.extend(phase.context.clone());
                phase_context.insert("task".to_string(), json!(task));
                phase_context.insert("phase".to_string(), json!(phase.name));
                phase_context.insert("phase_type".to_string(), json!(phase.kind.as_str()));
                if let Some(summary) = &previous_summary {
                    phase_context.insert("previous_phase_summary".to_string(), json!(summary));
                }
                if let Some(confidence) = previous_confidence {
                    phase_context.insert("previous_confidence".to_string(), json!(confidence));
                    phase_context.insert("iteration".to_string(), json!(iteration));
                }

                let responses = self
                    .execute_phase(phase, phase_context, progress)
                    .await?;
                let start = run.ledger.responses.len();
                for response in responses {
                    let response = response
                        .in_phase(index)
                        .with_metadata("iteration", iteration);
                    run.record_response(response);
                }
                let range = start..run.ledger.responses.len();

                // ==================== SYNTHESIZE (phase) ====================
                run.transition(
                    OrchestratorState::Synthesize,
                    format!("Synthesizing {} responses", range.len()),
                )?;
                let executed: Vec<&AgentResponse> =
                    run.ledger.responses[range.clone()].iter().collect();
                let label = if iteration > 1 {
                    format!("{} (iteration {})", phase.name, iteration)
                } else {
                    phase.name.clone()
                };
                let synthesis = synthesize_phase(&label, &executed);

                // ==================== VALIDATE ====================
                let verdict = PhaseVerdict::evaluate(&executed, phase.confidence_threshold);
                run.transition(OrchestratorState::Validate, verdict.reason())?;
                info!(
                    "Phase '{}' iteration {}: {}",
                    phase.name,
                    iteration,
                    verdict.reason()
                );
                self.events.log(RunEvent::new(
                    "phase_verdict",
                    json!({
                        "run_id": run.ledger.run_id,
                        "phase": phase.name,
                        "iteration": iteration,
                        "verdict": verdict,
                    }),
                ));
                run.decide(
                    Decision::new(
                        OrchestratorState::Validate,
                        if verdict.should_continue { "continue" } else { "stop" },
                        verdict.reason(),
                    )
                    .with_detail("phase", phase.name.as_str())
                    .with_detail("iteration", iteration)
                    .with_detail("mean_confidence", verdict.mean_confidence)
                    .with_detail("threshold", verdict.threshold)
                    .with_detail("critical_flags", json!(verdict.critical_flags)),
                );
                progress.on_phase_complete(phase, &verdict);

                run.ledger.phase_outcomes.push(PhaseOutcome {
                    phase_index: index,
                    name: phase.name.clone(),
                    iteration,
                    mean_confidence: verdict.mean_confidence,
                    critical_flags: verdict.critical_flags.clone(),
                    should_continue: verdict.should_continue,
                    response_count: verdict.response_count,
                    synthesis: synthesis.clone(),
                });
                run.sections.push((label, range));
                previous_summary = Some(synthesis);

                if verdict.should_continue && index == last {
                    previous_confidence = Some(verdict.mean_confidence);
                    iteration += 1;
                    continue;
                }
                break;
            }
        }

        // ==================== SYNTHESIZE (final) ====================
        run.transition(OrchestratorState::Synthesize, "Final synthesis")?;
        let sections: Vec<(String, Vec<&AgentResponse>)> = run
            .sections
            .iter()
            .map(|(label, range)| {
                (
                    label.clone(),
                    run.ledger.responses[range.clone()].iter().collect(),
                )
            })
            .collect();
        let mut final_output = synthesize_final(task, &sections);
        let confidence = aggregate_confidence(&run.ledger.responses);
        run.ledger.aggregate_confidence = confidence;

        if let Some(engine) = &self.governance {
            final_output = self.final_gate(run, engine, final_output, confidence);
        }
        run.ledger.final_output = Some(final_output);

        run.transition(
            OrchestratorState::Terminate,
            format!("Completed with aggregate confidence {:.2}", confidence),
        )?;
        Ok(())
    }

    /// Evaluate the final output once more; a denial withholds it.
    fn final_gate(
        &self,
        run: &mut RunContext<'_>,
        engine: &GovernanceEngine,
        output: String,
        confidence: f64,
    ) -> String {
        let details = BTreeMap::from([
            (
                "description".to_string(),
                json!("Final synthesized output of an orchestration run"),
            ),
            ("output".to_string(), Value::String(output.clone())),
        ]);
        let gate_context = BTreeMap::from([
            ("run_id".to_string(), json!(run.ledger.run_id)),
            ("task".to_string(), json!(run.ledger.task)),
        ]);
        let result = engine.evaluate(
            &ActionType::SynthesisOutput,
            &details,
            &gate_context,
            confidence,
        );

        run.decide(
            Decision::new(
                OrchestratorState::Synthesize,
                "final_governance",
                result.reason.clone(),
            )
            .with_detail("decision", result.decision.as_str())
            .with_detail("trust_score", result.trust_score)
            .with_detail("violated_principles", json!(result.violation_names())),
        );

        if result.decision == GovernanceDecision::Deny {
            warn!("Final output withheld: {}", result.reason);
            run.decide(Decision::new(
                OrchestratorState::Synthesize,
                "output_withheld",
                result.reason.clone(),
            ));
            return withheld_notice(&result);
        }
        output
    }

    /// Call every agent of the phase; failures become synthetic responses.
    ///
    /// Parallel mode returns responses in completion order, sequential mode
    /// in dispatch order.
    async fn execute_phase(
        &self,
        phase: &Phase,
        context: ContextMap,
        progress: &dyn ProgressNotifier,
    ) -> Result<Vec<AgentResponse>, OrchestratorError> {
        let mut responses = Vec::with_capacity(phase.agents.len());

        if self.config.parallel && phase.agents.len() > 1 {
            let semaphore = Arc::new(Semaphore::new(self.config.max_workers.max(1)));
            let context = Arc::new(context);
            let brief: Arc<str> = Arc::from(phase.brief.as_str());
            let mut join_set = JoinSet::new();

            for agent in &phase.agents {
                let caller = Arc::clone(&self.caller);
                let semaphore = Arc::clone(&semaphore);
                let context = Arc::clone(&context);
                let brief = Arc::clone(&brief);
                let agent = agent.clone();

                join_set.spawn(async move {
                    // The semaphore is never closed, so acquisition only fails
                    // if that changes; run unthrottled rather than drop the call.
                    let _permit = semaphore.acquire_owned().await.ok();
                    let response = Self::call_agent(caller.as_ref(), &agent, &brief, &context).await;
                    (agent, response)
                });
            }

            while let Some(joined) = join_set.join_next().await {
                let (agent, response) =
                    joined.map_err(|e| OrchestratorError::TaskJoin(e.to_string()))?;
                progress.on_agent_complete(phase, &agent, !response.is_failure());
                responses.push(response);
            }
        } else {
            for agent in &phase.agents {
                let response =
                    Self::call_agent(self.caller.as_ref(), agent, &phase.brief, &context).await;
                progress.on_agent_complete(phase, agent, !response.is_failure());
                responses.push(response);
            }
        }

        Ok(responses)
    }

    /// One agent call with errors and panics isolated.
    async fn call_agent(caller: &C, agent: &str, brief: &str, context: &ContextMap) -> AgentResponse {
        match AssertUnwindSafe(caller.call(agent, brief, context))
            .catch_unwind()
            .await
        {
            Ok(Ok(reply)) => {
                debug!("Agent {} responded", agent);
                reply.into_response(agent)
            }
            Ok(Err(e)) => {
                warn!("Agent {} failed: {}", agent, e);
                AgentResponse::failure(agent, e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!("Agent {} panicked: {}", agent, message);
                AgentResponse::failure(agent, format!("panic: {}", message))
            }
        }
    }
}

/// Notice that replaces a denied final output.
///
/// Names the violated principles and the pattern id only; the matched text
/// never reaches the ledger's final output.
fn withheld_notice(result: &GovernanceResult) -> String {
    let mut notice = format!(
        "[Output withheld by governance: {}",
        result.violation_names().join(", ")
    );
    if let Some(pattern) = result.metadata.get("pattern").and_then(Value::as_str) {
        notice.push_str(&format!(" ({})", pattern));
    }
    notice.push(']');
    notice
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
