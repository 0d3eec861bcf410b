//! Phase validation and synthesis rules.

use super::value_objects::AgentResponse;
use crate::util::mean;
use serde::{Deserialize, Serialize};

/// Outcome of VALIDATE for one phase execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseVerdict {
    pub mean_confidence: f64,
    pub critical_flags: Vec<String>,
    pub threshold: f64,
    pub response_count: usize,
    pub should_continue: bool,
}

impl PhaseVerdict {
    /// Continue when mean confidence is below `threshold` or any flag starts
    /// with `CRITICAL`. An empty response list has mean 0 and so continues.
    pub fn evaluate(responses: &[&AgentResponse], threshold: f64) -> Self {
        let confidences: Vec<f64> = responses.iter().map(|r| r.confidence).collect();
        let mean_confidence = mean(&confidences);

        let mut critical_flags: Vec<String> = responses
            .iter()
            .flat_map(|r| r.critical_flags())
            .map(str::to_string)
            .collect();
        critical_flags.sort();
        critical_flags.dedup();

        Self {
            should_continue: mean_confidence < threshold || !critical_flags.is_empty(),
            mean_confidence,
            critical_flags,
            threshold,
            response_count: responses.len(),
        }
    }

    pub fn reason(&self) -> String {
        let flags = if self.critical_flags.is_empty() {
            "no critical flags".to_string()
        } else {
            format!("critical flags: {}", self.critical_flags.join(", "))
        };
        let comparison = if self.mean_confidence < self.threshold {
            "below"
        } else {
            "meets"
        };
        format!(
            "Mean confidence {:.2} {} threshold {:.2}; {}",
            self.mean_confidence, comparison, self.threshold, flags
        )
    }
}

fn render_response(response: &AgentResponse) -> String {
    let flags = if response.risk_flags.is_empty() {
        "none".to_string()
    } else {
        response
            .risk_flags
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "### {} ({})\nConfidence: {:.2}\nRisk flags: {}\n\n{}",
        response.agent,
        response.role,
        response.confidence,
        flags,
        response.output.trim()
    )
}

/// Concatenation of one phase execution's responses.
pub fn synthesize_phase(phase_name: &str, responses: &[&AgentResponse]) -> String {
    let mut out = format!("## {}\n", phase_name);
    for response in responses {
        out.push('\n');
        out.push_str(&render_response(response));
        out.push('\n');
    }
    out.trim_end().to_string()
}

/// Final synthesis over every response, grouped by phase name in ledger order.
pub fn synthesize_final(task: &str, sections: &[(String, Vec<&AgentResponse>)]) -> String {
    let mut out = format!("# Result: {}\n", task);
    for (name, responses) in sections {
        out.push('\n');
        out.push_str(&synthesize_phase(name, responses));
        out.push('\n');
    }
    out.trim_end().to_string()
}

/// Mean confidence across all responses.
pub fn aggregate_confidence(responses: &[AgentResponse]) -> f64 {
    let confidences: Vec<f64> = responses.iter().map(|r| r.confidence).collect();
    mean(&confidences)
}
