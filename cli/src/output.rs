//! Console output for finished runs

use colored::Colorize;
use concord_domain::RunLedger;

pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Phase outcomes, key decisions and the final output.
    pub fn format(ledger: &RunLedger) -> String {
        let mut output = String::new();

        output.push_str(&Self::header("Concord Run"));
        output.push('\n');
        output.push_str(&format!("{} {}\n", "Task:".cyan().bold(), ledger.task));
        output.push_str(&format!("{} {}\n", "Run:".cyan().bold(), ledger.run_id));
        output.push_str(&format!(
            "{} {}\n",
            "State:".cyan().bold(),
            if ledger.is_success() {
                ledger.state.as_str().green()
            } else {
                ledger.state.as_str().red()
            }
        ));

        output.push_str(&Self::section_header("Phases"));
        for outcome in &ledger.phase_outcomes {
            let marker = if outcome.critical_flags.is_empty() {
                "v".green()
            } else {
                "x".red()
            };
            output.push_str(&format!(
                "{} {} (iteration {}): {} responses, confidence {:.2}\n",
                marker,
                outcome.name.bold(),
                outcome.iteration,
                outcome.response_count,
                outcome.mean_confidence
            ));
            for flag in &outcome.critical_flags {
                output.push_str(&format!("    {}\n", flag.red()));
            }
        }

        output.push_str(&Self::section_header("Decisions"));
        for decision in ledger.decisions.iter().filter(|d| d.action != "transition") {
            output.push_str(&format!(
                "{} [{}] {}\n",
                decision.action.yellow(),
                decision.state.as_str(),
                decision.reason
            ));
        }

        output.push_str(&Self::section_header("Final Output"));
        match &ledger.final_output {
            Some(text) => output.push_str(text),
            None => output.push_str(&"(no output)".dimmed().to_string()),
        }
        output.push('\n');
        output.push_str(&format!(
            "\n{} {:.2}\n",
            "Aggregate confidence:".cyan().bold(),
            ledger.aggregate_confidence
        ));
        output.push_str(&Self::footer());
        output
    }

    pub fn format_final(ledger: &RunLedger) -> String {
        ledger.final_output.clone().unwrap_or_default()
    }

    pub fn format_json(ledger: &RunLedger) -> String {
        serde_json::to_string_pretty(ledger).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_domain::{Decision, OrchestratorState, PhaseOutcome};

    fn ledger() -> RunLedger {
        let mut ledger = RunLedger::new("Implement X");
        ledger.state = OrchestratorState::Terminate;
        ledger.final_output = Some("# Implement X\n\ndone".to_string());
        ledger.phase_outcomes.push(PhaseOutcome {
            phase_index: 0,
            name: "Analysis".to_string(),
            iteration: 1,
            mean_confidence: 0.9,
            critical_flags: Vec::new(),
            should_continue: false,
            response_count: 2,
            synthesis: String::new(),
        });
        ledger.decisions.push(Decision::new(
            OrchestratorState::Validate,
            "phase_verdict",
            "Mean confidence 0.90 meets threshold 0.85",
        ));
        ledger
    }

    #[test]
    fn test_format_full() {
        colored::control::set_override(false);
        let text = ConsoleFormatter::format(&ledger());
        assert!(text.contains("Task: Implement X"));
        assert!(text.contains("Analysis (iteration 1): 2 responses, confidence 0.90"));
        assert!(text.contains("phase_verdict [VALIDATE]"));
        assert!(text.contains("# Implement X\n\ndone"));
    }

    #[test]
    fn test_format_json_round_trips() {
        let ledger = ledger();
        let json = ConsoleFormatter::format_json(&ledger);
        let back = RunLedger::from_json(&json).unwrap();
        assert_eq!(back.run_id, ledger.run_id);
    }
}
