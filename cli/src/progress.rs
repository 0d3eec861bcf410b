//! Progress reporting for orchestration runs

use colored::Colorize;
use concord_application::ProgressNotifier;
use concord_domain::{Phase, PhaseVerdict};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Mutex;

/// One progress bar per phase execution, ticking as agents finish.
pub struct ProgressReporter {
    multi: MultiProgress,
    phase_bar: Mutex<Option<ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            phase_bar: Mutex::new(None),
        }
    }

    fn phase_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    fn with_bar(&self, f: impl FnOnce(&mut Option<ProgressBar>)) {
        match self.phase_bar.lock() {
            Ok(mut bar) => f(&mut bar),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressNotifier for ProgressReporter {
    fn on_phase_start(&self, phase: &Phase, index: usize, iteration: u32) {
        let prefix = if iteration > 1 {
            format!("Phase {}: {} (iteration {})", index + 1, phase.name, iteration)
        } else {
            format!("Phase {}: {}", index + 1, phase.name)
        };

        let pb = self.multi.add(ProgressBar::new(phase.agents.len() as u64));
        pb.set_style(Self::phase_style());
        pb.set_prefix(prefix);
        pb.set_message("Starting...");
        self.with_bar(|bar| *bar = Some(pb));
    }

    fn on_agent_complete(&self, _phase: &Phase, agent: &str, success: bool) {
        self.with_bar(|bar| {
            if let Some(pb) = bar.as_ref() {
                let status = if success {
                    format!("{} {}", "v".green(), agent)
                } else {
                    format!("{} {}", "x".red(), agent)
                };
                pb.set_message(status);
                pb.inc(1);
            }
        });
    }

    fn on_phase_complete(&self, _phase: &Phase, verdict: &PhaseVerdict) {
        self.with_bar(|bar| {
            if let Some(pb) = bar.take() {
                let confidence = format!("confidence {:.2}", verdict.mean_confidence);
                let message = if verdict.critical_flags.is_empty() {
                    confidence.green().to_string()
                } else {
                    format!("{} ({})", confidence, verdict.critical_flags.join(", "))
                        .red()
                        .to_string()
                };
                pb.finish_with_message(message);
            }
        });
    }
}
