//! Progress reporting for command pipeline runs

use colored::Colorize;
use hq_application::ports::progress::StageObserver;
use hq_domain::{AgentId, Stage, StageOutcome, StageRecord};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// Spinner per stage, finished with the stage's outcome
pub struct ProgressReporter {
    multi: MultiProgress,
    stage_bar: Mutex<Option<ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            stage_bar: Mutex::new(None),
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn stage_message(stage: Stage) -> &'static str {
        match stage {
            Stage::General => "Consulting the General...",
            Stage::Delegation => "Resolving delegation...",
            Stage::Lieutenant => "Briefing the Lieutenant...",
            Stage::Parse => "Parsing proposals...",
            Stage::Validate => "Validating changes...",
            Stage::SelfWrite => "Soldiers rewriting...",
            Stage::Approval => "Checking approval...",
            Stage::Commit => "Committing...",
            Stage::Sync => "Syncing chain of command...",
        }
    }

    fn outcome_mark(outcome: StageOutcome) -> colored::ColoredString {
        match outcome {
            StageOutcome::Success => "v".green(),
            StageOutcome::Partial => "~".yellow(),
            StageOutcome::Skipped => "-".dimmed(),
            StageOutcome::Failed => "x".red(),
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl StageObserver for ProgressReporter {
    fn on_stage_start(&self, stage: Stage) {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(Self::spinner_style());
        pb.set_prefix(stage.display_name().to_string());
        pb.set_message(Self::stage_message(stage));
        pb.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut slot) = self.stage_bar.lock()
            && let Some(previous) = slot.replace(pb)
        {
            previous.finish_and_clear();
        }
    }

    fn on_stage_complete(&self, record: &StageRecord) {
        let Ok(mut slot) = self.stage_bar.lock() else {
            return;
        };
        let message = format!("{} {}", Self::outcome_mark(record.outcome), record.detail);
        match slot.take() {
            Some(pb) => pb.finish_with_message(message),
            // Stage recorded without a start (skipped stages)
            None => {
                let _ = self.multi.println(format!(
                    "  {} {}",
                    record.stage.display_name().bold().cyan(),
                    message
                ));
            }
        }
    }

    fn on_self_write_complete(&self, agent_id: &AgentId, success: bool) {
        if let Ok(slot) = self.stage_bar.lock()
            && let Some(pb) = slot.as_ref()
        {
            let status = if success {
                format!("{} {}", "v".green(), agent_id)
            } else {
                format!("{} {}", "x".red(), agent_id)
            };
            pb.set_message(status);
        }
    }
}

/// Simple text-based progress (no fancy UI)
pub struct SimpleProgress;

impl StageObserver for SimpleProgress {
    fn on_stage_start(&self, stage: Stage) {
        eprintln!("{} {}", "->".cyan(), stage.display_name().bold());
    }

    fn on_stage_complete(&self, record: &StageRecord) {
        eprintln!(
            "  {} {} ({}ms)",
            ProgressReporter::outcome_mark(record.outcome),
            record.detail,
            record.elapsed_ms
        );
    }

    fn on_self_write_complete(&self, agent_id: &AgentId, success: bool) {
        if success {
            eprintln!("    {} {}", "v".green(), agent_id);
        } else {
            eprintln!("    {} {} (failed)", "x".red(), agent_id);
        }
    }
}
