//! Run orchestration: concurrent branches with failure isolation.
//!
//! Every branch runs as its own tokio task. Outcomes are collected into a
//! tagged list before any aggregate decision, so one branch failing (or
//! panicking) never cancels its siblings.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::notify::{Notifier, notify_best_effort};
use crate::pipeline::{Branch, BranchReport, PipelineContext};
use crate::runlog::RunLog;

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    AllSucceeded,
    PartialFailure,
    TotalFailure,
}

impl RunState {
    fn settle(success: usize, total: usize) -> Self {
        if success == total {
            Self::AllSucceeded
        } else if success == 0 {
            Self::TotalFailure
        } else {
            Self::PartialFailure
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::AllSucceeded => "all succeeded",
            Self::PartialFailure => "partial failure",
            Self::TotalFailure => "total failure",
        };
        f.write_str(s)
    }
}

/// The settled result of one branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchOutcome {
    pub name: &'static str,
    /// The report on success, the failure reason otherwise.
    pub result: Result<BranchReport, String>,
}

impl BranchOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    fn describe(&self) -> String {
        match &self.result {
            Ok(report) => format!("{}: ok {}", self.name, report.to_json()),
            Err(reason) => format!("{}: failed {reason}", self.name),
        }
    }
}

/// Aggregate of a finished run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub state: RunState,
    /// In branch order, independent of completion order.
    pub outcomes: Vec<BranchOutcome>,
    pub duration: Duration,
}

impl RunSummary {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Process exit status: 1 only when no branch succeeded.
    pub fn exit_code(&self) -> u8 {
        match self.state {
            RunState::TotalFailure => 1,
            _ => 0,
        }
    }

    /// Operator message, or `None` when every branch succeeded.
    pub fn notification_text(&self) -> Option<String> {
        let headline = match self.state {
            RunState::TotalFailure => "Ingest finished: no successful sources",
            RunState::PartialFailure => "Ingest finished with partial failures",
            _ => return None,
        };

        let mut lines = vec![
            headline.to_string(),
            format!(
                "Duration: {:.1}s | Success: {}/{}",
                self.duration.as_secs_f64(),
                self.success_count(),
                self.total()
            ),
        ];
        lines.extend(self.outcomes.iter().map(BranchOutcome::describe));
        Some(lines.join("\n"))
    }
}

/// Observer for branch lifecycle events (CLI progress display).
pub trait RunProgress: Send + Sync {
    fn branch_started(&self, name: &str);
    fn branch_settled(&self, outcome: &BranchOutcome);
    fn finished(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl RunProgress for SilentProgress {
    fn branch_started(&self, _name: &str) {}
    fn branch_settled(&self, _outcome: &BranchOutcome) {}
    fn finished(&self, _summary: &RunSummary) {}
}

/// Drives one run over a fixed set of branches.
pub struct Orchestrator {
    ctx: PipelineContext,
    notifier: Arc<dyn Notifier>,
    state: RunState,
}

impl Orchestrator {
    pub fn new(ctx: PipelineContext, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            ctx,
            notifier,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run every branch to completion and act on the aggregate.
    ///
    /// Sends at most one notification. Never returns an error: branch
    /// failures are part of the summary.
    #[instrument(skip_all, fields(branches = branches.len()))]
    pub async fn run(
        &mut self,
        branches: Vec<Arc<dyn Branch>>,
        progress: &dyn RunProgress,
    ) -> RunSummary {
        self.state = RunState::Running;
        let started = Instant::now();
        let run_log = self.ctx.run_log.clone();
        run_log.line("Ingest started");
        info!("ingest started");

        let mut handles = Vec::with_capacity(branches.len());
        for branch in branches {
            let name = branch.name();
            progress.branch_started(name);
            let ctx = self.ctx.clone();
            let handle = tokio::spawn(async move { branch.run(&ctx).await });
            handles.push((name, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let result = match handle.await {
                Ok(Ok(report)) => Ok(report),
                Ok(Err(e)) => Err(e.to_string()),
                Err(join_error) => Err(describe_join_error(join_error)),
            };
            let outcome = BranchOutcome { name, result };

            match &outcome.result {
                Ok(report) => {
                    info!(branch = name, ?report, "branch completed");
                    run_log.line(&format!("{name} completed: {}", report.to_json()));
                }
                Err(reason) => {
                    warn!(branch = name, %reason, "branch failed");
                    run_log.line(&format!("{name} failed: {reason}"));
                }
            }
            progress.branch_settled(&outcome);
            outcomes.push(outcome);
        }

        let success = outcomes.iter().filter(|o| o.succeeded()).count();
        let state = RunState::settle(success, outcomes.len());
        let summary = RunSummary {
            state,
            outcomes,
            duration: started.elapsed(),
        };
        self.state = state;

        run_log.line(&format!(
            "Ingest finished: {state} ({success}/{}) in {:.1}s",
            summary.total(),
            summary.duration.as_secs_f64()
        ));
        info!(%state, success, total = summary.total(), "ingest finished");

        if let Some(text) = summary.notification_text() {
            notify_best_effort(self.notifier.as_ref(), run_log.as_ref(), &text).await;
        }

        progress.finished(&summary);
        summary
    }
}

fn describe_join_error(join_error: JoinError) -> String {
    if !join_error.is_panic() {
        return "task cancelled".to_string();
    }
    let payload = join_error.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("panicked: {message}")
}

/// Record an error that escaped the run and tell the operator.
pub async fn report_fatal(
    error: &dyn fmt::Display,
    run_log: &dyn RunLog,
    notifier: &dyn Notifier,
) {
    let text = format!("Fatal error: {error}");
    error!(%error, "fatal error");
    run_log.line(&text);
    notify_best_effort(notifier, run_log, &text).await;
}
