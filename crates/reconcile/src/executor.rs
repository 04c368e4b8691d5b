//! Execution engine - applies independent changes on a bounded thread pool
//!
//! Changes run in stages. All changes of one stage run in parallel, and a
//! stage only starts once the previous one has finished, so a caller can put
//! parents in an earlier stage than their children without any graph.

use crate::context::CallContext;
use crate::error::{Error, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Result of applying one change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// A new remote object now exists under `id`
    Created { id: String },
    /// The object was written and is now addressed by `id`
    Updated { id: String },
    /// Nothing to write
    Unchanged { id: String },
    /// The object was deleted
    Deleted,
    /// The object was already gone
    AlreadyAbsent,
    /// Apply failed
    Failed { error: String },
    /// Apply was skipped
    Skipped { reason: String },
}

impl ApplyResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Check if the remote was written to
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Self::Created { .. } | Self::Updated { .. } | Self::Deleted
        )
    }

    /// Identifier to keep tracking, if the object still exists
    pub fn tracked_id(&self) -> Option<&str> {
        match self {
            Self::Created { id } | Self::Updated { id } | Self::Unchanged { id } => Some(id),
            _ => None,
        }
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of changes processed
    pub fn total(&self) -> usize {
        self.total_changes() + self.unchanged + self.skipped + self.failed
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::Created { .. } => self.created += 1,
            ApplyResult::Updated { .. } => self.updated += 1,
            ApplyResult::Deleted => self.deleted += 1,
            ApplyResult::Unchanged { .. } | ApplyResult::AlreadyAbsent => self.unchanged += 1,
            ApplyResult::Failed { .. } => self.failed += 1,
            ApplyResult::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't make changes, just report what would run
    pub dry_run: bool,
    /// Number of changes applied in parallel within a stage
    pub jobs: usize,
    /// Deadline applied to each change, measured from its start
    pub call_timeout: Option<Duration>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
            call_timeout: None,
        }
    }
}

impl ExecuteOptions {
    fn call_context(&self) -> CallContext {
        self.call_timeout
            .map_or_else(CallContext::unbounded, CallContext::with_timeout)
    }
}

/// One pending write against the remote.
///
/// Object safe, so changes for different resource kinds can share a plan.
pub trait Change: Send + Sync {
    /// Address of the instance in the manifest, e.g. "team.core".
    fn address(&self) -> &str;

    /// Human-readable summary of the change.
    fn description(&self) -> String;

    /// Stage the change runs in; lower stages run first.
    fn stage(&self) -> u8 {
        0
    }

    /// Perform the change.
    fn apply(&self, ctx: &CallContext) -> Result<ApplyResult>;
}

/// Type alias for boxed changes
pub type BoxedChange<'a> = Box<dyn Change + 'a>;

/// Progress reporting interface
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called when a stage starts
    fn on_stage_start(&mut self, stage: u8, count: usize);

    /// Called when a change finishes
    fn on_change_complete(&mut self, address: &str, result: &ApplyResult);

    /// Called when a stage completes
    fn on_stage_complete(&mut self);
}

/// Confirmation interface
///
/// Implement this trait to handle user confirmations. A prompt that cannot
/// be shown counts as declined.
pub trait ConfirmCallback: Send {
    fn confirm(&mut self, prompt: &str) -> bool;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_stage_start(&mut self, _stage: u8, _count: usize) {}
    fn on_change_complete(&mut self, _address: &str, _result: &ApplyResult) {}
    fn on_stage_complete(&mut self) {}
}

/// Always confirms
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> bool {
        true
    }
}

/// Always declines
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> bool {
        false
    }
}

/// Outcome of running a set of changes
#[derive(Debug, Default)]
pub struct ExecuteReport {
    pub summary: ExecuteSummary,
    /// Result per address, in execution order
    pub results: Vec<(String, ApplyResult)>,
}

/// Execute `changes` stage by stage.
///
/// A failed change does not stop the others; its error is reported as
/// [`ApplyResult::Failed`].
pub fn execute<P, C>(
    changes: Vec<BoxedChange<'_>>,
    opts: &ExecuteOptions,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ExecuteReport>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    if changes.is_empty() {
        return Ok(ExecuteReport::default());
    }

    if opts.dry_run {
        let mut report = ExecuteReport::default();
        for change in &changes {
            let result = ApplyResult::Skipped {
                reason: "dry run".to_string(),
            };
            report.summary.add_result(&result);
            report.results.push((change.address().to_string(), result));
        }
        return Ok(report);
    }

    if !confirm.confirm(&format!("Apply {} change(s)?", changes.len())) {
        let mut report = ExecuteReport::default();
        report.summary.skipped = changes.len();
        return Ok(report);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs.max(1))
        .build()
        .map_err(|e| Error::Config(format!("failed to create thread pool: {e}")))?;

    let mut stages: BTreeMap<u8, Vec<BoxedChange<'_>>> = BTreeMap::new();
    for change in changes {
        stages.entry(change.stage()).or_default().push(change);
    }

    let mut report = ExecuteReport::default();
    for (stage, batch) in &stages {
        progress.on_stage_start(*stage, batch.len());

        // Results are collected first; the progress callback is not shared
        // across worker threads.
        let results: Vec<(String, ApplyResult)> = pool.install(|| {
            batch
                .par_iter()
                .map(|change| (change.address().to_string(), apply_change(change.as_ref(), opts)))
                .collect()
        });

        for (address, result) in results {
            progress.on_change_complete(&address, &result);
            report.summary.add_result(&result);
            report.results.push((address, result));
        }
        progress.on_stage_complete();
    }

    Ok(report)
}

/// Simple execution without callbacks
pub fn execute_simple(
    changes: Vec<BoxedChange<'_>>,
    opts: &ExecuteOptions,
) -> Result<ExecuteReport> {
    execute(changes, opts, &mut NoProgress, &mut AutoConfirm)
}

fn apply_change(change: &dyn Change, opts: &ExecuteOptions) -> ApplyResult {
    log::debug!("applying {}: {}", change.address(), change.description());
    match change.apply(&opts.call_context()) {
        Ok(result) => result,
        Err(e) => {
            log::debug!("{} failed: {e}", change.address());
            ApplyResult::Failed {
                error: e.to_string(),
            }
        }
    }
}
