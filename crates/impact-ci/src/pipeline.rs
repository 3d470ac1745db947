//! Per-item stage pipeline: fetch → pre-patch test → patch → post-patch test.

use impact_core::{
    Classification, ImpactConfig, Reply, Stage, StageOutcome, StageRecord, WorkItem,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::error::Result;
use crate::guard::{GuardOutcome, TimeoutGuard};
use crate::runner::{StageResult, StageRunner};
use crate::stage::{StageCommand, StageOutput};
use crate::toolchain::{StageContext, Toolchain};
use crate::workspace::Workspace;

/// Read-only environment shared by every item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Parent of all item workspaces.
    pub work_root: PathBuf,
    pub patch_file: PathBuf,
    pub package_under_test: String,
    pub fetch_timeout: Duration,
}

impl From<&ImpactConfig> for PipelineSettings {
    fn from(config: &ImpactConfig) -> Self {
        Self {
            work_root: config.work_root.clone(),
            patch_file: config.patch_file.clone(),
            package_under_test: config.package_under_test.clone(),
            fetch_timeout: config.fetch_timeout,
        }
    }
}

/// Terminal classification plus its detail.
type Verdict = (Classification, Option<String>);

/// Runs the four stages for one item at a time. Cheap to clone; each worker
/// holds its own copy.
#[derive(Clone)]
pub struct ItemPipeline {
    toolchain: Arc<dyn Toolchain>,
    settings: Arc<PipelineSettings>,
}

impl ItemPipeline {
    pub fn new(toolchain: Arc<dyn Toolchain>, settings: PipelineSettings) -> Self {
        Self {
            toolchain,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn toolchain(&self) -> &dyn Toolchain {
        self.toolchain.as_ref()
    }

    /// Run every stage for `item` and produce its reply.
    ///
    /// Never fails: tooling errors become `FailedUnexpectedly`.
    pub async fn run(&self, worker: usize, item: WorkItem) -> Reply {
        let start = Instant::now();
        let mut trace = Vec::new();

        let (classification, detail) = match self.run_stages(worker, &item, &mut trace).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(index = item.index, worker, error = %e, "Failed unexpectedly");
                (Classification::FailedUnexpectedly, Some(e.to_string()))
            }
        };

        info!(
            index = item.index,
            worker,
            identifier = %item.identifier,
            %classification,
            "Finished item"
        );

        Reply {
            item,
            classification,
            detail,
            stages: trace,
            worker,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn run_stages(
        &self,
        worker: usize,
        item: &WorkItem,
        trace: &mut Vec<StageRecord>,
    ) -> Result<Verdict> {
        let workspace = Workspace::create(&self.settings.work_root, item).await?;
        info!(
            index = item.index,
            worker,
            identifier = %item.identifier,
            workspace = %workspace.path().display(),
            "Checking out"
        );

        let ctx = StageContext {
            item,
            workspace: workspace.path(),
            patch_file: &self.settings.patch_file,
            package_under_test: &self.settings.package_under_test,
        };

        info!(index = item.index, worker, "Fetching code");
        let fetch = self.toolchain.fetch(&ctx);
        let guard = TimeoutGuard::new(self.settings.fetch_timeout);
        let outcome = match guard.run(&fetch).await {
            Ok(outcome) => outcome,
            Err(e) => {
                trace.push(errored(Stage::Fetch));
                return Err(e);
            }
        };
        trace.push(outcome.record(&fetch));
        match outcome {
            GuardOutcome::TimedOut { .. } => {
                warn!(index = item.index, worker, "Fetch timed out");
                return Ok((
                    Classification::FetchTimedOut,
                    Some(format!(
                        "fetch did not finish within {}",
                        humantime::format_duration(guard.deadline())
                    )),
                ));
            }
            GuardOutcome::Completed(result) if !result.passed() => {
                warn!(index = item.index, worker, "Failed to fetch code");
                return Ok((
                    Classification::FetchFailed,
                    Some(format!("fetch {}", result.exit_description())),
                ));
            }
            GuardOutcome::Completed(_) => {}
        }

        info!(index = item.index, worker, "Running pre-patch tests");
        let pre = self.run_stage(Stage::PrePatchTest, &ctx, &workspace, trace).await?;
        if !pre.passed() {
            info!(index = item.index, worker, "Failed pre-patch tests, no further testing");
            return Ok((
                Classification::FailedPrePatchTest,
                Some(test_failure_detail("pre-patch", &pre, &workspace)),
            ));
        }

        info!(index = item.index, worker, "Applying patch");
        let patch = self.run_stage(Stage::PatchApply, &ctx, &workspace, trace).await?;
        if !patch.passed() {
            warn!(index = item.index, worker, "Failed to apply patch");
            return Ok((
                Classification::PatchFailed,
                Some(format!("patch {}", patch.exit_description())),
            ));
        }

        info!(index = item.index, worker, "Running post-patch tests");
        let post = self.run_stage(Stage::PostPatchTest, &ctx, &workspace, trace).await?;
        if !post.passed() {
            warn!(index = item.index, worker, "Failed post-patch tests");
            return Ok((
                Classification::FailedPostPatchTest,
                Some(test_failure_detail("post-patch", &post, &workspace)),
            ));
        }

        Ok((Classification::Passed, None))
    }

    /// Run an unguarded stage, capturing test output to the workspace log.
    async fn run_stage(
        &self,
        stage: Stage,
        ctx: &StageContext<'_>,
        workspace: &Workspace,
        trace: &mut Vec<StageRecord>,
    ) -> Result<StageResult> {
        let mut command: StageCommand = self.toolchain.command_for(stage, ctx);
        if let Some(log) = workspace.log_path(stage) {
            command.output = StageOutput::LogFile(log);
        }

        match StageRunner::execute(&command).await {
            Ok(result) => {
                trace.push(result.record());
                Ok(result)
            }
            Err(e) => {
                trace.push(errored(stage));
                Err(e)
            }
        }
    }
}

fn errored(stage: Stage) -> StageRecord {
    StageRecord {
        stage,
        outcome: StageOutcome::Errored,
        exit_code: None,
        duration_ms: 0,
    }
}

fn test_failure_detail(phase: &str, result: &StageResult, workspace: &Workspace) -> String {
    match workspace.log_path(result.stage) {
        Some(log) => format!(
            "{phase} tests {} (log: {})",
            result.exit_description(),
            log.display()
        ),
        None => format!("{phase} tests {}", result.exit_description()),
    }
}
