//! Deadline guard for the fetch stage.
//!
//! The fetch is the only stage whose duration depends on the network, so it
//! is the only one raced against a deadline. When the deadline wins the
//! process group is killed and reaped in the background; the caller gets
//! [`GuardOutcome::TimedOut`] straight away and never waits on the exit.

use impact_core::{StageOutcome, StageRecord};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::runner::{StageProcess, StageResult, StageRunner};
use crate::stage::StageCommand;

/// How a guarded stage ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// The process exited before the deadline.
    Completed(StageResult),
    /// The deadline elapsed and the process was killed.
    TimedOut {
        /// Pid of the killed process (leader of its process group on unix).
        pid: Option<u32>,
        elapsed_ms: u64,
    },
}

impl GuardOutcome {
    pub fn timed_out(&self) -> bool {
        matches!(self, GuardOutcome::TimedOut { .. })
    }

    /// Trace entry for this outcome.
    pub fn record(&self, command: &StageCommand) -> StageRecord {
        match self {
            GuardOutcome::Completed(result) => result.record(),
            GuardOutcome::TimedOut { elapsed_ms, .. } => StageRecord {
                stage: command.stage,
                outcome: StageOutcome::TimedOut,
                exit_code: None,
                duration_ms: *elapsed_ms,
            },
        }
    }
}

/// Races a stage process against a fixed deadline.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutGuard {
    deadline: Duration,
}

impl TimeoutGuard {
    pub fn new(deadline: Duration) -> Self {
        Self { deadline }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Run `command`, killing it if it outlives the deadline.
    pub async fn run(&self, command: &StageCommand) -> Result<GuardOutcome> {
        let start = Instant::now();
        let mut process = StageRunner::spawn(command)?;

        match tokio::time::timeout(self.deadline, process.wait()).await {
            Ok(status) => {
                let status = status.map_err(|source| EngineError::Wait {
                    stage: command.stage,
                    source,
                })?;
                Ok(GuardOutcome::Completed(StageResult::from_status(
                    command.stage,
                    status,
                    start.elapsed(),
                )))
            }
            Err(_elapsed) => {
                warn!(
                    stage = %command.stage,
                    deadline = %humantime::format_duration(self.deadline),
                    "Stage timed out, killing process"
                );
                let pid = terminate(process);
                Ok(GuardOutcome::TimedOut {
                    pid,
                    elapsed_ms: start.elapsed().as_millis() as u64,
                })
            }
        }
    }
}

/// Kill `process` and its process group without waiting for the exit.
///
/// The process is moved into a detached task that reaps it, so no zombie or
/// open pipe outlives the item. Kill errors are logged and ignored.
pub fn terminate(mut process: StageProcess) -> Option<u32> {
    let pid = process.id();
    process.kill();

    tokio::spawn(async move {
        match process.wait().await {
            Ok(status) => debug!(?pid, %status, "Reaped killed process"),
            Err(e) => warn!(?pid, error = %e, "Failed to reap killed process"),
        }
    });

    pid
}
