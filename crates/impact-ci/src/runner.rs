//! Stage subprocess execution.

use impact_core::{Stage, StageOutcome, StageRecord};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::stage::{StageCommand, StageOutput};

/// Result of a stage process that ran to exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    pub stage: Stage,

    /// Exit code; `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,

    pub duration_ms: u64,

    /// Whether execution succeeded.
    pub success: bool,
}

impl StageResult {
    pub(crate) fn from_status(stage: Stage, status: ExitStatus, elapsed: Duration) -> Self {
        Self {
            stage,
            exit_code: status.code(),
            duration_ms: elapsed.as_millis() as u64,
            success: status.success(),
        }
    }

    /// Whether this stage passed (exit code 0).
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == Some(0)
    }

    /// How the process exited, for reply details.
    pub fn exit_description(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exited with status {code}"),
            None => "was terminated by a signal".to_string(),
        }
    }

    /// Trace entry for this result.
    pub fn record(&self) -> StageRecord {
        StageRecord {
            stage: self.stage,
            outcome: if self.passed() {
                StageOutcome::Succeeded
            } else {
                StageOutcome::Failed
            },
            exit_code: self.exit_code,
            duration_ms: self.duration_ms,
        }
    }
}

/// A running stage process that owns its process group.
///
/// Dropping it before the exit has been reaped kills the whole group, not
/// just the direct child. This covers workers detached by an interrupt whose
/// tasks are dropped with the runtime.
#[derive(Debug)]
pub struct StageProcess {
    child: Child,
    pid: Option<u32>,
    reaped: bool,
}

impl StageProcess {
    fn new(child: Child) -> Self {
        let pid = child.id();
        Self {
            child,
            pid,
            reaped: false,
        }
    }

    /// Pid of the process (and group leader on unix).
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Wait for the process to exit.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        let status = self.child.wait().await?;
        self.reaped = true;
        Ok(status)
    }

    /// SIGKILL the process group, then the child itself.
    pub fn kill(&mut self) {
        if self.reaped {
            return;
        }

        #[cfg(unix)]
        if let Some(pid) = self.pid {
            kill_process_group(pid);
        }

        if let Err(e) = self.child.start_kill() {
            debug!(pid = ?self.pid, error = %e, "start_kill failed (process may already be gone)");
        }
    }
}

impl Drop for StageProcess {
    fn drop(&mut self) {
        if !self.reaped {
            debug!(pid = ?self.pid, "Stage process dropped while running, killing group");
            self.kill();
        }
    }
}

/// SIGKILL every process in the group led by `pid`.
///
/// Only called while the leader is unreaped, so the group id cannot have
/// been reused.
#[cfg(unix)]
pub(crate) fn kill_process_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    #[allow(clippy::cast_possible_wrap)]
    let group = Pid::from_raw(pid as i32);
    if let Err(errno) = killpg(group, Signal::SIGKILL) {
        // ESRCH: the whole group already exited.
        if errno != nix::errno::Errno::ESRCH {
            warn!(pid, %errno, "Failed to kill process group");
        }
    }
}

/// Spawns stage commands and waits for them.
pub struct StageRunner;

impl StageRunner {
    /// Spawn the stage process.
    ///
    /// On unix the child leads its own process group so the whole tree can
    /// be killed at once. The group is killed if the handle is dropped
    /// before the exit is reaped.
    pub fn spawn(config: &StageCommand) -> Result<StageProcess> {
        let (exe, args) = config
            .command
            .split_first()
            .ok_or(EngineError::EmptyCommand {
                stage: config.stage,
            })?;

        let mut command = Command::new(exe);
        command
            .args(args)
            .envs(config.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        if let Some(dir) = &config.current_dir {
            command.current_dir(dir);
        }

        match &config.output {
            StageOutput::Inherit => {}
            StageOutput::Null => {
                command.stdout(Stdio::null()).stderr(Stdio::null());
            }
            StageOutput::LogFile(path) => {
                let log_err = |source| EngineError::LogFile {
                    stage: config.stage,
                    path: path.clone(),
                    source,
                };
                let stdout = std::fs::File::create(path).map_err(log_err)?;
                let stderr = stdout.try_clone().map_err(log_err)?;
                command.stdout(Stdio::from(stdout)).stderr(Stdio::from(stderr));
            }
        }

        #[cfg(unix)]
        command.process_group(0);

        debug!(stage = %config.stage, command = ?config.command, "Spawning stage process");

        let child = command.spawn().map_err(|source| EngineError::Spawn {
            stage: config.stage,
            program: exe.clone(),
            source,
        })?;
        Ok(StageProcess::new(child))
    }

    /// Execute a stage to its natural exit.
    pub async fn execute(config: &StageCommand) -> Result<StageResult> {
        let start = Instant::now();
        let mut process = Self::spawn(config)?;

        let status = process.wait().await.map_err(|source| EngineError::Wait {
            stage: config.stage,
            source,
        })?;

        Ok(StageResult::from_status(config.stage, status, start.elapsed()))
    }
}
