//! Per-item replies emitted by the worker pool.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::classification::Classification;
use crate::item::WorkItem;

/// The four ordered pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    PrePatchTest,
    PatchApply,
    PostPatchTest,
}

impl Stage {
    /// Stages in execution order.
    pub const ORDER: [Stage; 4] = [
        Stage::Fetch,
        Stage::PrePatchTest,
        Stage::PatchApply,
        Stage::PostPatchTest,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::PrePatchTest => "pre_patch_test",
            Stage::PatchApply => "patch_apply",
            Stage::PostPatchTest => "post_patch_test",
        }
    }

    /// Log artifact written inside the item workspace, for test stages.
    pub fn log_file_name(&self) -> Option<&'static str> {
        match self {
            Stage::PrePatchTest => Some("pre-test.log"),
            Stage::PostPatchTest => Some("post-test.log"),
            Stage::Fetch | Stage::PatchApply => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a stage that actually ran ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Succeeded,
    Failed,
    TimedOut,
    /// The stage could not be executed (spawn or I/O failure).
    Errored,
}

/// Trace entry for one executed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub outcome: StageOutcome,
    /// Process exit code, when the process exited normally.
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

/// Final result for one work item, produced exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub item: WorkItem,
    pub classification: Classification,
    /// Error description; always present for non-`Passed` classifications.
    pub detail: Option<String>,
    /// Stages that ran, in execution order.
    pub stages: Vec<StageRecord>,
    /// Worker that processed the item.
    pub worker: usize,
    pub duration_ms: u64,
}

impl Reply {
    pub fn passed(&self) -> bool {
        self.classification.is_passed()
    }

    /// Whether the given stage appears in the trace.
    pub fn ran(&self, stage: Stage) -> bool {
        self.stages.iter().any(|r| r.stage == stage)
    }

    /// Stage names in the order they executed.
    pub fn stage_sequence(&self) -> Vec<Stage> {
        self.stages.iter().map(|r| r.stage).collect()
    }
}
