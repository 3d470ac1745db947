//! Terminal outcome tags for work items.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal classification of one work item.
///
/// Assigned by the first failing pipeline stage, or `Passed` when every
/// stage succeeds. The declaration order has no meaning beyond giving the
/// summary a stable layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    FetchTimedOut,
    FetchFailed,
    FailedPrePatchTest,
    FailedPostPatchTest,
    PatchFailed,
    FailedUnexpectedly,
    Passed,
}

impl Classification {
    /// Every classification, in summary order.
    pub const ALL: [Classification; 7] = [
        Classification::FetchTimedOut,
        Classification::FetchFailed,
        Classification::FailedPrePatchTest,
        Classification::FailedPostPatchTest,
        Classification::PatchFailed,
        Classification::FailedUnexpectedly,
        Classification::Passed,
    ];

    /// Two-character code written to the text report.
    pub fn code(&self) -> &'static str {
        match self {
            Classification::FetchTimedOut => "FT",
            Classification::FetchFailed => "FF",
            Classification::FailedPrePatchTest => "F1",
            Classification::FailedPostPatchTest => "F2",
            Classification::PatchFailed => "FP",
            Classification::FailedUnexpectedly => "F?",
            Classification::Passed => "P!",
        }
    }

    /// Parse a report code back into a classification.
    pub fn from_code(code: &str) -> Option<Classification> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    /// Human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            Classification::FetchTimedOut => "Fetch timed out",
            Classification::FetchFailed => "Fetch failed",
            Classification::FailedPrePatchTest => "Failed pre-patch testing",
            Classification::FailedPostPatchTest => "Failed post-patch testing",
            Classification::PatchFailed => "Patch failed to apply",
            Classification::FailedUnexpectedly => "Failed unexpectedly",
            Classification::Passed => "Passed",
        }
    }

    /// Line label used in the console summary (`"\t{count} {label}"`).
    pub fn summary_label(&self) -> &'static str {
        match self {
            Classification::FetchTimedOut => "fetch timed out",
            Classification::FetchFailed => "failed fetching",
            Classification::FailedPrePatchTest => "failed pre-patch testing",
            Classification::FailedPostPatchTest => "failed post-patch testing",
            Classification::PatchFailed => "failed to apply the patch",
            Classification::FailedUnexpectedly => "failed in unexpected ways",
            Classification::Passed => "passed testing",
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Classification::Passed)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
