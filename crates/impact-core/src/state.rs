//! Accumulated run state, owned by the collector.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::classification::Classification;
use crate::reply::Reply;

/// Which completion source ended the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunCompletion {
    /// Every fed item reported back.
    AllReplied,
    /// The operator asked the run to stop.
    Interrupted,
    /// The reply stream closed before every item reported.
    WorkersExited,
}

impl RunCompletion {
    pub fn is_complete(&self) -> bool {
        matches!(self, RunCompletion::AllReplied)
    }
}

impl fmt::Display for RunCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunCompletion::AllReplied => "all replies received",
            RunCompletion::Interrupted => "interrupted",
            RunCompletion::WorkersExited => "workers exited early",
        };
        f.write_str(s)
    }
}

/// Per-classification counts plus every reply in arrival order.
///
/// Single-writer: only the collector's receive loop calls [`RunState::record`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    expected: usize,
    counts: BTreeMap<Classification, usize>,
    replies: Vec<Reply>,
}

impl RunState {
    /// Create an empty state for a run that fed `expected` items.
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            counts: BTreeMap::new(),
            replies: Vec::with_capacity(expected),
        }
    }

    /// Fold one reply into the state.
    pub fn record(&mut self, reply: Reply) {
        *self.counts.entry(reply.classification).or_insert(0) += 1;
        self.replies.push(reply);
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn received(&self) -> usize {
        self.replies.len()
    }

    /// Natural completion: every fed item has reported.
    pub fn is_complete(&self) -> bool {
        self.received() >= self.expected
    }

    /// Count for one classification (zero when never seen).
    pub fn count(&self, classification: Classification) -> usize {
        self.counts.get(&classification).copied().unwrap_or(0)
    }

    /// Non-zero counts only.
    pub fn counts(&self) -> &BTreeMap<Classification, usize> {
        &self.counts
    }

    /// Replies in arrival order.
    pub fn replies(&self) -> &[Reply] {
        &self.replies
    }

    pub fn into_replies(self) -> Vec<Reply> {
        self.replies
    }
}
