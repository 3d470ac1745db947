//! Work items handed from the feed to the worker pool.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One consumer package to check against the patch.
///
/// `index` is assigned at feed time from the input order. It is used for
/// correlation, logging and workspace naming only; it never determines the
/// order in which items are processed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItem {
    pub index: usize,
    pub identifier: String,
}

impl WorkItem {
    pub fn new(index: usize, identifier: impl Into<String>) -> Self {
        Self {
            index,
            identifier: identifier.into(),
        }
    }

    /// Build items with indices `0..len` preserving input order.
    pub fn from_identifiers<I, S>(identifiers: I) -> Vec<WorkItem>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        identifiers
            .into_iter()
            .enumerate()
            .map(|(index, id)| WorkItem::new(index, id))
            .collect()
    }

    /// Zero-padded index, as used for workspace names and report lines.
    pub fn padded_index(&self) -> String {
        format!("{:04}", self.index)
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04} {}", self.index, self.identifier)
    }
}
