//! Report emission: text and JSON report files plus the console summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use uuid::Uuid;

use crate::classification::Classification;
use crate::config::ReportFormat;
use crate::error::{ImpactError, Result};
use crate::reply::Reply;
use crate::state::{RunCompletion, RunState};

/// Current JSON report schema.
pub const REPORT_SCHEMA_VERSION: &str = "1.0";

/// Run identity recorded in the JSON report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunHeader {
    pub run_id: Uuid,
    pub package_under_test: String,
    /// SHA-256 of the patch, when it could be read.
    pub patch_digest: Option<String>,
}

impl RunHeader {
    pub fn new(package_under_test: impl Into<String>, patch_digest: Option<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            package_under_test: package_under_test.into(),
            patch_digest,
        }
    }
}

/// JSON report artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportArtifact {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub header: RunHeader,
    pub completion: RunCompletion,
    pub expected: usize,
    pub received: usize,
    /// Report code → count, for every classification.
    pub summary: BTreeMap<String, usize>,
    pub results: Vec<Reply>,
}

impl ReportArtifact {
    pub fn new(header: RunHeader, state: &RunState, completion: RunCompletion) -> Self {
        let summary = Classification::ALL
            .iter()
            .map(|c| (c.code().to_string(), state.count(*c)))
            .collect();

        Self {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            header,
            completion,
            expected: state.expected(),
            received: state.received(),
            summary,
            results: state.replies().to_vec(),
        }
    }
}

/// Render one text report line: `index, code, identifier, "detail"`.
pub fn render_line(reply: &Reply) -> String {
    let mut line = format!(
        "{:04}, {}, {}, ",
        reply.item.index,
        reply.classification.code(),
        reply.item.identifier
    );
    if let Some(detail) = &reply.detail {
        // Debug formatting quotes and escapes embedded quotes/newlines.
        let _ = write!(line, "{detail:?}");
    }
    line
}

/// Render the whole text report, one line per reply in arrival order.
pub fn render_text_report(state: &RunState) -> String {
    let mut out = String::new();
    for reply in state.replies() {
        out.push_str(&render_line(reply));
        out.push('\n');
    }
    out
}

/// Render the console summary of counts per classification.
pub fn render_summary(state: &RunState, completion: RunCompletion) -> String {
    let mut out = format!("Tested {} packages\n", state.received());
    if !completion.is_complete() {
        let _ = writeln!(
            out,
            "\t{} of {} packages reported ({completion})",
            state.received(),
            state.expected()
        );
    }
    for classification in Classification::ALL {
        let _ = writeln!(
            out,
            "\t{} {}",
            state.count(classification),
            classification.summary_label()
        );
    }
    out
}

/// Persist the report in the requested format.
pub fn write_report(
    path: &Path,
    format: ReportFormat,
    header: RunHeader,
    state: &RunState,
    completion: RunCompletion,
) -> Result<()> {
    let content = match format {
        ReportFormat::Text => render_text_report(state),
        ReportFormat::Json => {
            let artifact = ReportArtifact::new(header, state, completion);
            serde_json::to_string_pretty(&artifact)?
        }
    };

    std::fs::write(path, content).map_err(|source| ImpactError::Report {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), records = state.received(), "Wrote report");
    Ok(())
}
