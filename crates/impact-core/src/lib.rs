//! Impact Core - domain model for downstream impact checks
//!
//! Shared by the execution engine and the CLI:
//! - Work items, classifications and per-item replies
//! - Collector-owned run state
//! - Configuration, package list loading
//! - Text/JSON report emission and console summary

pub mod classification;
pub mod config;
pub mod error;
pub mod item;
pub mod packages;
pub mod reply;
pub mod report;
pub mod state;
pub mod telemetry;

pub use classification::Classification;
pub use config::{
    compute_digest, ImpactConfig, ReportFormat, DEFAULT_CONCURRENCY, DEFAULT_FETCH_TIMEOUT,
    DEFAULT_QUEUE_CAPACITY,
};
pub use error::{ImpactError, Result};
pub use item::WorkItem;
pub use packages::{load_package_list, parse_package_list};
pub use reply::{Reply, Stage, StageOutcome, StageRecord};
pub use report::{
    render_line, render_summary, render_text_report, write_report, ReportArtifact, RunHeader,
};
pub use state::{RunCompletion, RunState};
pub use telemetry::init_tracing;
