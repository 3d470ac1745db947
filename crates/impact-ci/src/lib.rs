//! Impact CI - concurrent downstream test engine
//!
//! Runs each consumer through a four-stage pipeline:
//! - Fetch the consumer and its dependencies (deadline-bounded)
//! - Run its tests against the current library
//! - Apply the candidate patch to the library
//! - Run its tests again
//!
//! Items flow from a bounded feed through a fixed worker pool to a single
//! collector that owns all run state.

pub mod collector;
pub mod error;
pub mod feed;
pub mod guard;
pub mod pipeline;
pub mod pool;
pub mod run;
pub mod runner;
pub mod stage;
pub mod toolchain;
pub mod workspace;

// Re-export key types
pub use collector::Collector;
pub use error::{EngineError, Result};
pub use feed::{work_feed, FeedReceiver, FeedSender};
pub use guard::{GuardOutcome, TimeoutGuard};
pub use pipeline::{ItemPipeline, PipelineSettings};
pub use pool::WorkerPool;
pub use run::{ImpactRun, RunHandle, RunOutcome};
pub use runner::{StageProcess, StageResult, StageRunner};
pub use stage::{StageCommand, StageOutput};
pub use toolchain::{CommandTemplate, GoToolchain, StageContext, TemplateToolchain, Toolchain};
pub use workspace::Workspace;
