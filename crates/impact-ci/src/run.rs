//! Run orchestration: feed → worker pool → collector.

use impact_core::{ImpactConfig, RunCompletion, RunState, WorkItem};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::collector::Collector;
use crate::error::Result;
use crate::feed::work_feed;
use crate::pipeline::{ItemPipeline, PipelineSettings};
use crate::pool::WorkerPool;
use crate::toolchain::Toolchain;

/// Final state of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub state: RunState,
    pub completion: RunCompletion,
}

impl RunOutcome {
    pub fn is_complete(&self) -> bool {
        self.completion.is_complete()
    }
}

/// A configured run, ready to start.
pub struct ImpactRun {
    pipeline: ItemPipeline,
    concurrency: usize,
    queue_capacity: usize,
}

impl ImpactRun {
    pub fn new(toolchain: Arc<dyn Toolchain>, config: &ImpactConfig) -> Self {
        Self {
            pipeline: ItemPipeline::new(toolchain, PipelineSettings::from(config)),
            concurrency: config.concurrency.max(1),
            queue_capacity: config.queue_capacity.max(1),
        }
    }

    /// Start processing `identifiers` in the background.
    ///
    /// Cancelling `interrupt` stops the feed, tells idle workers to exit and
    /// completes the run with whatever replies have been recorded. Work
    /// already in flight is not awaited.
    pub fn start(self, identifiers: Vec<String>, interrupt: CancellationToken) -> RunHandle {
        let items = WorkItem::from_identifiers(identifiers);
        let expected = items.len();
        info!(
            items = expected,
            concurrency = self.concurrency,
            toolchain = self.pipeline.toolchain().name(),
            "Starting run"
        );

        let shutdown = interrupt.child_token();
        let (feed_tx, feed_rx) = work_feed(self.queue_capacity);
        let (reply_tx, reply_rx) = mpsc::channel(self.concurrency);

        let producer = tokio::spawn(feed_tx.publish(items, shutdown.clone()));
        let pool = WorkerPool::spawn(
            self.concurrency,
            feed_rx,
            self.pipeline,
            reply_tx,
            shutdown.clone(),
        );
        let (collector, progress) = Collector::new(reply_rx, expected);

        let task = tokio::spawn(async move {
            let (state, completion) = collector.run(&interrupt).await;
            shutdown.cancel();

            if completion == RunCompletion::Interrupted {
                pool.detach();
            } else {
                if let Err(e) = producer.await {
                    warn!(error = %e, "Feed producer task failed");
                }
                pool.join().await;
            }

            info!(
                received = state.received(),
                expected = state.expected(),
                %completion,
                "Run finished"
            );
            RunOutcome { state, completion }
        });

        RunHandle { progress, task }
    }

    /// Start and wait for the outcome.
    pub async fn execute(
        self,
        identifiers: Vec<String>,
        interrupt: CancellationToken,
    ) -> Result<RunOutcome> {
        self.start(identifiers, interrupt).wait().await
    }
}

/// Handle to a started run.
pub struct RunHandle {
    progress: watch::Receiver<usize>,
    task: JoinHandle<RunOutcome>,
}

impl RunHandle {
    /// Number of replies recorded so far.
    pub fn progress(&self) -> watch::Receiver<usize> {
        self.progress.clone()
    }

    pub async fn wait(self) -> Result<RunOutcome> {
        Ok(self.task.await?)
    }
}
