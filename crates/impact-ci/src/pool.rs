//! Fixed-size worker pool draining the feed.

use impact_core::Reply;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::feed::FeedReceiver;
use crate::pipeline::ItemPipeline;

/// `concurrency` tasks, each looping: take an item, run its pipeline, send
/// the reply. A worker stops when the feed is drained, the reply channel is
/// closed, or `shutdown` fires between items.
pub struct WorkerPool {
    handles: Vec<JoinHandle<usize>>,
}

impl WorkerPool {
    pub fn spawn(
        concurrency: usize,
        feed: FeedReceiver,
        pipeline: ItemPipeline,
        replies: mpsc::Sender<Reply>,
        shutdown: CancellationToken,
    ) -> Self {
        let handles = (0..concurrency)
            .map(|worker| {
                tokio::spawn(work(
                    worker,
                    feed.clone(),
                    pipeline.clone(),
                    replies.clone(),
                    shutdown.clone(),
                ))
            })
            .collect();
        Self { handles }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to exit. Returns the number of items processed.
    pub async fn join(self) -> usize {
        let mut processed = 0;
        for result in futures::future::join_all(self.handles).await {
            match result {
                Ok(n) => processed += n,
                Err(e) => warn!(error = %e, "Worker task failed"),
            }
        }
        processed
    }

    /// Let workers run on unobserved. In-flight stages finish (or are
    /// killed when the runtime shuts down) and their replies are dropped.
    pub fn detach(self) {
        debug!(workers = self.handles.len(), "Detaching workers");
        drop(self.handles);
    }
}

async fn work(
    worker: usize,
    feed: FeedReceiver,
    pipeline: ItemPipeline,
    replies: mpsc::Sender<Reply>,
    shutdown: CancellationToken,
) -> usize {
    let mut processed = 0;
    loop {
        let item = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            item = feed.next() => match item {
                Some(item) => item,
                None => break,
            },
        };

        let reply = pipeline.run(worker, item).await;
        processed += 1;
        if replies.send(reply).await.is_err() {
            debug!(worker, "Reply channel closed");
            break;
        }
    }
    debug!(worker, processed, "Worker exiting");
    processed
}
