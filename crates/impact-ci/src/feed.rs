//! Bounded multi-consumer hand-off of work items to the pool.

use impact_core::WorkItem;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Producer half of the feed.
pub struct FeedSender {
    tx: mpsc::Sender<WorkItem>,
}

/// Consumer half, shared by every worker.
#[derive(Clone)]
pub struct FeedReceiver {
    rx: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
}

/// Create a feed whose queue holds at most `capacity` unclaimed items.
pub fn work_feed(capacity: usize) -> (FeedSender, FeedReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        FeedSender { tx },
        FeedReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

impl FeedSender {
    /// Publish `items` in order, then close the feed.
    ///
    /// Stops early once `shutdown` fires or every receiver is gone. Returns
    /// how many items were handed off.
    pub async fn publish(self, items: Vec<WorkItem>, shutdown: CancellationToken) -> usize {
        let total = items.len();
        let mut sent = 0;
        for item in items {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!(sent, total, "Shutdown requested, closing feed early");
                    break;
                }
                res = self.tx.send(item) => {
                    if res.is_err() {
                        debug!(sent, total, "All workers gone, closing feed early");
                        break;
                    }
                    sent += 1;
                }
            }
        }
        sent
    }
}

impl FeedReceiver {
    /// Claim the next item; `None` once the feed is closed and drained.
    pub async fn next(&self) -> Option<WorkItem> {
        self.rx.lock().await.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_feed_preserves_order_and_closes() {
        let (tx, rx) = work_feed(2);
        let items = WorkItem::from_identifiers(["a", "b", "c", "d"]);
        let producer = tokio::spawn(tx.publish(items, CancellationToken::new()));

        let mut seen = Vec::new();
        while let Some(item) = rx.next().await {
            seen.push(item.index);
        }
        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert_eq!(producer.await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_feed_shared_between_consumers() {
        let (tx, rx) = work_feed(4);
        let producer = tokio::spawn(tx.publish(
            WorkItem::from_identifiers((0..20).map(|i| format!("pkg{i}"))),
            CancellationToken::new(),
        ));

        let mut consumers = Vec::new();
        for _ in 0..3 {
            let rx = rx.clone();
            consumers.push(tokio::spawn(async move {
                let mut got = Vec::new();
                while let Some(item) = rx.next().await {
                    got.push(item.index);
                }
                got
            }));
        }

        let mut all = Vec::new();
        for consumer in consumers {
            all.extend(consumer.await.unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (0..20).collect::<Vec<_>>());
        assert_eq!(producer.await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_feed_stops_on_shutdown() {
        let (tx, rx) = work_feed(1);
        let shutdown = CancellationToken::new();
        let producer = tokio::spawn(tx.publish(
            WorkItem::from_identifiers(["a", "b", "c"]),
            shutdown.clone(),
        ));

        // Queue holds one item; the producer blocks on the second until shutdown.
        assert_eq!(rx.next().await.map(|i| i.index), Some(0));
        shutdown.cancel();
        let sent = producer.await.unwrap();
        assert!(sent < 3, "producer kept publishing after shutdown");

        // Whatever was queued drains, then the feed reports closed.
        while rx.next().await.is_some() {}
    }
}
