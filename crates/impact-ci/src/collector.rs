//! Reply collection and run completion.

use impact_core::{Reply, RunCompletion, RunState};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Receives replies until every item has reported, all workers are gone, or
/// the run is interrupted, whichever comes first.
pub struct Collector {
    replies: mpsc::Receiver<Reply>,
    state: RunState,
    progress: watch::Sender<usize>,
}

impl Collector {
    /// Returns the collector and a progress receiver tracking the number of
    /// replies recorded so far.
    pub fn new(replies: mpsc::Receiver<Reply>, expected: usize) -> (Self, watch::Receiver<usize>) {
        let (progress, progress_rx) = watch::channel(0);
        (
            Self {
                replies,
                state: RunState::new(expected),
                progress,
            },
            progress_rx,
        )
    }

    /// Collect replies. An interrupt observed between replies wins over any
    /// reply that is already queued.
    pub async fn run(mut self, interrupt: &CancellationToken) -> (RunState, RunCompletion) {
        if self.state.is_complete() {
            return (self.state, RunCompletion::AllReplied);
        }

        let completion = tokio::select! {
            biased;
            _ = interrupt.cancelled() => {
                warn!(
                    received = self.state.received(),
                    expected = self.state.expected(),
                    "Interrupted, reporting partial results"
                );
                RunCompletion::Interrupted
            }
            completion = Self::receive_all(&mut self.replies, &mut self.state, &self.progress) => completion,
        };

        (self.state, completion)
    }

    async fn receive_all(
        replies: &mut mpsc::Receiver<Reply>,
        state: &mut RunState,
        progress: &watch::Sender<usize>,
    ) -> RunCompletion {
        while let Some(reply) = replies.recv().await {
            state.record(reply);
            info!("Processed {}/{} replies", state.received(), state.expected());
            progress.send_replace(state.received());
            if state.is_complete() {
                return RunCompletion::AllReplied;
            }
        }
        warn!(
            received = state.received(),
            expected = state.expected(),
            "Workers exited before every item replied"
        );
        RunCompletion::WorkersExited
    }
}
