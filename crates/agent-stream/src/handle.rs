use tokio::sync::watch;
use tracing::debug;

/// Lifecycle of one stream request.
///
/// `Complete`, `Error` and `Cancelled` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamState {
    /// Waiting for the first attempt or for a retry delay to elapse.
    PendingConnect,
    /// A connection attempt is in flight.
    Connecting,
    /// Response headers accepted; events are being decoded.
    Streaming,
    Complete,
    Error,
    Cancelled,
}

impl StreamState {
    /// True once the stream can make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error | Self::Cancelled)
    }
}

/// Caller-owned control handle for a stream request.
///
/// Dropping the handle without calling [`StreamHandle::cancel`] detaches the
/// stream: it keeps running until its natural end.
pub struct StreamHandle {
    stream_id: uuid::Uuid,
    cancel_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<StreamState>,
}

impl StreamHandle {
    pub(crate) fn new(stream_id: uuid::Uuid) -> (Self, CancelSignal, StateReporter) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(StreamState::PendingConnect);
        (
            Self {
                stream_id,
                cancel_tx,
                state_rx,
            },
            CancelSignal { rx: cancel_rx },
            StateReporter { tx: state_tx },
        )
    }

    /// Id used in log fields for this stream request.
    pub fn id(&self) -> uuid::Uuid {
        self.stream_id
    }

    /// Requests cancellation.
    ///
    /// Idempotent and non-blocking. Safe before the first connection attempt,
    /// during a retry delay, mid-stream, or after the stream has finished (a
    /// no-op then). No callback fires once the stream task observes the flag.
    pub fn cancel(&self) {
        let was_cancelled = self.cancel_tx.send_replace(true);
        if !was_cancelled {
            debug!(stream_id = %self.stream_id, "stream cancellation requested");
        }
    }

    /// True once `cancel` has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    /// Most recent lifecycle state published by the stream task.
    pub fn state(&self) -> StreamState {
        *self.state_rx.borrow()
    }

    /// Waits until the stream reaches a terminal state and returns it.
    pub async fn finished(&mut self) -> StreamState {
        if let Ok(state) = self.state_rx.wait_for(StreamState::is_terminal).await {
            return *state;
        }
        *self.state_rx.borrow()
    }
}

/// Stream-task side of the cancellation flag.
pub(crate) struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub(crate) fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Never resolves if the handle
    /// was dropped without cancelling.
    pub(crate) async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Stream-task side of the lifecycle state.
pub(crate) struct StateReporter {
    tx: watch::Sender<StreamState>,
}

impl StateReporter {
    pub(crate) fn set(&self, state: StreamState) {
        self.tx.send_replace(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_idempotent_and_permanent() {
        let (handle, signal, _state) = StreamHandle::new(uuid::Uuid::new_v4());
        assert!(!handle.is_cancelled());
        assert!(!signal.is_cancelled());
        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn finished_waits_for_a_terminal_state() {
        let (mut handle, _signal, state) = StreamHandle::new(uuid::Uuid::new_v4());
        assert_eq!(handle.state(), StreamState::PendingConnect);
        let task = tokio::spawn(async move {
            state.set(StreamState::Connecting);
            state.set(StreamState::Streaming);
            tokio::task::yield_now().await;
            state.set(StreamState::Complete);
        });
        assert_eq!(handle.finished().await, StreamState::Complete);
        task.await.expect("reporter task");
    }

    #[tokio::test]
    async fn finished_returns_last_state_when_the_task_goes_away() {
        let (mut handle, _signal, state) = StreamHandle::new(uuid::Uuid::new_v4());
        state.set(StreamState::Streaming);
        drop(state);
        assert_eq!(handle.finished().await, StreamState::Streaming);
    }

    #[tokio::test]
    async fn dropped_handle_detaches_instead_of_cancelling() {
        let (handle, mut signal, _state) = StreamHandle::new(uuid::Uuid::new_v4());
        drop(handle);
        assert!(!signal.is_cancelled());
        let waited = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            signal.cancelled(),
        )
        .await;
        assert!(waited.is_err(), "detached stream must not observe a cancel");
    }
}
