use tokio::sync::mpsc;

use crate::errors::StreamFailure;
use crate::event::{EventPayload, StreamEvent};

/// Observer for one stream request.
///
/// Methods run on the stream task, one at a time, in the order events were
/// decoded. Exactly one of `on_complete` / `on_error` fires last, unless the
/// stream is cancelled, in which case neither does.
pub trait StreamCallbacks: Send {
    /// Progress update, including synthetic retry notices.
    fn on_progress(&mut self, payload: EventPayload);
    /// Response content.
    fn on_data(&mut self, payload: EventPayload);
    /// Terminal success. `None` when the body ended without a `complete` event.
    fn on_complete(&mut self, payload: Option<EventPayload>);
    /// Terminal failure.
    fn on_error(&mut self, failure: StreamFailure);
}

/// Forwards every callback into a channel as a `StreamEvent`.
///
/// A closed receiver is ignored; the stream still runs to its end.
impl StreamCallbacks for mpsc::UnboundedSender<StreamEvent> {
    fn on_progress(&mut self, payload: EventPayload) {
        let _ = self.send(StreamEvent::Progress(payload));
    }

    fn on_data(&mut self, payload: EventPayload) {
        let _ = self.send(StreamEvent::Data(payload));
    }

    fn on_complete(&mut self, payload: Option<EventPayload>) {
        let _ = self.send(StreamEvent::Complete(payload));
    }

    fn on_error(&mut self, failure: StreamFailure) {
        let _ = self.send(StreamEvent::Error(failure));
    }
}

type Handler<T> = Box<dyn FnMut(T) + Send>;

/// Callback set assembled from closures. Unset handlers drop their events.
#[derive(Default)]
pub struct Callbacks {
    progress: Option<Handler<EventPayload>>,
    data: Option<Handler<EventPayload>>,
    complete: Option<Handler<Option<EventPayload>>>,
    error: Option<Handler<StreamFailure>>,
}

impl Callbacks {
    /// Empty callback set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles progress updates.
    pub fn progress(mut self, f: impl FnMut(EventPayload) + Send + 'static) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    /// Handles response content.
    pub fn data(mut self, f: impl FnMut(EventPayload) + Send + 'static) -> Self {
        self.data = Some(Box::new(f));
        self
    }

    /// Handles terminal success.
    pub fn complete(mut self, f: impl FnMut(Option<EventPayload>) + Send + 'static) -> Self {
        self.complete = Some(Box::new(f));
        self
    }

    /// Handles terminal failure.
    pub fn error(mut self, f: impl FnMut(StreamFailure) + Send + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }
}

impl StreamCallbacks for Callbacks {
    fn on_progress(&mut self, payload: EventPayload) {
        if let Some(f) = self.progress.as_mut() {
            f(payload);
        }
    }

    fn on_data(&mut self, payload: EventPayload) {
        if let Some(f) = self.data.as_mut() {
            f(payload);
        }
    }

    fn on_complete(&mut self, payload: Option<EventPayload>) {
        if let Some(f) = self.complete.as_mut() {
            f(payload);
        }
    }

    fn on_error(&mut self, failure: StreamFailure) {
        if let Some(f) = self.error.as_mut() {
            f(failure);
        }
    }
}
