use std::sync::Arc;

use futures::StreamExt as _;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::callbacks::StreamCallbacks;
use crate::config::ClientConfig;
use crate::decoder::{LineDecoder, parse_event_line};
use crate::errors::{AgentError, StreamFailure, TransportError};
use crate::event::{EventKind, EventPayload, StreamEvent};
use crate::handle::{CancelSignal, StateReporter, StreamHandle, StreamState};
use crate::policy::{RetryPolicy, RetryState};
use crate::request::StreamRequest;
use crate::session::SessionId;
use crate::transport::{ByteStream, HttpTransport, Transport};

/// `step` value carried by synthetic retry notices.
pub const RETRY_STEP: &str = "retrying";

struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
}

/// Opens streaming requests against the agent backend.
///
/// Each `open` spawns one tokio task that connects (with retries), decodes the
/// body and drives the callbacks. It must be called from within a tokio
/// runtime.
#[derive(Clone)]
pub struct StreamClient {
    inner: Arc<ClientInner>,
}

impl StreamClient {
    /// Creates a client using the reqwest transport.
    pub fn new(config: ClientConfig) -> Result<Self, AgentError> {
        Self::builder().config(config).build()
    }

    /// Creates a client from `ClientConfig::from_env`.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Starts a builder with default config and the reqwest transport.
    pub fn builder() -> StreamClientBuilder {
        StreamClientBuilder::default()
    }

    /// Config this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Starts a stream request and returns its handle immediately.
    pub fn open(
        &self,
        request: StreamRequest,
        callbacks: impl StreamCallbacks + 'static,
    ) -> StreamHandle {
        self.open_boxed(request, Box::new(callbacks))
    }

    /// Starts a stream request whose callbacks are delivered as
    /// [`StreamEvent`]s on a channel. The channel closes after the last event.
    pub fn open_channel(
        &self,
        request: StreamRequest,
    ) -> (StreamHandle, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (self.open(request, tx), rx)
    }

    fn open_boxed(
        &self,
        request: StreamRequest,
        callbacks: Box<dyn StreamCallbacks>,
    ) -> StreamHandle {
        let stream_id = uuid::Uuid::new_v4();
        let (handle, cancel, state) = StreamHandle::new(stream_id);
        let task = StreamTask {
            stream_id,
            url: self.inner.config.endpoint_url(request.endpoint()),
            known_session: request.session_id().filter(|id| !id.is_blank()).cloned(),
            request,
            transport: self.inner.transport.clone(),
            policy: self.inner.config.retry,
            callbacks,
            cancel,
            state,
        };
        debug!(stream_id = %stream_id, url = %task.url, "opening stream");
        tokio::spawn(task.run());
        handle
    }
}

/// Builder for `StreamClient`.
#[derive(Default)]
pub struct StreamClientBuilder {
    config: Option<ClientConfig>,
    transport: Option<Arc<dyn Transport>>,
    retry: Option<RetryPolicy>,
}

impl StreamClientBuilder {
    /// Sets the client config.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replaces the reqwest transport (proxies, tests).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Overrides the retry policy from the config.
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Validates the config and builds the client.
    pub fn build(self) -> Result<StreamClient, AgentError> {
        let mut config = self.config.unwrap_or_default();
        if let Some(retry) = self.retry {
            config.retry = retry;
        }
        config.validate()?;
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&config)?),
        };
        Ok(StreamClient {
            inner: Arc::new(ClientInner { config, transport }),
        })
    }
}

enum Flow {
    Continue,
    Finished(StreamState),
}

struct StreamTask {
    stream_id: uuid::Uuid,
    url: String,
    request: StreamRequest,
    known_session: Option<SessionId>,
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    callbacks: Box<dyn StreamCallbacks>,
    cancel: CancelSignal,
    state: StateReporter,
}

impl StreamTask {
    async fn run(mut self) {
        let outcome = match self.connect().await {
            Ok(stream) => {
                self.state.set(StreamState::Streaming);
                self.read(stream).await
            }
            Err(terminal) => terminal,
        };
        self.state.set(outcome);
        debug!(stream_id = %self.stream_id, state = ?outcome, "stream finished");
    }

    /// Connect phase: every failure passes through the retry policy.
    async fn connect(&mut self) -> Result<ByteStream, StreamState> {
        let body = match self.request.wire_body() {
            Ok(body) => body,
            Err(err) => return Err(self.fail(err.into())),
        };

        let mut retry = RetryState::new(&self.policy);
        loop {
            if self.cancel.is_cancelled() {
                return Err(StreamState::Cancelled);
            }
            self.state.set(StreamState::Connecting);
            debug!(stream_id = %self.stream_id, url = %self.url, attempt = retry.attempt, "connecting");

            let opened = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(StreamState::Cancelled),
                opened = self.transport.open(&self.url, &body) => opened,
            };
            let err = match opened {
                Ok(stream) => return Ok(stream),
                Err(err) => err,
            };

            if !err.is_retryable() {
                warn!(stream_id = %self.stream_id, error = %err, "stream connection failed");
                return Err(self.fail(err.into()));
            }
            let Some(delay) = retry.next_delay(&self.policy) else {
                let failure = if retry.attempt == 0 {
                    StreamFailure::from(err)
                } else {
                    StreamFailure::RetriesExhausted {
                        attempts: retry.attempt,
                        last_error: err.to_string(),
                    }
                };
                warn!(stream_id = %self.stream_id, error = %failure, "giving up on stream connection");
                return Err(self.fail(failure));
            };

            warn!(
                stream_id = %self.stream_id,
                attempt = retry.attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "stream connection failed, retrying"
            );
            self.state.set(StreamState::PendingConnect);
            let mut notice =
                EventPayload::with_message(self.policy.retry_notice(retry.attempt, delay));
            notice.step = Some(RETRY_STEP.to_string());
            if let Flow::Finished(state) = self.emit(EventKind::Progress, notice) {
                return Err(state);
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(StreamState::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Streaming phase: failures here are terminal and never retried.
    async fn read(&mut self, mut stream: ByteStream) -> StreamState {
        let mut decoder = LineDecoder::default();
        loop {
            if self.cancel.is_cancelled() {
                return StreamState::Cancelled;
            }
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return StreamState::Cancelled,
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    for line in decoder.push(&chunk) {
                        if let Flow::Finished(state) = self.handle_line(&line) {
                            return state;
                        }
                    }
                }
                Some(Err(err)) => {
                    warn!(stream_id = %self.stream_id, error = %err, "stream interrupted");
                    let message = match err {
                        TransportError::Read { message } => message,
                        other => other.to_string(),
                    };
                    return self.fail(StreamFailure::Interrupted { message });
                }
                None => {
                    if let Some(line) = decoder.finish()
                        && let Flow::Finished(state) = self.handle_line(&line)
                    {
                        return state;
                    }
                    if self.cancel.is_cancelled() {
                        return StreamState::Cancelled;
                    }
                    debug!(stream_id = %self.stream_id, "stream ended without a terminal event");
                    self.callbacks.on_complete(None);
                    return StreamState::Complete;
                }
            }
        }
    }

    fn handle_line(&mut self, line: &str) -> Flow {
        let event = match parse_event_line(line) {
            None => return Flow::Continue,
            Some(Ok(event)) => event,
            Some(Err(err)) => {
                warn!(stream_id = %self.stream_id, error = %err, "skipping malformed event");
                return Flow::Continue;
            }
        };
        let Some(kind) = event.kind() else {
            warn!(stream_id = %self.stream_id, event_type = ?event.event_type, "ignoring event with unknown type");
            return Flow::Continue;
        };
        self.emit(kind, event.payload)
    }

    fn emit(&mut self, kind: EventKind, mut payload: EventPayload) -> Flow {
        if self.cancel.is_cancelled() {
            return Flow::Finished(StreamState::Cancelled);
        }
        match kind {
            EventKind::Progress => {
                self.capture_session(&mut payload);
                self.callbacks.on_progress(payload);
                Flow::Continue
            }
            EventKind::Data => {
                self.capture_session(&mut payload);
                self.callbacks.on_data(payload);
                Flow::Continue
            }
            EventKind::Complete => {
                self.callbacks.on_complete(Some(payload));
                Flow::Finished(StreamState::Complete)
            }
            EventKind::Error => {
                let failure = StreamFailure::application(payload);
                warn!(stream_id = %self.stream_id, error = %failure, "backend reported an error");
                self.callbacks.on_error(failure);
                Flow::Finished(StreamState::Error)
            }
        }
    }

    fn capture_session(&mut self, payload: &mut EventPayload) {
        if self.known_session.is_none()
            && let Some(id) = &payload.session_id
            && !id.is_blank()
        {
            debug!(stream_id = %self.stream_id, session_id = %id, "captured session id");
            self.known_session = Some(id.clone());
            payload.session_captured = true;
        }
    }

    fn fail(&mut self, failure: StreamFailure) -> StreamState {
        if self.cancel.is_cancelled() {
            return StreamState::Cancelled;
        }
        self.callbacks.on_error(failure);
        StreamState::Error
    }
}
