//! Streaming client for the AI agent chat/blog backend.
//!
//! The backend answers `POST /chat/stream` and `POST /blog/stream` with a
//! chunked body of `data: {json}` lines. [`StreamClient`] opens such a
//! request, retries the connect phase with bounded exponential backoff,
//! decodes the body incrementally and dispatches each event to a
//! [`StreamCallbacks`] implementation. The returned [`StreamHandle`] cancels
//! the request at any point.
//!
//! ```no_run
//! use agent_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), AgentError> {
//! let client = StreamClient::new(ClientConfig::new("http://localhost:8887"))?;
//! let mut conversation = Conversation::new();
//!
//! let (mut handle, mut events) = client.open_channel(conversation.chat_request("Hello!"));
//! while let Some(event) = events.recv().await {
//!     match event {
//!         StreamEvent::Progress(p) => {
//!             conversation.observe(&p);
//!             eprintln!("{}", p.message.unwrap_or_default());
//!         }
//!         StreamEvent::Data(p) => {
//!             conversation.observe(&p);
//!             println!("{}", p.message.unwrap_or_default());
//!         }
//!         StreamEvent::Complete(_) => {}
//!         StreamEvent::Error(failure) => eprintln!("error: {failure}"),
//!     }
//! }
//! handle.finished().await;
//! # Ok(())
//! # }
//! ```

/// Non-streaming endpoints (chat, blog, health, posts).
pub mod api;
/// Callback contract and ready-made implementations.
pub mod callbacks;
/// Stream client, builder and per-stream task.
pub mod client;
/// Backend address, timeouts and retry configuration.
pub mod config;
/// Line splitting and event-line parsing.
pub mod decoder;
/// Error types for each layer.
pub mod errors;
/// Event kinds and payloads.
pub mod event;
/// Cancellation handle and stream lifecycle state.
pub mod handle;
/// Logging initialization.
pub mod observability;
/// Connect-phase retry policy.
pub mod policy;
/// Common imports for typical usage.
pub mod prelude;
/// Stream request model and wire body.
pub mod request;
/// Session ids and caller-side conversation state.
pub mod session;
/// Connection collaborator contract and reqwest implementation.
pub mod transport;

pub use api::{AgentApi, BlogReply, ChatReply, HealthStatus};
pub use callbacks::{Callbacks, StreamCallbacks};
pub use client::{StreamClient, StreamClientBuilder};
pub use config::ClientConfig;
pub use errors::{AgentError, ProtocolError, StreamFailure, TransportError};
pub use event::{EventKind, EventPayload, StreamEvent};
pub use handle::{StreamHandle, StreamState};
pub use policy::{RetryPolicy, RetryState};
pub use request::{BlogOperation, StreamRequest};
pub use session::{Conversation, SessionId};
pub use transport::{ByteStream, HttpTransport, Transport};
