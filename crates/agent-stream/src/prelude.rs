//! Common imports for typical client usage.
pub use crate::{
    AgentApi, AgentError, BlogOperation, Callbacks, ClientConfig, Conversation, EventKind,
    EventPayload, RetryPolicy, SessionId, StreamCallbacks, StreamClient, StreamEvent,
    StreamFailure, StreamHandle, StreamRequest, StreamState,
};
