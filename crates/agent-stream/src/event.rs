use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::StreamFailure;
use crate::session::SessionId;

/// Discriminator carried in the `type` field of every wire event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Intermediate status update; the stream continues.
    Progress,
    /// Response content; the stream continues.
    Data,
    /// Successful end of the stream.
    Complete,
    /// Backend-reported failure; ends the stream.
    Error,
}

impl EventKind {
    /// Parses a wire `type` value. Unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "progress" => Some(Self::Progress),
            "data" => Some(Self::Data),
            "complete" => Some(Self::Complete),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::Data => "data",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    /// Complete and error end the read loop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a decoded event, without its `type` discriminator.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    /// Backend workflow step that produced the event (for example `initializing`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    /// Completion fraction in `0.0..=1.0` when the backend reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    /// Human-readable text (status line, chat reply or error message).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Conversation token assigned by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Structured operation result (blog operations).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Any other operation-specific fields, preserved as sent.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
    /// Set on the first payload of a stream that revealed a session id while
    /// none was known yet.
    #[serde(skip)]
    pub session_captured: bool,
}

impl EventPayload {
    /// Creates a payload holding only a message.
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Returns the progress fraction clamped to `0.0..=1.0`.
    pub fn progress_fraction(&self) -> Option<f64> {
        self.progress
            .filter(|p| p.is_finite())
            .map(|p| p.clamp(0.0, 1.0))
    }
}

/// Event delivered to channel consumers, in decode order.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// Progress update, including synthetic retry notices.
    Progress(EventPayload),
    /// Response content.
    Data(EventPayload),
    /// Terminal success. `None` when the body ended without a `complete` event.
    Complete(Option<EventPayload>),
    /// Terminal failure.
    Error(StreamFailure),
}

impl StreamEvent {
    /// True for `Complete` and `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete(_) | Self::Error(_))
    }
}
