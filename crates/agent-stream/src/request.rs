use serde::{Deserialize, Serialize};

use crate::errors::TransportError;
use crate::session::SessionId;

/// Streaming chat endpoint.
pub const CHAT_STREAM_PATH: &str = "/chat/stream";
/// Streaming blog-operation endpoint.
pub const BLOG_STREAM_PATH: &str = "/blog/stream";

/// Optional hint telling the blog workflow which operation is wanted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlogOperation {
    Generate,
    Upload,
    List,
}

impl BlogOperation {
    /// Wire value of the hint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Upload => "upload",
            Self::List => "list",
        }
    }
}

impl std::str::FromStr for BlogOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generate" => Ok(Self::Generate),
            "upload" => Ok(Self::Upload),
            "list" => Ok(Self::List),
            other => Err(format!(
                "unknown blog operation `{other}` (expected generate, upload or list)"
            )),
        }
    }
}

/// One logical stream request. It is consumed by `StreamClient::open` and
/// not modified afterwards, across every retry.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamRequest {
    endpoint: String,
    message: String,
    session_id: Option<SessionId>,
    fields: serde_json::Map<String, serde_json::Value>,
}

impl StreamRequest {
    /// Creates a request for an arbitrary endpoint path or absolute URL.
    pub fn new(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            message: message.into(),
            session_id: None,
            fields: serde_json::Map::new(),
        }
    }

    /// Creates a request for the streaming chat endpoint.
    pub fn chat(message: impl Into<String>) -> Self {
        Self::new(CHAT_STREAM_PATH, message)
    }

    /// Creates a request for the streaming blog endpoint.
    pub fn blog(message: impl Into<String>) -> Self {
        Self::new(BLOG_STREAM_PATH, message)
    }

    /// Threads a known session id into the request. `None` leaves it unset.
    pub fn with_session(mut self, session_id: Option<SessionId>) -> Self {
        self.session_id = session_id;
        self
    }

    /// Adds the blog `operation_type` hint.
    pub fn operation(self, operation: BlogOperation) -> Self {
        self.field("operation_type", operation.as_str())
    }

    /// Adds an operation-specific body field.
    ///
    /// `message` and `session_id` cannot be overridden this way.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Endpoint path or absolute URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Message as given, before trimming.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Session id sent with the request, if any.
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Builds the JSON body: `{ message, session_id?, ..fields }`.
    pub fn wire_body(&self) -> Result<serde_json::Value, TransportError> {
        let message = self.message.trim();
        if message.is_empty() {
            return Err(TransportError::invalid_request("message must not be empty"));
        }

        let mut body = self.fields.clone();
        body.insert("message".into(), message.into());
        match &self.session_id {
            Some(id) => {
                body.insert("session_id".into(), id.as_str().into());
            }
            None => {
                body.remove("session_id");
            }
        }
        Ok(serde_json::Value::Object(body))
    }
}
