use crate::event::EventPayload;

/// Errors raised while establishing a stream connection or reading its body.
///
/// Only the connect phase consults [`TransportError::is_retryable`]; once bytes
/// are flowing every read failure is terminal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No response was received (DNS, refused connection, reset, ...).
    #[error("no response from {url}: {message}")]
    Unreachable { url: String, message: String },
    /// The request was aborted before a response arrived (timeouts included).
    #[error("request aborted: {message}")]
    Aborted { message: String },
    /// The backend answered with a 5xx status.
    #[error("server error (HTTP {status}): {detail}")]
    Server { status: u16, detail: String },
    /// The backend answered with any other non-success status.
    #[error("request rejected (HTTP {status}): {detail}")]
    Rejected { status: u16, detail: String },
    /// The request could not be built or serialized.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
    /// Reading the response body failed after the stream was established.
    #[error("stream read failed: {message}")]
    Read { message: String },
}

impl TransportError {
    /// Creates an unreachable-backend error.
    pub fn unreachable(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unreachable {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates an aborted-request error.
    pub fn aborted(message: impl Into<String>) -> Self {
        Self::Aborted {
            message: message.into(),
        }
    }

    /// Creates an invalid-request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a body read error.
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read {
            message: message.into(),
        }
    }

    /// Classifies a non-success HTTP status and its response body.
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = extract_error_detail(body);
        if (500..600).contains(&status) {
            Self::Server { status, detail }
        } else {
            Self::Rejected { status, detail }
        }
    }

    /// Maps a reqwest failure that happened before a response was received.
    pub(crate) fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::aborted(err.to_string())
        } else if err.is_builder() {
            Self::invalid_request(err.to_string())
        } else {
            Self::unreachable(url, err.to_string())
        }
    }

    /// Returns true when a connect-phase failure may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unreachable { .. } | Self::Aborted { .. } | Self::Server { .. }
        )
    }

    /// Returns the HTTP status for status-class failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } | Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A single event line that could not be decoded.
///
/// Recovered locally: the line is logged and skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed event line ({reason}): {line}")]
pub struct ProtocolError {
    pub reason: String,
    pub line: String,
}

impl ProtocolError {
    pub(crate) fn new(reason: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            line: line.into(),
        }
    }
}

/// Terminal failure handed to `StreamCallbacks::on_error`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StreamFailure {
    /// Connect-phase network failure that was not retried.
    #[error("connection failed: {message}")]
    Transport { message: String },
    /// Connect-phase 5xx that was not retried.
    #[error("server error (HTTP {status}): {detail}")]
    Server { status: u16, detail: String },
    /// Non-retryable status (4xx and other non-success codes).
    #[error("request rejected (HTTP {status}): {detail}")]
    Rejected { status: u16, detail: String },
    /// The request itself was unusable.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
    /// The backend sent an explicit `error` event.
    #[error("{message}")]
    Application {
        message: String,
        payload: EventPayload,
    },
    /// Every allowed retry failed.
    #[error("connection failed after {attempts} retry attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
    /// The body stream broke after streaming had begun.
    #[error("connection interrupted: {message}")]
    Interrupted { message: String },
}

impl StreamFailure {
    pub(crate) fn application(payload: EventPayload) -> Self {
        let message = payload
            .message
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "backend reported an error".to_string());
        Self::Application { message, payload }
    }
}

impl From<TransportError> for StreamFailure {
    fn from(value: TransportError) -> Self {
        match value {
            TransportError::Unreachable { .. } | TransportError::Aborted { .. } => {
                Self::Transport {
                    message: value.to_string(),
                }
            }
            TransportError::Server { status, detail } => Self::Server { status, detail },
            TransportError::Rejected { status, detail } => Self::Rejected { status, detail },
            TransportError::InvalidRequest { message } => Self::InvalidRequest { message },
            TransportError::Read { message } => Self::Interrupted { message },
        }
    }
}

/// Top-level error type for configuration and the non-streaming API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid caller input.
    #[error("validation error: {0}")]
    Validation(String),
    /// Request could not be delivered.
    #[error(transparent)]
    Transport(TransportError),
    /// Backend answered with a non-success status.
    #[error("HTTP {status}: {detail}")]
    Http { status: u16, detail: String },
    /// Backend answered with a body that does not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<TransportError> for AgentError {
    fn from(value: TransportError) -> Self {
        match value {
            TransportError::Server { status, detail }
            | TransportError::Rejected { status, detail } => Self::Http { status, detail },
            other => Self::Transport(other),
        }
    }
}

/// Pulls a human-readable detail out of an error response body.
///
/// Understands FastAPI's `{"detail": ...}`, `{"error": {"message": ...}}`,
/// `{"error": "..."}` and `{"message": ...}`; falls back to the trimmed body.
pub(crate) fn extract_error_detail(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) else {
        return trimmed.to_string();
    };

    let summary = value
        .get("detail")
        .and_then(|v| match v {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        })
        .or_else(|| {
            value
                .pointer("/error/message")
                .and_then(|v| v.as_str())
                .map(str::to_owned)
        })
        .or_else(|| value.get("error").and_then(|v| v.as_str()).map(str::to_owned))
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str())
                .map(str::to_owned)
        });

    match summary {
        Some(text) => text.split_whitespace().collect::<Vec<_>>().join(" "),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes_split_into_server_and_rejected() {
        let server = TransportError::from_status(503, r#"{"detail":"graph unavailable"}"#);
        assert!(server.is_retryable());
        assert_eq!(
            server,
            TransportError::Server {
                status: 503,
                detail: "graph unavailable".into()
            }
        );

        let rejected = TransportError::from_status(422, r#"{"detail":[{"msg":"field required"}]}"#);
        assert!(!rejected.is_retryable());
        assert_eq!(rejected.status(), Some(422));
        assert!(rejected.to_string().contains("field required"));
    }

    #[test]
    fn transport_failures_are_retryable_but_reads_and_bad_requests_are_not() {
        assert!(TransportError::unreachable("http://x", "refused").is_retryable());
        assert!(TransportError::aborted("timed out").is_retryable());
        assert!(!TransportError::invalid_request("empty message").is_retryable());
        assert!(!TransportError::read("reset").is_retryable());
    }

    #[test]
    fn error_detail_prefers_known_fields_and_falls_back_to_text() {
        assert_eq!(
            extract_error_detail(r#"{"error":{"message":"model   overloaded"}}"#),
            "model overloaded"
        );
        assert_eq!(extract_error_detail(r#"{"error":"nope"}"#), "nope");
        assert_eq!(extract_error_detail(r#"{"message":"busy"}"#), "busy");
        assert_eq!(extract_error_detail("  Bad Gateway \n"), "Bad Gateway");
        assert_eq!(extract_error_detail(""), "<empty body>");
        assert_eq!(extract_error_detail(r#"{"status":"failed"}"#), r#"{"status":"failed"}"#);
    }

    #[test]
    fn read_failures_become_interruptions() {
        let failure: StreamFailure = TransportError::read("connection reset").into();
        assert_eq!(
            failure,
            StreamFailure::Interrupted {
                message: "connection reset".into()
            }
        );
    }

    #[test]
    fn status_errors_map_to_http_agent_errors() {
        let err: AgentError = TransportError::from_status(404, r#"{"detail":"Not Found"}"#).into();
        assert_eq!(
            err,
            AgentError::Http {
                status: 404,
                detail: "Not Found".into()
            }
        );
    }
}
