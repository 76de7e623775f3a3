use std::fmt;

use crate::event::EventPayload;
use crate::request::{BlogOperation, StreamRequest};

/// Opaque conversation token assigned by the backend on the first response.
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps a backend-assigned id.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw id text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for ids the backend treats as missing (empty or whitespace).
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Caller-side state for one conversation panel.
///
/// The session id is set once, from the first response that carries one, and
/// then threaded into every later request. It is never overwritten.
#[derive(Clone, Debug, Default)]
pub struct Conversation {
    session_id: Option<SessionId>,
}

impl Conversation {
    /// Conversation with no session yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an already known session (for example one passed on the
    /// command line). A blank id starts a fresh conversation.
    pub fn resume(session_id: SessionId) -> Self {
        Self {
            session_id: Some(session_id).filter(|id| !id.is_blank()),
        }
    }

    /// Session id to send with the next request.
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Records `session_id` if none is known. Blank ids are ignored. Returns
    /// true when it was stored.
    pub fn capture(&mut self, session_id: SessionId) -> bool {
        if self.session_id.is_some() || session_id.is_blank() {
            return false;
        }
        self.session_id = Some(session_id);
        true
    }

    /// Captures the session id carried by an event payload, if any.
    pub fn observe(&mut self, payload: &EventPayload) -> bool {
        match &payload.session_id {
            Some(id) => self.capture(id.clone()),
            None => false,
        }
    }

    /// Builds a chat stream request carrying the known session id.
    pub fn chat_request(&self, message: impl Into<String>) -> StreamRequest {
        StreamRequest::chat(message).with_session(self.session_id.clone())
    }

    /// Builds a blog stream request carrying the known session id.
    pub fn blog_request(
        &self,
        message: impl Into<String>,
        operation: Option<BlogOperation>,
    ) -> StreamRequest {
        let request = StreamRequest::blog(message).with_session(self.session_id.clone());
        match operation {
            Some(operation) => request.operation(operation),
            None => request,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_session_wins_and_is_never_overwritten() {
        let mut conversation = Conversation::new();
        assert!(conversation.session_id().is_none());

        let mut first = EventPayload::with_message("hi");
        first.session_id = Some(SessionId::new("abc"));
        assert!(conversation.observe(&first));

        let mut second = EventPayload::default();
        second.session_id = Some(SessionId::new("other"));
        assert!(!conversation.observe(&second));
        assert!(!conversation.capture(SessionId::new("third")));

        assert_eq!(conversation.session_id().map(SessionId::as_str), Some("abc"));
    }

    #[test]
    fn blank_session_ids_are_never_captured() {
        let mut conversation = Conversation::new();
        let mut empty = EventPayload::default();
        empty.session_id = Some(SessionId::new(""));
        assert!(!conversation.observe(&empty));
        assert!(!conversation.capture(SessionId::new("  ")));

        let body = conversation.chat_request("hi").wire_body().expect("body");
        assert_eq!(body, serde_json::json!({ "message": "hi" }));

        let mut real = EventPayload::default();
        real.session_id = Some(SessionId::new("abc"));
        assert!(conversation.observe(&real));
        assert_eq!(conversation.session_id().map(SessionId::as_str), Some("abc"));

        assert!(Conversation::resume(SessionId::new("")).session_id().is_none());
    }

    #[test]
    fn requests_thread_the_known_session() {
        let fresh = Conversation::new().chat_request("hello");
        assert!(fresh.session_id().is_none());

        let resumed = Conversation::resume(SessionId::new("s-1"));
        let chat = resumed.chat_request("again");
        assert_eq!(chat.session_id(), Some(&SessionId::new("s-1")));
        assert_eq!(chat.endpoint(), crate::request::CHAT_STREAM_PATH);

        let blog = resumed.blog_request("list my posts", Some(BlogOperation::List));
        assert_eq!(blog.endpoint(), crate::request::BLOG_STREAM_PATH);
        let body = blog.wire_body().expect("body");
        assert_eq!(body["operation_type"], "list");
        assert_eq!(body["session_id"], "s-1");
    }
}
