//! Request/response endpoints of the agent backend.
//!
//! These are the non-streaming fallbacks for `/chat/stream` and
//! `/blog/stream`, plus health and blog listing. They are not retried.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClientConfig;
use crate::errors::{AgentError, TransportError};
use crate::request::BlogOperation;
use crate::session::SessionId;

pub const CHAT_PATH: &str = "/chat";
pub const BLOG_PATH: &str = "/blog";
pub const HEALTH_PATH: &str = "/health";
pub const BLOG_POSTS_PATH: &str = "/blog/posts";

#[derive(Clone, Debug, PartialEq, Serialize)]
struct MessageBody<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a SessionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    operation_type: Option<BlogOperation>,
}

/// Reply from `POST /chat`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub message: String,
    pub session_id: SessionId,
    #[serde(default = "default_status")]
    pub status: String,
}

/// Reply from `POST /blog`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogReply {
    pub message: String,
    pub session_id: SessionId,
    #[serde(default)]
    pub operation_performed: Option<String>,
    #[serde(default)]
    pub files_created: Option<Vec<String>>,
    #[serde(default = "default_status")]
    pub status: String,
}

/// Reply from `GET /health`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub chat_graph_compiled: Option<bool>,
    #[serde(default)]
    pub blog_graph_compiled: Option<bool>,
}

impl HealthStatus {
    /// True when the backend reports `healthy`.
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}

#[derive(Deserialize)]
struct PostList {
    #[serde(default)]
    posts: Vec<serde_json::Value>,
}

fn default_status() -> String {
    "success".to_string()
}

/// Client for the non-streaming endpoints.
#[derive(Clone)]
pub struct AgentApi {
    client: reqwest::Client,
    config: ClientConfig,
}

impl AgentApi {
    /// Builds the client with the config's connect and whole-request timeouts.
    pub fn new(config: ClientConfig) -> Result<Self, AgentError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Sends one chat message and waits for the whole reply.
    pub async fn chat(
        &self,
        message: &str,
        session_id: Option<&SessionId>,
    ) -> Result<ChatReply, AgentError> {
        let body = message_body(message, session_id, None)?;
        self.post_json(CHAT_PATH, &body).await
    }

    /// Runs one blog operation and waits for its result.
    pub async fn blog(
        &self,
        message: &str,
        session_id: Option<&SessionId>,
        operation: Option<BlogOperation>,
    ) -> Result<BlogReply, AgentError> {
        let body = message_body(message, session_id, operation)?;
        self.post_json(BLOG_PATH, &body).await
    }

    /// Checks backend health and graph compilation status.
    pub async fn health(&self) -> Result<HealthStatus, AgentError> {
        self.get_json(HEALTH_PATH).await
    }

    /// Lists generated blog posts.
    pub async fn list_posts(&self) -> Result<Vec<serde_json::Value>, AgentError> {
        let list: PostList = self.get_json(BLOG_POSTS_PATH).await?;
        Ok(list.posts)
    }

    /// Fetches one blog post by its directory name.
    pub async fn post(&self, directory_name: &str) -> Result<serde_json::Value, AgentError> {
        let name = directory_name.trim();
        if name.is_empty() || name.contains('/') {
            return Err(AgentError::Validation(format!(
                "invalid blog post directory name `{directory_name}`"
            )));
        }
        self.get_json(&format!("{BLOG_POSTS_PATH}/{name}")).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, AgentError>
    where
        B: Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let url = self.config.endpoint_url(path);
        debug!(url = %url, "POST");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&url, &e))?;
        decode_response(response).await
    }

    async fn get_json<T>(&self, path: &str) -> Result<T, AgentError>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = self.config.endpoint_url(path);
        debug!(url = %url, "GET");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&url, &e))?;
        decode_response(response).await
    }
}

fn message_body<'a>(
    message: &'a str,
    session_id: Option<&'a SessionId>,
    operation_type: Option<BlogOperation>,
) -> Result<MessageBody<'a>, AgentError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(AgentError::Validation("message must not be empty".into()));
    }
    Ok(MessageBody {
        message,
        session_id,
        operation_type,
    })
}

async fn decode_response<T>(response: reqwest::Response) -> Result<T, AgentError>
where
    T: serde::de::DeserializeOwned,
{
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| TransportError::read(e.to_string()))?;
    if !status.is_success() {
        return Err(TransportError::from_status(status.as_u16(), &text).into());
    }
    serde_json::from_str(&text).map_err(|e| AgentError::Decode(format!("{e} (body: {text})")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_body_trims_and_skips_missing_fields() {
        let body = message_body("  hi  ", None, None).expect("body");
        assert_eq!(
            serde_json::to_value(&body).expect("json"),
            serde_json::json!({ "message": "hi" })
        );

        let session = SessionId::new("abc");
        let body = message_body("post it", Some(&session), Some(BlogOperation::Upload))
            .expect("body");
        assert_eq!(
            serde_json::to_value(&body).expect("json"),
            serde_json::json!({ "message": "post it", "session_id": "abc", "operation_type": "upload" })
        );
    }

    #[test]
    fn blank_messages_are_rejected() {
        assert!(matches!(
            message_body(" \t", None, None),
            Err(AgentError::Validation(_))
        ));
    }

    #[test]
    fn replies_fill_in_optional_fields() {
        let reply: BlogReply = serde_json::from_str(
            r#"{"message":"done","session_id":"s","files_created":["a.md"]}"#,
        )
        .expect("reply");
        assert_eq!(reply.status, "success");
        assert_eq!(reply.operation_performed, None);
        assert_eq!(reply.files_created, Some(vec!["a.md".to_string()]));

        let health: HealthStatus = serde_json::from_str(
            r#"{"status":"healthy","service":"My AI Agent","chat_graph_compiled":true}"#,
        )
        .expect("health");
        assert!(health.is_healthy());
        assert_eq!(health.blog_graph_compiled, None);
    }

    #[tokio::test]
    async fn post_rejects_path_like_names_before_sending() {
        let api = AgentApi::new(ClientConfig::new("http://127.0.0.1:9")).expect("api");
        assert!(matches!(
            api.post("../etc").await,
            Err(AgentError::Validation(_))
        ));
        assert!(matches!(api.post("  ").await, Err(AgentError::Validation(_))));
    }
}
