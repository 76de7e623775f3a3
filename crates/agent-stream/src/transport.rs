use std::pin::Pin;

use bytes::Bytes;
use futures::StreamExt as _;
use tracing::debug;

use crate::config::ClientConfig;
use crate::errors::{AgentError, TransportError};

/// Response body as a stream of raw chunks.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<Bytes, TransportError>> + Send + 'static>>;

/// Connection collaborator used by `StreamClient`.
///
/// `open` performs one POST with a JSON body and resolves once a success
/// status has been received. Any failure before that point is returned as a
/// `TransportError`, which the client classifies for retry.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn open(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<ByteStream, TransportError>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Builds a client with a connect timeout and no whole-request timeout.
    pub fn new(config: &ClientConfig) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn open(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<ByteStream, TransportError> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TransportError::from_status(status.as_u16(), &body));
        }
        debug!(url, status = status.as_u16(), "stream connection established");

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::read(e.to_string())));
        Ok(Box::pin(stream))
    }
}
