use std::time::Duration;

use crate::errors::AgentError;
use crate::policy::RetryPolicy;

/// Default backend address used by the agent server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8887";

/// Configuration shared by the streaming client and the non-streaming API.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the agent backend. Relative endpoints are resolved against it.
    pub base_url: String,
    /// Timeout for establishing a TCP/TLS connection.
    ///
    /// Streams have no whole-request timeout; a stalled stream ends only when
    /// the caller cancels it.
    pub connect_timeout: Duration,
    /// Whole-request timeout for the non-streaming endpoints.
    pub request_timeout: Duration,
    /// Connect-phase retry policy for streams.
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(120),
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a config for the given backend with default timeouts and retries.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Builds a config from the environment.
    ///
    /// - `AGENT_API_BASE_URL`: backend base URL (default `http://localhost:8887`).
    /// - `AGENT_API_CONNECT_TIMEOUT_SECS`: connect timeout in seconds.
    /// - `AGENT_API_MAX_RETRIES`: connect-phase retries for streams.
    pub fn from_env() -> Result<Self, AgentError> {
        let mut config = Self::default();
        if let Ok(base_url) = std::env::var("AGENT_API_BASE_URL")
            && !base_url.trim().is_empty()
        {
            config.base_url = base_url.trim().to_string();
        }
        if let Some(secs) = parse_env::<u64>("AGENT_API_CONNECT_TIMEOUT_SECS")? {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = parse_env::<u32>("AGENT_API_MAX_RETRIES")? {
            config.retry = config.retry.with_max_retries(retries);
        }
        config.validate()?;
        Ok(config)
    }

    /// Overrides the backend base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Overrides the whole-request timeout of the non-streaming API.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Overrides the stream retry policy.
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), AgentError> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(AgentError::Config("base_url must not be empty".into()));
        }
        if !is_absolute(base) {
            return Err(AgentError::Config(format!(
                "base_url must start with http:// or https:// (got `{base}`)"
            )));
        }
        Ok(())
    }

    /// Resolves an endpoint path against the base URL. Absolute URLs pass
    /// through unchanged.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        let endpoint = endpoint.trim();
        if is_absolute(endpoint) {
            return endpoint.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim().trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}

fn is_absolute(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, AgentError> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AgentError::Config(format!("invalid value for {key}: `{raw}`"))),
        _ => Ok(None),
    }
}
