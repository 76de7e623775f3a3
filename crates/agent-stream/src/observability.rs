use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

const ENABLED_VAR: &str = "AGENT_CLIENT_OBSERVABILITY";
const LEVEL_VAR: &str = "AGENT_CLIENT_LOG_LEVEL";
const JSON_PATH_VAR: &str = "AGENT_CLIENT_JSON_LOG_PATH";
const DEFAULT_JSON_FILE: &str = "agent-client.logs.jsonl";

static INIT: OnceCell<()> = OnceCell::new();

/// Where log records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    /// Compact text on stderr, keeping stdout free for response text.
    Stderr,
    /// One JSON object per line, appended to `dir/file_name`.
    JsonFile { dir: PathBuf, file_name: String },
}

impl LogOutput {
    fn json_file(path: &Path) -> Self {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_JSON_FILE)
            .to_string();
        Self::JsonFile { dir, file_name }
    }
}

/// Logging settings resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub enabled: bool,
    /// Explicit filter directive; `RUST_LOG` and the default level apply when unset.
    pub filter: Option<String>,
    pub output: LogOutput,
}

impl LogSettings {
    /// Reads `AGENT_CLIENT_OBSERVABILITY`, `AGENT_CLIENT_LOG_LEVEL` and
    /// `AGENT_CLIENT_JSON_LOG_PATH`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = lookup(ENABLED_VAR)
            .map(|v| parse_bool_env(&v).unwrap_or(true))
            .unwrap_or(true);
        let filter = lookup(LEVEL_VAR).filter(|v| !v.trim().is_empty());
        let output = match lookup(JSON_PATH_VAR).filter(|v| !v.trim().is_empty()) {
            Some(path) => LogOutput::json_file(Path::new(path.trim())),
            None => LogOutput::Stderr,
        };
        Self {
            enabled,
            filter,
            output,
        }
    }

    fn env_filter(&self, default_level: &str) -> tracing_subscriber::EnvFilter {
        if let Some(directive) = &self.filter
            && let Ok(filter) = tracing_subscriber::EnvFilter::try_new(directive)
        {
            return filter;
        }
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level))
    }
}

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

/// Installs the global subscriber once per process from [`LogSettings::from_env`].
///
/// `default_level` applies when neither `AGENT_CLIENT_LOG_LEVEL` nor
/// `RUST_LOG` holds a usable filter. Later calls are no-ops.
pub fn init_observability(default_level: &str) {
    INIT.get_or_init(|| install(&LogSettings::from_env(), default_level));
}

fn install(settings: &LogSettings, default_level: &str) {
    if !settings.enabled {
        return;
    }
    let filter = settings.env_filter(default_level);
    let registry = tracing_subscriber::registry().with(filter);

    match &settings.output {
        LogOutput::Stderr => {
            let console = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            let _ = registry.with(console).try_init();
        }
        LogOutput::JsonFile { dir, file_name } => {
            let _ = std::fs::create_dir_all(dir);
            let json = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(tracing_appender::rolling::never(dir, file_name));
            let _ = registry.with(json).try_init();
        }
    }
}
