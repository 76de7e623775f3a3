//! Terminal front end for the agent backend.

mod render;

use std::error::Error;
use std::process::ExitCode;

use agent_stream::observability::init_observability;
use agent_stream::prelude::*;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tracing::debug;

#[derive(Parser)]
#[command(name = "agent-chat")]
#[command(about = "Chat with the AI agent backend from the terminal")]
#[command(
    long_about = "Streams replies from the agent backend's /chat/stream and /blog/stream \
endpoints. Progress and retry notices go to stderr, response text to stdout.\n\n\
Environment Variables:\n\
  AGENT_API_BASE_URL              Backend address (default http://localhost:8887)\n\
  AGENT_API_CONNECT_TIMEOUT_SECS  Connect timeout in seconds\n\
  AGENT_API_MAX_RETRIES           Connection retries before giving up\n\
  AGENT_CLIENT_LOG_LEVEL          Log filter (e.g. agent_stream=debug)\n\n\
Ctrl+C cancels the reply in flight."
)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Backend base URL, overrides AGENT_API_BASE_URL
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a chat message, or chat interactively when no message is given
    Chat {
        message: Option<String>,
        /// Continue an existing session
        #[arg(long)]
        session: Option<String>,
        /// Wait for the whole reply instead of streaming it
        #[arg(long)]
        no_stream: bool,
    },
    /// Run a blog workflow request
    Blog {
        message: String,
        #[arg(long)]
        session: Option<String>,
        /// Operation hint: generate, upload or list
        #[arg(long)]
        operation: Option<BlogOperation>,
        #[arg(long)]
        no_stream: bool,
    },
    /// Check backend health
    Health,
    /// List blog posts, or show one post
    Posts { directory: Option<String> },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_observability("warn");

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", error_line(err.as_ref()));
            ExitCode::FAILURE
        }
    }
}

/// User-facing one-line error report.
fn error_line(err: &dyn Error) -> String {
    format!("error: {err}")
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = args.base_url {
        config = config.base_url(base_url);
    }
    debug!(base_url = %config.base_url, "agent-chat starting");

    match args.command {
        Commands::Chat {
            message,
            session,
            no_stream,
        } => {
            let mut conversation = start_conversation(session);
            match message {
                Some(message) if no_stream => {
                    let reply = AgentApi::new(config)?
                        .chat(&message, conversation.session_id())
                        .await?;
                    render::print_chat_reply(&reply);
                }
                Some(message) => {
                    let client = StreamClient::new(config)?;
                    let request = conversation.chat_request(message);
                    stream(&client, request, &mut conversation).await?;
                }
                None => interactive(StreamClient::new(config)?, conversation).await?,
            }
        }
        Commands::Blog {
            message,
            session,
            operation,
            no_stream,
        } => {
            let mut conversation = start_conversation(session);
            if no_stream {
                let reply = AgentApi::new(config)?
                    .blog(&message, conversation.session_id(), operation)
                    .await?;
                render::print_blog_reply(&reply);
            } else {
                let client = StreamClient::new(config)?;
                let request = conversation.blog_request(message, operation);
                stream(&client, request, &mut conversation).await?;
            }
        }
        Commands::Health => {
            let health = AgentApi::new(config)?.health().await?;
            render::print_health(&health);
        }
        Commands::Posts { directory } => {
            let api = AgentApi::new(config)?;
            match directory {
                Some(directory) => render::print_json(&api.post(&directory).await?),
                None => render::print_posts(&api.list_posts().await?),
            }
        }
    }
    Ok(())
}

fn start_conversation(session: Option<String>) -> Conversation {
    match session {
        Some(id) => Conversation::resume(SessionId::new(id)),
        None => Conversation::new(),
    }
}

/// Reads stdin lines and streams one reply per line until EOF or `exit`.
async fn interactive(
    client: StreamClient,
    mut conversation: Conversation,
) -> Result<(), Box<dyn Error>> {
    eprintln!("Type a message and press Enter. `exit` or Ctrl+D quits.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        render::prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }
        let request = conversation.chat_request(line);
        if let Err(err) = stream(&client, request, &mut conversation).await {
            eprintln!("{}", error_line(err.as_ref()));
        }
    }
    Ok(())
}

/// Streams one request to the terminal. Ctrl+C cancels it.
async fn stream(
    client: &StreamClient,
    request: StreamRequest,
    conversation: &mut Conversation,
) -> Result<StreamState, Box<dyn Error>> {
    let (mut handle, mut events) = client.open_channel(request);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    let mut failure = None;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    StreamEvent::Progress(payload) => {
                        conversation.observe(&payload);
                        render::print_progress(&payload);
                    }
                    StreamEvent::Data(payload) => {
                        conversation.observe(&payload);
                        render::print_data(&payload);
                    }
                    StreamEvent::Complete(payload) => render::print_complete(payload.as_ref()),
                    StreamEvent::Error(err) => failure = Some(err),
                }
            }
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                handle.cancel();
            }
        }
    }

    let state = handle.finished().await;
    if state == StreamState::Cancelled {
        eprintln!("\n(cancelled)");
    }
    match failure {
        Some(err) => Err(err.into()),
        None => Ok(state),
    }
}
