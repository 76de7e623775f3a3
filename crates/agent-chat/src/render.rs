use std::io::Write as _;

use agent_stream::{BlogReply, ChatReply, EventPayload, HealthStatus};

pub fn prompt() {
    eprint!("> ");
    let _ = std::io::stderr().flush();
}

pub fn print_progress(payload: &EventPayload) {
    let step = payload.step.as_deref().unwrap_or("working");
    let message = payload.message.as_deref().unwrap_or("");
    match payload.progress_fraction() {
        Some(fraction) => eprintln!("[{step} {:>3.0}%] {message}", fraction * 100.0),
        None => eprintln!("[{step}] {message}"),
    }
}

pub fn print_data(payload: &EventPayload) {
    let mut out = std::io::stdout().lock();
    if let Some(message) = &payload.message {
        let _ = write!(out, "{message}");
    }
    if let Some(data) = &payload.data {
        let _ = write!(out, "{}", pretty(data));
    }
    let _ = out.flush();
}

pub fn print_complete(payload: Option<&EventPayload>) {
    println!();
    if let Some(message) = payload.and_then(|p| p.message.as_deref()) {
        eprintln!("[done] {message}");
    }
}

pub fn print_chat_reply(reply: &ChatReply) {
    println!("{}", reply.message);
    eprintln!("session: {}", reply.session_id);
}

pub fn print_blog_reply(reply: &BlogReply) {
    println!("{}", reply.message);
    if let Some(operation) = &reply.operation_performed {
        eprintln!("operation: {operation}");
    }
    for file in reply.files_created.iter().flatten() {
        eprintln!("created: {file}");
    }
    eprintln!("session: {}", reply.session_id);
}

pub fn print_health(health: &HealthStatus) {
    println!(
        "{} ({})",
        health.status,
        health.service.as_deref().unwrap_or("unknown service")
    );
    for (name, compiled) in [
        ("chat graph", health.chat_graph_compiled),
        ("blog graph", health.blog_graph_compiled),
    ] {
        if let Some(compiled) = compiled {
            println!("  {name}: {}", if compiled { "compiled" } else { "not compiled" });
        }
    }
}

pub fn print_posts(posts: &[serde_json::Value]) {
    if posts.is_empty() {
        println!("no posts");
        return;
    }
    for post in posts {
        let title = post.get("title").and_then(|v| v.as_str()).unwrap_or("(untitled)");
        match post.get("directory_name").and_then(|v| v.as_str()) {
            Some(dir) => println!("{dir}  {title}"),
            None => println!("{title}"),
        }
    }
}

pub fn print_json(value: &serde_json::Value) {
    println!("{}", pretty(value));
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
