#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::{TcpListener, TcpStream};

/// One request as seen by the test server.
#[derive(Clone, Debug)]
pub struct Captured {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Captured {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body is JSON")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Scripted reply for one connection.
#[derive(Clone, Debug)]
pub enum Reply {
    /// Plain response with a `Content-Length` body.
    Full {
        status: u16,
        content_type: &'static str,
        body: String,
    },
    /// Chunked response; each piece is written as its own chunk after `gap`.
    Chunked {
        pieces: Vec<Vec<u8>>,
        gap: Duration,
    },
    /// Chunked response that stops mid-body and drops the socket.
    Truncated { pieces: Vec<Vec<u8>> },
}

impl Reply {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self::Full {
            status,
            content_type: "application/json",
            body: body.to_string(),
        }
    }

    pub fn events<S: AsRef<str>>(pieces: &[S]) -> Self {
        Self::Chunked {
            pieces: pieces.iter().map(|p| p.as_ref().as_bytes().to_vec()).collect(),
            gap: Duration::from_millis(5),
        }
    }
}

pub struct TestServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Captured>>>,
}

impl TestServer {
    /// Serves `replies` in order, one per connection.
    pub async fn start(replies: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();
        tokio::spawn(async move {
            for reply in replies {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                serve(socket, reply, &seen).await;
            }
        });
        Self {
            base_url: format!("http://{addr}"),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<Captured> {
        self.requests.lock().expect("requests lock").clone()
    }
}

async fn serve(mut socket: TcpStream, reply: Reply, seen: &Mutex<Vec<Captured>>) {
    let Some(request) = read_request(&mut socket).await else {
        return;
    };
    seen.lock().expect("requests lock").push(request);

    match reply {
        Reply::Full {
            status,
            content_type,
            body,
        } => {
            let head = format!(
                "HTTP/1.1 {status} {}\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                reason(status),
                body.len()
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(body.as_bytes()).await;
        }
        Reply::Chunked { pieces, gap } => {
            write_chunked_head(&mut socket).await;
            for piece in pieces {
                write_chunk(&mut socket, &piece).await;
                tokio::time::sleep(gap).await;
            }
            let _ = socket.write_all(b"0\r\n\r\n").await;
        }
        Reply::Truncated { pieces } => {
            write_chunked_head(&mut socket).await;
            for piece in pieces {
                write_chunk(&mut socket, &piece).await;
            }
            // Promise a chunk that never arrives.
            let _ = socket.write_all(b"40\r\npartial").await;
        }
    }
    let _ = socket.flush().await;
    let _ = socket.shutdown().await;
}

async fn write_chunked_head(socket: &mut TcpStream) {
    let head = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\nconnection: close\r\n\r\n";
    let _ = socket.write_all(head.as_bytes()).await;
}

async fn write_chunk(socket: &mut TcpStream, piece: &[u8]) {
    let _ = socket
        .write_all(format!("{:x}\r\n", piece.len()).as_bytes())
        .await;
    let _ = socket.write_all(piece).await;
    let _ = socket.write_all(b"\r\n").await;
    let _ = socket.flush().await;
}

async fn read_request(socket: &mut TcpStream) -> Option<Captured> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut tmp).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&tmp[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut start = lines.next()?.split_whitespace();
    let method = start.next()?.to_string();
    let path = start.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();
    let length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[head_end..].to_vec();
    while body.len() < length {
        let n = socket.read(&mut tmp).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&tmp[..n]);
    }
    body.truncate(length);

    Some(Captured {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).to_string(),
    })
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

/// Formats one event line the way the backend writes it.
pub fn event_line(value: serde_json::Value) -> String {
    format!("data: {value}\n\n")
}
