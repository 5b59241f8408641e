//! Throwaway HTTP/1.1 server for tests. Serves canned responses by request
//! path over a real socket so reqwest runs its normal code path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// How the body length is advertised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Correct `content-length`.
    Exact,
    /// No `content-length`; body ends at connection close.
    Omitted,
    /// Advertises more bytes than are sent, then closes.
    Truncated,
}

#[derive(Debug, Clone)]
pub struct Canned {
    pub status: String,
    pub body: Vec<u8>,
    pub framing: Framing,
}

impl Canned {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: "200 OK".to_string(),
            body: body.into(),
            framing: Framing::Exact,
        }
    }

    pub fn status(status: &str) -> Self {
        Self {
            status: status.to_string(),
            body: Vec::new(),
            framing: Framing::Exact,
        }
    }

    pub fn framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {}\r\nconnection: close\r\n", self.status);
        match self.framing {
            Framing::Exact => head.push_str(&format!("content-length: {}\r\n", self.body.len())),
            Framing::Omitted => {}
            Framing::Truncated => {
                head.push_str(&format!("content-length: {}\r\n", self.body.len() + 100))
            }
        }
        head.push_str("\r\n");
        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

pub struct TestServer {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Serve `routes` (path -> response) until the test runtime shuts down.
/// Unknown paths get a 404.
pub async fn serve(routes: Vec<(&str, Canned)>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes: Arc<HashMap<String, Canned>> = Arc::new(
        routes
            .into_iter()
            .map(|(path, canned)| (path.to_string(), canned))
            .collect(),
    );
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = hits.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let routes = routes.clone();
            let counter = counter.clone();
            tokio::spawn(async move {
                respond(socket, &routes, &counter).await;
            });
        }
    });

    TestServer {
        base_url: format!("http://{addr}"),
        hits,
    }
}

/// Serve one response at `/` and return its URL.
pub async fn serve_once(status_line: &str, body: &[u8]) -> String {
    let status = status_line.trim_start_matches("HTTP/1.1 ");
    let canned = Canned {
        status: status.to_string(),
        body: body.to_vec(),
        framing: Framing::Exact,
    };
    let server = serve(vec![("/", canned)]).await;
    server.url("/")
}

async fn respond(mut socket: TcpStream, routes: &HashMap<String, Canned>, hits: &AtomicUsize) {
    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        request.extend_from_slice(&chunk[..n]);
        if request.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    let text = String::from_utf8_lossy(&request);
    let path = text
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();

    hits.fetch_add(1, Ordering::SeqCst);
    let canned = routes
        .get(&path)
        .cloned()
        .unwrap_or_else(|| Canned::status("404 Not Found"));
    let _ = socket.write_all(&canned.to_bytes()).await;
    let _ = socket.shutdown().await;
}
