#![allow(dead_code)]

//! Minimal HTTP/1.1 server standing in for the GitHub API. Each request is
//! recorded and answered by a routing closure.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Request target as sent, percent-encoding included.
    pub path: String,
    /// Header names lower-cased.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body is JSON")
    }
}

type Router = dyn Fn(&RecordedRequest) -> (u16, String) + Send + Sync;

pub struct StubGitHub {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    accept_loop: JoinHandle<()>,
}

impl StubGitHub {
    pub async fn start<F>(router: F) -> Self
    where
        F: Fn(&RecordedRequest) -> (u16, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
        let addr: SocketAddr = listener.local_addr().expect("stub address");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let router: Arc<Router> = Arc::new(router);

        let recorded = requests.clone();
        let accept_loop = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let router = router.clone();
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    let _ = serve_connection(stream, router, recorded).await;
                });
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
            accept_loop,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Drop for StubGitHub {
    fn drop(&mut self) {
        self.accept_loop.abort();
    }
}

async fn serve_connection(
    stream: TcpStream,
    router: Arc<Router>,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    // Keep-alive: serve requests until the client hangs up.
    loop {
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).await? == 0 {
            return Ok(());
        }
        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or_default().to_string();
        let path = parts.next().unwrap_or_default().to_string();

        let mut headers = Vec::new();
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await? == 0 {
                return Ok(());
            }
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                let name = name.trim().to_ascii_lowercase();
                let value = value.trim().to_string();
                if name == "content-length" {
                    content_length = value.parse().unwrap_or(0);
                }
                headers.push((name, value));
            }
        }

        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).await?;

        let request = RecordedRequest {
            method,
            path,
            headers,
            body: String::from_utf8_lossy(&body).into_owned(),
        };
        let (status, response_body) = router(&request);
        recorded.lock().unwrap().push(request);

        let response = format!(
            "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nx-ratelimit-remaining: 4999\r\n\r\n{response_body}",
            response_body.len()
        );
        write_half.write_all(response.as_bytes()).await?;
    }
}

pub fn not_found() -> (u16, String) {
    (
        404,
        r#"{"message":"Not Found","documentation_url":"https://docs.github.com/rest"}"#.to_string(),
    )
}

pub fn ok(body: &str) -> (u16, String) {
    (200, body.to_string())
}

/// Contents API body for a single file.
pub fn file_json(path: &str, sha: &str, content: Option<&str>) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    match content {
        Some(content) => serde_json::json!({
            "name": name, "path": path, "sha": sha, "size": content.len(),
            "type": "file", "encoding": "base64", "content": content,
        }),
        None => serde_json::json!({
            "name": name, "path": path, "sha": sha, "size": 5_000_000,
            "type": "file", "encoding": "none", "content": "",
        }),
    }
    .to_string()
}
