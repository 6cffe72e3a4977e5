//! In-process stand-in for the gateway admin API and login endpoint.
//!
//! [`MockGateway`] accepts HTTP/1.1 connections on a random local port,
//! answers each request from a table of canned [`MockRoute`]s and records
//! what it received. Every response carries `Connection: close`, so one
//! request is served per connection.
//!
//! ```no_run
//! # async fn example() {
//! use portier_client::ConsumerRegistryClient;
//! use portier_client::testing::{MockGateway, MockRoute};
//!
//! let gateway = MockGateway::start(vec![MockRoute::json(
//!     "GET",
//!     "/consumers",
//!     200,
//!     serde_json::json!({ "data": [], "next": null }),
//! )])
//! .await;
//! let client = ConsumerRegistryClient::new(gateway.base_url());
//! assert!(client.list_consumers().await.unwrap().is_empty());
//! assert_eq!(gateway.requests().len(), 1);
//! # }
//! ```

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// A canned response for one method and request target.
///
/// A `path` containing `?` must match the request target exactly; otherwise
/// the query string of the request is ignored. Exact matches win.
#[derive(Debug, Clone)]
pub struct MockRoute {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub body: String,
    pub headers: Vec<(String, String)>,
}

impl MockRoute {
    pub fn new(method: &str, path: &str, status: u16, body: impl Into<String>) -> Self {
        Self {
            method: method.to_owned(),
            path: path.to_owned(),
            status,
            body: body.into(),
            headers: Vec::new(),
        }
    }

    /// A route answering with a JSON body.
    pub fn json(method: &str, path: &str, status: u16, body: serde_json::Value) -> Self {
        Self::new(method, path, status, body.to_string())
            .with_header("Content-Type", "application/json")
    }

    /// Add a response header. May be repeated, e.g. for several `Set-Cookie`s.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    fn matches_exactly(&self, method: &str, target: &str) -> bool {
        self.method.eq_ignore_ascii_case(method) && self.path == target
    }

    fn matches_path(&self, method: &str, target: &str) -> bool {
        let path = target.split_once('?').map_or(target, |(p, _)| p);
        self.method.eq_ignore_ascii_case(method) && !self.path.contains('?') && self.path == path
    }
}

/// A request as received by the mock.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path and query, as sent on the request line.
    pub target: String,
    /// Header names are lowercased.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    /// First value of a header, by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The body parsed as JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body is not JSON")
    }
}

/// Mock gateway serving a fixed route table until dropped.
pub struct MockGateway {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: JoinHandle<()>,
}

impl MockGateway {
    /// Bind a random local port and serve `routes`.
    pub async fn start(routes: Vec<MockRoute>) -> Self {
        Self::start_with(|_| routes).await
    }

    /// Like [`start`](Self::start), but the routes are built from the base
    /// URL, for bodies that must link back to the mock (pagination `next`).
    pub async fn start_with(build: impl FnOnce(&str) -> Vec<MockRoute>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock gateway");
        let port = listener.local_addr().expect("mock gateway address").port();
        let base_url = format!("http://127.0.0.1:{port}");
        let routes = Arc::new(build(&base_url));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let routes = Arc::clone(&routes);
                let recorded = Arc::clone(&recorded);
                tokio::spawn(async move {
                    serve(stream, &routes, &recorded).await;
                });
            }
        });

        Self {
            base_url,
            requests,
            handle,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `base_url` joined with `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("mock request log poisoned").clone()
    }

    /// Requests whose method and path (query ignored) match.
    pub fn requests_to(&self, method: &str, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| {
                r.method.eq_ignore_ascii_case(method)
                    && r.target.split_once('?').map_or(r.target.as_str(), |(p, _)| p) == path
            })
            .collect()
    }
}

impl Drop for MockGateway {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(mut stream: TcpStream, routes: &[MockRoute], recorded: &Mutex<Vec<RecordedRequest>>) {
    let Some(request) = read_request(&mut stream).await else {
        return;
    };

    let route = routes
        .iter()
        .find(|r| r.matches_exactly(&request.method, &request.target))
        .or_else(|| {
            routes
                .iter()
                .find(|r| r.matches_path(&request.method, &request.target))
        });

    let (status, headers, body) = match route {
        Some(r) => (r.status, r.headers.clone(), r.body.clone()),
        None => (
            404,
            vec![("Content-Type".to_owned(), "application/json".to_owned())],
            r#"{"message":"Not found"}"#.to_owned(),
        ),
    };

    recorded
        .lock()
        .expect("mock request log poisoned")
        .push(request);

    let mut response = format!("HTTP/1.1 {status} {}\r\n", reason(status));
    for (name, value) in &headers {
        response.push_str(&format!("{name}: {value}\r\n"));
    }
    response.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    ));

    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// Read one request: the head up to the blank line, then `Content-Length`
/// bytes of body.
async fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_owned();
    let target = request_line.next()?.to_owned();

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(n, v)| (n.trim().to_ascii_lowercase(), v.trim().to_owned()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(n, _)| n == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let body_start = head_end + 4;
    while buf.len() < body_start + content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body_end = buf.len().min(body_start + content_length);
    let body = String::from_utf8_lossy(&buf[body_start..body_end]).into_owned();

    Some(RecordedRequest {
        method,
        target,
        headers,
        body,
    })
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        302 => "Found",
        400 => "Bad Request",
        404 => "Not Found",
        409 => "Conflict",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}
