//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves named routes (manifests, segments, whole files) with optional
//! failure injection, throttled bodies and `Range: bytes=` support. Every
//! request is counted per path. One request per connection.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Route {
    pub body: Vec<u8>,
    /// Answer the first `fail_first` requests with `failure_status`.
    pub fail_first: usize,
    pub failure_status: u16,
    /// Write the body in chunks of `chunk` bytes, sleeping `chunk_delay` between them.
    pub chunk: usize,
    pub chunk_delay: Option<Duration>,
}

impl Route {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            fail_first: 0,
            failure_status: 503,
            chunk: 16 * 1024,
            chunk_delay: None,
        }
    }

    /// Fails `times` times with `status`, then serves the body.
    pub fn failing(body: impl Into<Vec<u8>>, times: usize, status: u16) -> Self {
        Self {
            fail_first: times,
            failure_status: status,
            ..Self::ok(body)
        }
    }

    /// Serves the body slowly: `chunk` bytes every `delay`.
    pub fn slow(body: impl Into<Vec<u8>>, chunk: usize, delay: Duration) -> Self {
        Self {
            chunk: chunk.max(1),
            chunk_delay: Some(delay),
            ..Self::ok(body)
        }
    }

    pub fn status(status: u16) -> Self {
        Self::failing(Vec::new(), usize::MAX, status)
    }
}

#[derive(Default)]
struct Shared {
    routes: HashMap<String, Route>,
    hits: HashMap<String, usize>,
}

/// Handle to a running server. Routes may be added or replaced at any time.
#[derive(Clone)]
pub struct MediaServer {
    base: String,
    shared: Arc<Mutex<Shared>>,
}

impl MediaServer {
    /// Bind to an ephemeral port and serve until the process exits.
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let shared = Arc::new(Mutex::new(Shared::default()));
        let accept_shared = Arc::clone(&shared);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let shared = Arc::clone(&accept_shared);
                thread::spawn(move || handle(stream, &shared));
            }
        });
        Self {
            base: format!("http://127.0.0.1:{}", port),
            shared,
        }
    }

    /// Absolute URL for `path` (which starts with `/`).
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn route(&self, path: &str, route: Route) {
        self.shared
            .lock()
            .unwrap()
            .routes
            .insert(path.to_string(), route);
    }

    pub fn hits(&self, path: &str) -> usize {
        self.shared
            .lock()
            .unwrap()
            .hits
            .get(path)
            .copied()
            .unwrap_or(0)
    }
}

enum Reply {
    Status(u16),
    Body {
        body: Vec<u8>,
        range: Option<(u64, u64)>,
        chunk: usize,
        delay: Option<Duration>,
    },
}

fn handle(mut stream: TcpStream, shared: &Mutex<Shared>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let (method, path, range) = parse_request(request);
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }

    let reply = {
        let mut shared = shared.lock().unwrap();
        let hit = {
            let count = shared.hits.entry(path.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        match shared.routes.get(path) {
            None => Reply::Status(404),
            Some(route) if hit <= route.fail_first => Reply::Status(route.failure_status),
            Some(route) => Reply::Body {
                body: route.body.clone(),
                range,
                chunk: route.chunk,
                delay: route.chunk_delay,
            },
        }
    };

    match reply {
        Reply::Status(code) => {
            let response = format!(
                "HTTP/1.1 {} {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                code,
                reason(code)
            );
            let _ = stream.write_all(response.as_bytes());
        }
        Reply::Body {
            body,
            range,
            chunk,
            delay,
        } => {
            let total = body.len() as u64;
            let (status, slice) = match range {
                Some((start, end_incl)) if start < total => {
                    let end_excl = end_incl.saturating_add(1).min(total);
                    ("206 Partial Content", &body[start as usize..end_excl as usize])
                }
                Some(_) => {
                    let response = format!(
                        "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                        total
                    );
                    let _ = stream.write_all(response.as_bytes());
                    return;
                }
                None => ("200 OK", &body[..]),
            };
            let head = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nAccept-Ranges: bytes\r\nConnection: close\r\n\r\n",
                status,
                slice.len()
            );
            if stream.write_all(head.as_bytes()).is_err() {
                return;
            }
            for part in slice.chunks(chunk.max(1)) {
                if let Some(delay) = delay {
                    thread::sleep(delay);
                }
                // Client went away (cancelled transfer).
                if stream.write_all(part).is_err() {
                    return;
                }
            }
        }
    }
}

fn reason(code: u16) -> &'static str {
    match code {
        404 => "Not Found",
        408 => "Request Timeout",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Error",
    }
}

/// Returns (method, path, optional (start, end_inclusive) for `Range: bytes=X-Y`).
fn parse_request(request: &str) -> (&str, &str, Option<(u64, u64)>) {
    let mut lines = request.lines();
    let mut first = lines.next().unwrap_or("").split_whitespace();
    let method = first.next().unwrap_or("");
    let target = first.next().unwrap_or("/");
    let path = target.split('?').next().unwrap_or(target);
    let mut range = None;
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("range") {
            continue;
        }
        let Some(spec) = value.trim().strip_prefix("bytes=") else {
            continue;
        };
        if let Some((a, b)) = spec.split_once('-') {
            let start = a.trim().parse::<u64>().unwrap_or(0);
            let end = b.trim();
            let end_incl = if end.is_empty() {
                u64::MAX
            } else {
                end.parse::<u64>().unwrap_or(0)
            };
            range = Some((start, end_incl));
        }
    }
    (method, path, range)
}
