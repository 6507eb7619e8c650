//! Minimal HTTP/1.1 fixture server for integration tests.
//!
//! Serves a fixed set of routes. Supports HEAD (optionally rejected with
//! 405), Range GET with 206 responses, chunked transfer encoding, and
//! per-piece write throttling so pause paths can be exercised mid-stream.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Body writes go out in pieces of this size (mirrors the client's chunk
/// size) so `delay_per_piece` throttles predictably.
const PIECE: usize = 8 * 1024;

#[derive(Clone)]
pub struct Route {
    pub body: Vec<u8>,
    pub content_type: String,
    pub head_allowed: bool,
    pub support_ranges: bool,
    /// Serve with `Transfer-Encoding: chunked` and no Content-Length.
    pub chunked: bool,
    pub delay_per_piece: Option<Duration>,
}

impl Route {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            content_type: "application/octet-stream".to_string(),
            head_allowed: true,
            support_ranges: true,
            chunked: false,
            delay_per_piece: None,
        }
    }

    pub fn content_type(mut self, ct: &str) -> Self {
        self.content_type = ct.to_string();
        self
    }

    pub fn reject_head(mut self) -> Self {
        self.head_allowed = false;
        self
    }

    pub fn without_ranges(mut self) -> Self {
        self.support_ranges = false;
        self
    }

    pub fn chunked(mut self) -> Self {
        self.chunked = true;
        self
    }

    pub fn throttled(mut self, delay: Duration) -> Self {
        self.delay_per_piece = Some(delay);
        self
    }
}

/// Start the server on an ephemeral port; returns the base URL
/// ("http://127.0.0.1:PORT"). Runs until the process exits.
pub fn start(routes: HashMap<String, Route>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind fixture server");
    let port = listener.local_addr().unwrap().port();
    let routes = Arc::new(routes);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let routes = Arc::clone(&routes);
            thread::spawn(move || handle(stream, &routes));
        }
    });
    format!("http://127.0.0.1:{}", port)
}

fn handle(mut stream: TcpStream, routes: &HashMap<String, Route>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
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

    let Some(route) = routes.get(&path) else {
        let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
        return;
    };

    if method.eq_ignore_ascii_case("HEAD") {
        respond_head(&mut stream, route);
        return;
    }
    if method.eq_ignore_ascii_case("GET") {
        respond_get(&mut stream, route, range);
    }
}

fn respond_head(stream: &mut TcpStream, route: &Route) {
    if !route.head_allowed {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }
    let mut response = String::from("HTTP/1.1 200 OK\r\n");
    if route.chunked {
        response.push_str("Transfer-Encoding: chunked\r\n");
    } else {
        response.push_str(&format!("Content-Length: {}\r\n", route.body.len()));
    }
    if route.support_ranges {
        response.push_str("Accept-Ranges: bytes\r\n");
    }
    response.push_str(&format!("Content-Type: {}\r\n\r\n", route.content_type));
    let _ = stream.write_all(response.as_bytes());
}

fn respond_get(stream: &mut TcpStream, route: &Route, range: Option<(u64, Option<u64>)>) {
    if route.chunked {
        respond_chunked(stream, route);
        return;
    }

    let total = route.body.len() as u64;
    let (status, headers, slice) = match range.filter(|_| route.support_ranges) {
        Some((start, end)) => {
            let start = start.min(total);
            let end_incl = end.unwrap_or(total.saturating_sub(1)).min(total.saturating_sub(1));
            if start > end_incl {
                (
                    "416 Range Not Satisfiable".to_string(),
                    format!("Content-Range: bytes */{}\r\nContent-Length: 0\r\n", total),
                    &route.body[0..0],
                )
            } else {
                let slice = &route.body[start as usize..=end_incl as usize];
                (
                    "206 Partial Content".to_string(),
                    format!(
                        "Content-Range: bytes {}-{}/{}\r\nContent-Length: {}\r\n",
                        start,
                        end_incl,
                        total,
                        slice.len()
                    ),
                    slice,
                )
            }
        }
        None => (
            "200 OK".to_string(),
            format!("Content-Length: {}\r\n", total),
            &route.body[..],
        ),
    };

    let accept_ranges = if route.support_ranges {
        "Accept-Ranges: bytes\r\n"
    } else {
        ""
    };
    let head = format!(
        "HTTP/1.1 {}\r\n{}{}Content-Type: {}\r\n\r\n",
        status, headers, accept_ranges, route.content_type
    );
    if stream.write_all(head.as_bytes()).is_err() {
        return;
    }
    write_throttled(stream, slice, route.delay_per_piece);
}

fn respond_chunked(stream: &mut TcpStream, route: &Route) {
    let accept_ranges = if route.support_ranges {
        "Accept-Ranges: bytes\r\n"
    } else {
        ""
    };
    let head = format!(
        "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n{}Content-Type: {}\r\n\r\n",
        accept_ranges, route.content_type
    );
    if stream.write_all(head.as_bytes()).is_err() {
        return;
    }
    for piece in route.body.chunks(PIECE) {
        let frame = format!("{:x}\r\n", piece.len());
        if stream.write_all(frame.as_bytes()).is_err()
            || stream.write_all(piece).is_err()
            || stream.write_all(b"\r\n").is_err()
        {
            return;
        }
        if let Some(delay) = route.delay_per_piece {
            thread::sleep(delay);
        }
    }
    let _ = stream.write_all(b"0\r\n\r\n");
}

fn write_throttled(stream: &mut TcpStream, body: &[u8], delay: Option<Duration>) {
    for piece in body.chunks(PIECE) {
        if stream.write_all(piece).is_err() {
            return;
        }
        let _ = stream.flush();
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
    }
}

/// Returns (method, path, range) where range is (start, Some(end)|None).
fn parse_request(request: &str) -> (String, String, Option<(u64, Option<u64>)>) {
    let mut method = String::new();
    let mut path = String::new();
    let mut range = None;

    for (i, line) in request.lines().enumerate() {
        if i == 0 {
            let mut parts = line.split_whitespace();
            method = parts.next().unwrap_or("").to_string();
            path = parts.next().unwrap_or("/").to_string();
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("range") {
            // "bytes=N-" or "bytes=N-M"
            if let Some(spec) = value.trim().strip_prefix("bytes=") {
                let (start, end) = spec.split_once('-').unwrap_or((spec, ""));
                let start = start.trim().parse::<u64>().unwrap_or(0);
                let end = end.trim().parse::<u64>().ok();
                range = Some((start, end));
            }
        }
    }
    (method, path, range)
}
