//! A one-shot HTTP client: each request gets a fresh `Connection`, no
//! pooling or keep-alive reuse. Supports in-memory and file-backed
//! bodies/responses, optional redirect following with cycle detection, and
//! a streaming receive mode built on the same `ParseHooks` the server-side
//! parser uses.

use std::fs::File;
use std::io::{Read as _, Write as _};

use bricks_net::{client_connect, BlockingReadPolicy, Connection};

use crate::error::{HttpError, HttpResult};
use crate::request::{find_subslice, read_chunked_body, CollectBody, ParseHooks, StreamCursor};

const MAX_REDIRECTS: usize = 20;
const DEFAULT_INITIAL_BUFFER_SIZE: usize = 100;
const DEFAULT_BUFFER_GROWTH_FACTOR: f64 = 2.0;

/// A parsed HTTP response.
#[derive(Debug, Clone)]
pub struct ClientResponse {
    pub code: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ClientResponse {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v.as_str())
    }
}

/// The body a request carries, either already in memory or streamed from
/// a file — mirrors the original's `POSTFromFile` path without reading the
/// whole file up front.
pub enum RequestBody {
    None,
    Bytes(Vec<u8>),
    File(std::path::PathBuf),
}

/// One outgoing request. Build with `RequestOptions::new(method, url)` and
/// the fluent setters, then pass to [`send`] or [`send_streaming`].
pub struct RequestOptions {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    pub allow_redirects: bool,
}

impl RequestOptions {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        RequestOptions {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::None,
            allow_redirects: false,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = RequestBody::Bytes(body.into());
        self
    }

    pub fn body_from_file(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.body = RequestBody::File(path.into());
        self
    }

    pub fn allow_redirects(mut self) -> Self {
        self.allow_redirects = true;
        self
    }
}

pub fn get(url: impl Into<String>) -> HttpResult<ClientResponse> {
    send(RequestOptions::new("GET", url))
}

pub fn post(url: impl Into<String>, body: impl Into<Vec<u8>>) -> HttpResult<ClientResponse> {
    send(RequestOptions::new("POST", url).body(body))
}

pub fn put(url: impl Into<String>, body: impl Into<Vec<u8>>) -> HttpResult<ClientResponse> {
    send(RequestOptions::new("PUT", url).body(body))
}

pub fn delete(url: impl Into<String>) -> HttpResult<ClientResponse> {
    send(RequestOptions::new("DELETE", url))
}

struct ParsedUrl {
    host: String,
    port: u16,
    path: String,
}

fn parse_url(url: &str) -> HttpResult<ParsedUrl> {
    let rest = url.strip_prefix("http://").ok_or(HttpError::ConnectionClosedByPeer)?;
    let (authority, path) = match rest.find('/') {
        Some(i) => (&rest[..i], rest[i..].to_string()),
        None => (rest, "/".to_string()),
    };
    let (host, port) = match authority.rsplit_once(':') {
        Some((h, p)) => (h.to_string(), p.parse().unwrap_or(80)),
        None => (authority.to_string(), 80),
    };
    Ok(ParsedUrl { host, port, path })
}

fn build_request_bytes(method: &str, path: &str, host: &str, headers: &[(String, String)], body: &[u8]) -> Vec<u8> {
    let mut out = format!("{method} {path} HTTP/1.1\r\nHost: {host}\r\n");
    let has_content_length = headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-length"));
    for (k, v) in headers {
        out.push_str(&format!("{k}: {v}\r\n"));
    }
    if !has_content_length && !body.is_empty() {
        out.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    out.push_str("Connection: close\r\n\r\n");
    let mut bytes = out.into_bytes();
    bytes.extend_from_slice(body);
    bytes
}

/// Read and parse a status line + headers + body off a fresh connection,
/// invoking `hooks` the same way the server-side parser does.
fn read_response<H: ParseHooks>(conn: &mut Connection, hooks: &mut H) -> HttpResult<ClientResponse> {
    let mut buf = vec![0u8; DEFAULT_INITIAL_BUFFER_SIZE];
    let mut filled = 0usize;
    let header_end;
    loop {
        if filled == buf.len() {
            let grown = ((buf.len() as f64) * DEFAULT_BUFFER_GROWTH_FACTOR).ceil() as usize;
            buf.resize(grown.max(buf.len() + 1), 0);
        }
        let n = conn.blocking_read(&mut buf[filled..], BlockingReadPolicy::ReturnAsap)?;
        filled += n;
        if let Some(pos) = find_subslice(&buf[..filled], b"\r\n\r\n") {
            header_end = pos + 4;
            break;
        }
    }

    let header_block = &buf[..header_end - 4];
    let mut lines = header_block.split(|&b| b == b'\n').map(|l| {
        let l = if l.last() == Some(&b'\r') { &l[..l.len() - 1] } else { l };
        String::from_utf8_lossy(l).into_owned()
    });

    let status_line = lines.next().unwrap_or_default();
    let code: u16 = status_line.split_whitespace().nth(1).and_then(|c| c.parse().ok()).unwrap_or(0);

    let mut headers = Vec::new();
    let mut content_length: Option<usize> = None;
    let mut is_chunked = false;
    for line in lines {
        let Some(colon) = line.find(':') else { continue };
        let key = line[..colon].to_string();
        let value = line[colon + 1..].trim_matches(|c| c == ' ' || c == '\t').to_string();
        hooks.on_header(&key, &value);
        if key.eq_ignore_ascii_case("content-length") {
            content_length = value.parse().ok();
        } else if key.eq_ignore_ascii_case("transfer-encoding") {
            is_chunked = value.eq_ignore_ascii_case("chunked");
        }
        headers.push((key, value));
    }

    let leftover = buf[header_end..filled].to_vec();
    let body = if is_chunked {
        let mut cursor = StreamCursor::new(leftover, conn);
        let dummy_cfg = crate::config::ServerConfig { max_body_size: usize::MAX, ..Default::default() };
        read_chunked_body(&mut cursor, &dummy_cfg, hooks)?
    } else if let Some(len) = content_length {
        let mut cursor = StreamCursor::new(leftover, conn);
        let bytes = cursor.read_exact(len)?;
        hooks.on_chunk(&bytes);
        bytes
    } else {
        Vec::new()
    };
    hooks.on_chunked_body_done();

    Ok(ClientResponse { code, headers, body })
}

fn load_body(body: &RequestBody) -> HttpResult<Vec<u8>> {
    match body {
        RequestBody::None => Ok(Vec::new()),
        RequestBody::Bytes(b) => Ok(b.clone()),
        RequestBody::File(path) => {
            let mut f = File::open(path).map_err(|_| HttpError::ConnectionClosedByPeer)?;
            let mut out = Vec::new();
            f.read_to_end(&mut out).map_err(|_| HttpError::ConnectionClosedByPeer)?;
            Ok(out)
        }
    }
}

/// Send `options`, following redirects if `allow_redirects` is set.
/// Cycle detection walks the set of visited URLs, per the original.
pub fn send(options: RequestOptions) -> HttpResult<ClientResponse> {
    send_streaming(options, &mut CollectBody::default())
}

/// Same as [`send`], but lets the caller observe headers/chunks/lines as
/// they arrive via `hooks`, instead of only getting the reassembled body.
pub fn send_streaming<H: ParseHooks>(mut options: RequestOptions, hooks: &mut H) -> HttpResult<ClientResponse> {
    let mut visited: Vec<String> = Vec::new();
    let mut current_url = options.url.clone();
    let body_bytes = load_body(&options.body)?;

    loop {
        if visited.contains(&current_url) {
            return Err(HttpError::RedirectLoop(visited));
        }
        visited.push(current_url.clone());

        let parsed = parse_url(&current_url)?;
        let mut conn = client_connect(&parsed.host, parsed.port)?;
        let request_bytes = build_request_bytes(&options.method, &parsed.path, &parsed.host, &options.headers, &body_bytes);
        conn.blocking_write(&request_bytes, false)?;

        let response = read_response(&mut conn, hooks)?;

        if matches!(response.code, 301 | 302) {
            if !options.allow_redirects {
                return Err(HttpError::RedirectNotAllowed);
            }
            if visited.len() > MAX_REDIRECTS {
                return Err(HttpError::RedirectLoop(visited));
            }
            match response.header("location") {
                Some(location) => {
                    current_url = location.to_string();
                    options.method = "GET".to_string();
                    continue;
                }
                None => return Ok(response),
            }
        }
        return Ok(response);
    }
}

/// Write the response body to `path` instead of returning it in memory,
/// for large downloads. Headers are still collected and returned.
pub fn send_to_file(options: RequestOptions, path: impl AsRef<std::path::Path>) -> HttpResult<ClientResponse> {
    struct FileSink {
        file: std::fs::File,
        headers: Vec<(String, String)>,
    }
    impl ParseHooks for FileSink {
        fn on_header(&mut self, key: &str, value: &str) {
            self.headers.push((key.to_string(), value.to_string()));
        }
        fn on_chunk(&mut self, data: &[u8]) {
            let _ = self.file.write_all(data);
        }
    }

    let file = File::create(path.as_ref()).map_err(|_| HttpError::ConnectionClosedByPeer)?;
    let mut sink = FileSink { file, headers: Vec::new() };
    let response = send_streaming(options, &mut sink)?;
    Ok(ClientResponse { code: response.code, headers: response.headers, body: Vec::new() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_port_and_path() {
        let parsed = parse_url("http://example.com:8080/a/b").unwrap();
        assert_eq!(parsed.host, "example.com");
        assert_eq!(parsed.port, 8080);
        assert_eq!(parsed.path, "/a/b");
    }

    #[test]
    fn defaults_to_port_80_and_root_path() {
        let parsed = parse_url("http://example.com").unwrap();
        assert_eq!(parsed.port, 80);
        assert_eq!(parsed.path, "/");
    }

    #[test]
    fn request_bytes_include_a_computed_content_length() {
        let bytes = build_request_bytes("POST", "/", "h", &[], b"abcd");
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("Content-Length: 4"));
        assert!(text.ends_with("abcd"));
    }
}
