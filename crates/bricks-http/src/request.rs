use std::collections::VecDeque;

use bricks_net::{BlockingReadPolicy, Connection};

use crate::config::ServerConfig;
use crate::error::{HttpError, HttpResult};

/// Header name used to recognize a method override after the request line
/// has already been parsed.
const METHOD_OVERRIDE_HEADER: &str = "x-http-method-override";
const CONTENT_LENGTH_HEADER: &str = "content-length";
const TRANSFER_ENCODING_HEADER: &str = "transfer-encoding";
const COOKIE_HEADER: &str = "cookie";
const CHUNKED_VALUE: &str = "chunked";

/// Case-insensitively indexed, insertion-ordered header collection.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// The decoded path and ordered query parameters of a request URL.
#[derive(Debug, Clone, Default)]
pub struct RequestUrl {
    pub path: String,
    pub query: Vec<(String, String)>,
}

/// A fully parsed HTTP/1.1 request. `url_path_args` and
/// `url_path_had_trailing_slash` start empty/false here and are filled in by
/// the router during dispatch (see `router.rs`), since they depend on which
/// registered prefix matched.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub raw_path: String,
    pub url: RequestUrl,
    pub url_path_args: Vec<String>,
    pub url_path_had_trailing_slash: bool,
    pub headers: Headers,
    pub cookies: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }
}

/// Subclass hooks for streaming consumers, matching the original parser's
/// per-header and per-chunk callback indirection.
pub trait ParseHooks {
    fn on_header(&mut self, _key: &str, _value: &str) {}
    fn on_chunk(&mut self, _data: &[u8]) {}
    fn on_chunked_body_done(&mut self) {}
    /// Chunk bytes re-split on `\n`, carrying a partial line across chunk
    /// boundaries — the supplemental `OnLine` hook (§10).
    fn on_line(&mut self, _line: &[u8]) {}
}

/// The callback-less default: reassemble chunks into one contiguous body.
#[derive(Default)]
pub struct CollectBody {
    body: Vec<u8>,
}

impl CollectBody {
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

impl ParseHooks for CollectBody {
    fn on_chunk(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
    }
}

fn decode_path_component(raw: &str) -> String {
    percent_encoding::percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

fn decode_query_component(raw: &str) -> String {
    let replaced = raw.replace('+', " ");
    percent_encoding::percent_decode_str(&replaced).decode_utf8_lossy().into_owned()
}

fn parse_url(raw_path: &str) -> RequestUrl {
    let (path_part, query_part) = match raw_path.find('?') {
        Some(i) => (&raw_path[..i], Some(&raw_path[i + 1..])),
        None => (raw_path, None),
    };
    let path = decode_path_component(path_part);
    let mut query = Vec::new();
    if let Some(q) = query_part {
        for pair in q.split('&') {
            if pair.is_empty() {
                continue;
            }
            let (k, v) = match pair.find('=') {
                Some(i) => (&pair[..i], &pair[i + 1..]),
                None => (pair, ""),
            };
            query.push((decode_query_component(k), decode_query_component(v)));
        }
    }
    RequestUrl { path, query }
}

fn parse_cookies(header_value: &str) -> Vec<(String, String)> {
    header_value
        .split(';')
        .filter_map(|pair| {
            let pair = pair.trim();
            if pair.is_empty() {
                return None;
            }
            match pair.find('=') {
                Some(i) => Some((pair[..i].trim().to_string(), pair[i + 1..].trim().to_string())),
                None => Some((pair.to_string(), String::new())),
            }
        })
        .collect()
}

pub(crate) fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Draws from already-buffered bytes first, then from the connection —
/// used once the header block has been located to read the body (fixed
/// length or chunked) without re-growing the header-scan buffer. Shared
/// between the server-side request parser and the client's response parser.
pub(crate) struct StreamCursor<'c> {
    leftover: VecDeque<u8>,
    conn: &'c mut Connection,
}

impl<'c> StreamCursor<'c> {
    pub(crate) fn new(leftover: Vec<u8>, conn: &'c mut Connection) -> Self {
        StreamCursor { leftover: leftover.into(), conn }
    }

    pub(crate) fn read_exact(&mut self, n: usize) -> HttpResult<Vec<u8>> {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            if let Some(b) = self.leftover.pop_front() {
                out.push(b);
                continue;
            }
            let want = (n - out.len()).min(8192);
            let mut tmp = vec![0u8; want];
            let read = self.conn.blocking_read(&mut tmp, BlockingReadPolicy::ReturnAsap)?;
            out.extend_from_slice(&tmp[..read]);
        }
        Ok(out)
    }

    pub(crate) fn read_crlf_line(&mut self) -> HttpResult<Vec<u8>> {
        let mut line = Vec::new();
        loop {
            let byte = self.read_exact(1)?[0];
            if byte == b'\n' {
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(line);
            }
            line.push(byte);
        }
    }
}

/// Read and parse one HTTP/1.1 request off `conn`.
pub fn parse_request<H: ParseHooks>(
    conn: &mut Connection,
    cfg: &ServerConfig,
    hooks: &mut H,
) -> HttpResult<HttpRequest> {
    let mut buf = vec![0u8; cfg.initial_buffer_size.max(16)];
    let mut filled = 0usize;
    let header_end;

    loop {
        if filled == buf.len() {
            let grown = ((buf.len() as f64) * cfg.buffer_growth_factor).ceil() as usize;
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

    let request_line = loop {
        match lines.next() {
            Some(l) if l.trim().is_empty() => continue,
            Some(l) => break l,
            None => return Err(HttpError::RequestBodyLengthNotProvided),
        }
    };
    let mut parts = request_line.splitn(3, ' ');
    let method = parts.next().unwrap_or("").to_string();
    let raw_path = parts.next().unwrap_or("/").to_string();

    let mut headers = Headers::default();
    let mut cookies = Vec::new();
    let mut content_length: Option<usize> = None;
    let mut is_chunked = false;
    let mut method_override: Option<String> = None;

    for line in lines {
        if line.is_empty() {
            continue;
        }
        let Some(colon) = line.find(':') else { continue };
        let key = line[..colon].to_string();
        let value = line[colon + 1..].trim_matches(|c| c == ' ' || c == '\t').to_string();
        hooks.on_header(&key, &value);

        if key.eq_ignore_ascii_case(CONTENT_LENGTH_HEADER) {
            content_length = value.parse().ok();
        } else if key.eq_ignore_ascii_case(TRANSFER_ENCODING_HEADER) {
            is_chunked = value.eq_ignore_ascii_case(CHUNKED_VALUE);
        } else if key.eq_ignore_ascii_case(METHOD_OVERRIDE_HEADER) {
            method_override = Some(value.clone());
        } else if key.eq_ignore_ascii_case(COOKIE_HEADER) {
            cookies.extend(parse_cookies(&value));
        }
        headers.push(key, value);
    }

    let method = method_override.unwrap_or(method);
    let url = parse_url(&raw_path);

    let leftover = buf[header_end..filled].to_vec();
    let body = if is_chunked {
        let mut cursor = StreamCursor::new(leftover, conn);
        Some(read_chunked_body(&mut cursor, cfg, hooks)?)
    } else if let Some(len) = content_length {
        if len > cfg.max_body_size {
            return Err(HttpError::PayloadTooLarge);
        }
        let mut cursor = StreamCursor::new(leftover, conn);
        let bytes = cursor.read_exact(len)?;
        hooks.on_chunk(&bytes);
        Some(bytes)
    } else {
        let method_upper = method.to_ascii_uppercase();
        if matches!(method_upper.as_str(), "POST" | "PUT" | "PATCH") {
            return Err(HttpError::RequestBodyLengthNotProvided);
        }
        None
    };

    Ok(HttpRequest {
        method,
        raw_path,
        url,
        url_path_args: Vec::new(),
        url_path_had_trailing_slash: false,
        headers,
        cookies,
        body,
    })
}

pub(crate) fn read_chunked_body<H: ParseHooks>(
    cursor: &mut StreamCursor<'_>,
    cfg: &ServerConfig,
    hooks: &mut H,
) -> HttpResult<Vec<u8>> {
    let mut body = Vec::new();
    let mut line_buf: Vec<u8> = Vec::new();
    loop {
        let size_line = cursor.read_crlf_line()?;
        let size_str = String::from_utf8_lossy(&size_line);
        let size_str = size_str.trim();
        let chunk_len = usize::from_str_radix(size_str, 16)
            .map_err(|_| HttpError::ChunkSizeNotAValidHex(size_str.to_string()))?;
        if chunk_len == 0 {
            // trailing CRLF after the zero-length chunk line
            let _ = cursor.read_crlf_line();
            break;
        }
        if body.len() + chunk_len > cfg.max_body_size {
            return Err(HttpError::PayloadTooLarge);
        }
        let chunk = cursor.read_exact(chunk_len)?;
        let _trailing_crlf = cursor.read_exact(2)?;
        hooks.on_chunk(&chunk);

        line_buf.extend_from_slice(&chunk);
        while let Some(pos) = line_buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = line_buf.drain(..=pos).collect();
            hooks.on_line(&line);
        }
        body.extend_from_slice(&chunk);
    }
    hooks.on_chunked_body_done();
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_plus_decodes_to_space() {
        let url = parse_url("/search?q=a+b%20c");
        assert_eq!(url.path, "/search");
        assert_eq!(url.query, vec![("q".to_string(), "a b c".to_string())]);
    }

    #[test]
    fn malformed_percent_escape_is_preserved() {
        let url = parse_url("/path%2");
        assert_eq!(url.path, "/path%2");
    }

    #[test]
    fn cookie_header_splits_on_semicolons() {
        let cookies = parse_cookies("a=1; b=2;c=3");
        assert_eq!(
            cookies,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
                ("c".to_string(), "3".to_string()),
            ]
        );
    }
}
