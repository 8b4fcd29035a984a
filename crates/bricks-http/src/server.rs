//! The blocking, thread-per-connection HTTP server: accept loop, the
//! per-connection response surface, and the default error pages a
//! connection gets when nothing else sends one.

use bricks_net::{Connection, Listener};

use crate::codes::reason_phrase;
use crate::config::ServerConfig;
use crate::error::{HttpError, HttpResult};
use crate::perf::cached_date_header;
use crate::request::{parse_request, CollectBody};
use crate::response::HttpResponse;
use crate::router::{DispatchOutcome, Router};

/// The per-connection response surface handed to a request handler. Owns
/// the connection outright — a handler (or a worker thread it moves this
/// onto) is the sole writer until it responds or drops. Dropping without a
/// response emits the default 500 page; this covers both an ordinary
/// early return and stack unwinding from a panic, since `Drop::drop` still
/// runs during unwind.
pub struct HttpServerConnection {
    conn: Connection,
    responded: bool,
}

impl HttpServerConnection {
    pub(crate) fn new(conn: Connection) -> Self {
        HttpServerConnection { conn, responded: false }
    }

    fn write_head(&mut self, code: u16, content_type: &str, extra_len: usize, connection: &str) -> String {
        let mut head = String::new();
        head.push_str(&format!("HTTP/1.1 {} {}\r\n", code, reason_phrase(code)));
        head.push_str(&format!("Date: {}\r\n", cached_date_header()));
        head.push_str(&format!("Content-Type: {}\r\n", content_type));
        head.push_str(&format!("Connection: {}\r\n", connection));
        if extra_len > 0 || connection == "close" {
            head.push_str(&format!("Content-Length: {}\r\n", extra_len));
        }
        head
    }

    /// Send a complete, fixed-length response. Fails if this connection has
    /// already responded (via this call or `send_chunked`).
    pub fn send(&mut self, response: HttpResponse) -> HttpResult<()> {
        self.send_impl(response, true)
    }

    /// Send the headers a full `send` would produce — including the real
    /// `Content-Length` — without writing the body. Used for `HEAD`.
    pub fn send_head_only(&mut self, response: HttpResponse) -> HttpResult<()> {
        self.send_impl(response, false)
    }

    fn send_impl(&mut self, response: HttpResponse, include_body: bool) -> HttpResult<()> {
        if self.responded {
            return Err(HttpError::AttemptedToSendResponseMoreThanOnce);
        }
        let (body, content_type) = response.render();
        let mut head = self.write_head(response.response_code(), &content_type, body.len(), "close");
        for (key, value) in response.headers() {
            head.push_str(&format!("{key}: {value}\r\n"));
        }
        for (name, value) in response.cookies() {
            head.push_str(&format!("Set-Cookie: {name}={value}\r\n"));
        }
        if response.cors_enabled() {
            head.push_str("Access-Control-Allow-Origin: *\r\n");
        }
        head.push_str("\r\n");
        self.responded = true;
        if include_body {
            self.conn.blocking_write_vectored(&[head.as_bytes(), &body])?;
        } else {
            self.conn.blocking_write(head.as_bytes(), false)?;
        }
        Ok(())
    }

    /// Begin a chunked response and return a sender for its body chunks.
    /// The borrow of `self.conn` a `ChunkedSender` holds makes it a compile
    /// error to call `send` again while one is alive; its `Drop` writes the
    /// terminating zero-length chunk if the caller didn't already.
    pub fn send_chunked(
        &mut self,
        code: u16,
        content_type: &str,
        extra_headers: &[(String, String)],
    ) -> HttpResult<ChunkedSender<'_>> {
        if self.responded {
            return Err(HttpError::AttemptedToSendResponseMoreThanOnce);
        }
        let mut head = self.write_head(code, content_type, 0, "keep-alive");
        head.push_str("Transfer-Encoding: chunked\r\n");
        for (key, value) in extra_headers {
            head.push_str(&format!("{key}: {value}\r\n"));
        }
        head.push_str("\r\n");
        self.responded = true;
        self.conn.blocking_write(head.as_bytes(), true)?;
        Ok(ChunkedSender { conn: &mut self.conn, closed: false })
    }
}

impl Drop for HttpServerConnection {
    fn drop(&mut self) {
        if !self.responded {
            let body = "<h1>INTERNAL SERVER ERROR</h1>\n";
            let head = format!(
                "HTTP/1.1 500 {}\r\nContent-Type: text/plain\r\nConnection: close\r\nContent-Length: {}\r\n\r\n",
                reason_phrase(500),
                body.len()
            );
            let _ = self.conn.blocking_write_vectored(&[head.as_bytes(), body.as_bytes()]);
        }
    }
}

/// A single chunked-response body sender. Each `send` call writes one
/// wire chunk; dropping without an explicit final chunk still terminates
/// the stream correctly.
pub struct ChunkedSender<'a> {
    conn: &'a mut Connection,
    closed: bool,
}

impl<'a> ChunkedSender<'a> {
    pub fn send(&mut self, bytes: &[u8]) -> HttpResult<()> {
        let size_line = format!("{:x}\r\n", bytes.len());
        self.conn.blocking_write_vectored(&[size_line.as_bytes(), bytes, b"\r\n"])?;
        Ok(())
    }

    pub fn finish(mut self) -> HttpResult<()> {
        self.conn.blocking_write(b"0\r\n\r\n", false)?;
        self.closed = true;
        Ok(())
    }
}

impl<'a> Drop for ChunkedSender<'a> {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.conn.blocking_write(b"0\r\n\r\n", false);
        }
    }
}

/// Run the accept loop forever: block on `listener.accept()`, spawn a
/// thread per connection, parse one request, dispatch it, and let the
/// matched handler (or the router's own 404/405, or a parse failure) emit
/// the response. A handler panic unwinds inside its own thread only —
/// `thread::spawn` stops it from taking down the process, and
/// `HttpServerConnection`'s `Drop` still fires during that unwind.
pub fn run(listener: Listener, router: Router, cfg: ServerConfig) -> ! {
    loop {
        match listener.accept() {
            Ok(conn) => {
                let router = router.clone();
                let cfg = cfg.clone();
                std::thread::spawn(move || serve_one(conn, &router, &cfg));
            }
            Err(e) => {
                tracing::error!(error = %e, "accept failed");
            }
        }
    }
}

fn serve_one(mut conn: Connection, router: &Router, cfg: &ServerConfig) {
    if let Some(timeout) = cfg.read_timeout {
        if let Err(e) = conn.set_read_timeout(Some(timeout)) {
            tracing::warn!(error = %e, "failed to set read timeout");
        }
    }

    let mut hooks = CollectBody::default();
    let parsed = parse_request(&mut conn, cfg, &mut hooks);
    let mut server_conn = HttpServerConnection::new(conn);

    let mut request = match parsed {
        Ok(request) => request,
        Err(e) => {
            let _ = server_conn.send(HttpResponse::bare(e.default_body(), e.status_code()));
            return;
        }
    };

    match router.dispatch(&mut request) {
        DispatchOutcome::Matched(handler) => handler(request, server_conn),
        DispatchOutcome::NotFound => {
            let _ = server_conn.send(HttpResponse::bare("<h1>NOT FOUND</h1>\n", 404));
        }
        DispatchOutcome::MethodNotAllowed => {
            let _ = server_conn.send(HttpResponse::bare("", 405));
        }
    }
}
