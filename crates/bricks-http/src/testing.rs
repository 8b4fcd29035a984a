//! In-process test scaffolding: a `TestServer` bound to an OS-assigned
//! port (via `bricks_net::reserve_local_port`, never a hardcoded one) with
//! its accept loop on a background thread, and a `TestClient` that talks
//! to it.

use bricks_net::{reserve_local_port, Listener};

use crate::client::{self, ClientResponse, RequestOptions};
use crate::config::ServerConfig;
use crate::router::Router;

/// A server spawned for the duration of a test. The accept loop runs on a
/// daemon-like background thread that is never joined — the process
/// exiting at the end of the test run reclaims it, the same tradeoff the
/// teacher's `TestApp` makes with its background task.
pub struct TestServer {
    base_url: String,
}

impl TestServer {
    /// Reserve a free port, start the accept loop, and return once the
    /// server is ready to accept connections.
    pub fn start(router: Router) -> Self {
        Self::start_with(router, ServerConfig::default())
    }

    pub fn start_with(router: Router, mut cfg: ServerConfig) -> Self {
        let reserved = reserve_local_port().expect("no free local port for test server");
        let port = reserved.port();
        let listener = Listener::from_reserved(reserved).expect("failed to start listening");
        cfg.port = port;

        std::thread::spawn(move || {
            crate::server::run(listener, router, cfg);
        });

        TestServer { base_url: format!("http://127.0.0.1:{port}") }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn client(&self) -> TestClient {
        TestClient { server: self }
    }
}

/// A thin wrapper over `bricks_http::client` that resolves paths against a
/// `TestServer`'s base URL.
pub struct TestClient<'s> {
    server: &'s TestServer,
}

impl<'s> TestClient<'s> {
    pub fn get(&self, path: &str) -> TestResponse {
        TestResponse::from(client::send(RequestOptions::new("GET", self.server.url(path))))
    }

    pub fn post(&self, path: &str, body: impl Into<Vec<u8>>) -> TestResponse {
        TestResponse::from(client::send(RequestOptions::new("POST", self.server.url(path)).body(body)))
    }

    pub fn post_json<T: serde::Serialize>(&self, path: &str, value: &T) -> TestResponse {
        let body = serde_json::to_vec(value).expect("serializable test body");
        TestResponse::from(
            client::send(RequestOptions::new("POST", self.server.url(path)).body(body).header("Content-Type", "application/json")),
        )
    }
}

/// A response captured for assertions, panicking eagerly on transport
/// failure so test bodies don't need to unwrap a `Result` themselves.
pub struct TestResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl TestResponse {
    fn from(result: crate::error::HttpResult<ClientResponse>) -> Self {
        let response = result.expect("test request failed");
        TestResponse { status: response.code, headers: response.headers, body: response.body }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::HttpResponse;
    use crate::router::ArgCountMask;
    use std::sync::Arc;

    #[test]
    fn round_trips_a_get_through_a_real_socket() {
        let router = Router::new();
        let _scope = router
            .register("/hello", "GET", ArgCountMask::none(), Arc::new(|_req, mut conn| {
                let _ = conn.send(HttpResponse::text("hi"));
            }))
            .unwrap();

        let server = TestServer::start(router);
        let response = server.client().get("/hello");
        assert_eq!(response.status, 200);
        assert_eq!(response.text(), "hi");
    }
}
