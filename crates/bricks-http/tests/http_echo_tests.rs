use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use bricks_http::prelude::*;

#[test]
fn fixed_length_body_round_trips_through_a_handler() {
    let router = Router::new();
    let _scope = router
        .register(
            "/",
            "POST",
            ArgCountMask::none(),
            Arc::new(|req, mut conn| {
                let body = req.body.unwrap_or_default();
                let mut reply = b"Data: ".to_vec();
                reply.extend_from_slice(&body);
                let _ = conn.send(HttpResponse::text(reply));
            }),
        )
        .unwrap();

    let server = TestServer::start(router);
    let response = server.client().post("/", "BODY");
    assert_eq!(response.status, 200);
    assert_eq!(response.text(), "Data: BODY");
}

#[test]
fn a_chunked_response_is_reassembled_by_the_client() {
    let router = Router::new();
    let _scope = router
        .register(
            "/stream",
            "GET",
            ArgCountMask::none(),
            Arc::new(|_req, mut conn| {
                let mut sender = conn.send_chunked(200, "text/plain", &[]).unwrap();
                sender.send(b"hello, ").unwrap();
                sender.send(b"world").unwrap();
                sender.finish().unwrap();
            }),
        )
        .unwrap();

    let server = TestServer::start(router);
    let response = server.client().get("/stream");
    assert_eq!(response.status, 200);
    assert_eq!(response.text(), "hello, world");
}

#[test]
fn a_post_without_content_length_is_rejected_with_411() {
    let router = Router::new();
    let _scope = router
        .register("/", "POST", ArgCountMask::none(), Arc::new(|_req, mut conn| {
            let _ = conn.send(HttpResponse::text("handler should not run"));
        }))
        .unwrap();
    let server = TestServer::start(router);

    // bricks_http::client always computes Content-Length, so drive this
    // edge case with a raw socket instead of going through the client.
    let port: u16 = server.url("").rsplit(':').next().unwrap().parse().unwrap();
    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream.write_all(b"POST / HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();
    let response = String::from_utf8_lossy(&response);
    assert!(response.starts_with("HTTP/1.1 411 "), "expected a 411 response, got: {response}");
}
