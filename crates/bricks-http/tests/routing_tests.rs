use std::sync::Arc;

use bricks_http::prelude::*;

#[test]
fn trailing_path_segments_reach_the_handler_as_url_path_args() {
    let router = Router::new();
    let _scope = router
        .register(
            "/user",
            "GET",
            ArgCountMask::one_of(&[1, 2]),
            Arc::new(|req, mut conn| {
                let _ = conn.send(HttpResponse::text(req.url_path_args.join(",")));
            }),
        )
        .unwrap();

    let server = TestServer::start(router);
    let response = server.client().get("/user/alice/42");
    assert_eq!(response.status, 200);
    assert_eq!(response.text(), "alice,42");
}

#[test]
fn an_unregistered_path_is_404() {
    let router = Router::new();
    let server = TestServer::start(router);
    let response = server.client().get("/nowhere");
    assert_eq!(response.status, 404);
}

#[test]
fn a_registered_path_with_the_wrong_method_is_405() {
    let router = Router::new();
    let _scope = router
        .register("/only-get", "GET", ArgCountMask::none(), Arc::new(|_req, mut conn| {
            let _ = conn.send(HttpResponse::text("hi"));
        }))
        .unwrap();

    let server = TestServer::start(router);
    let response = server.client().post("/only-get", Vec::new());
    assert_eq!(response.status, 405);
}

#[test]
fn a_more_specific_prefix_wins_over_a_catch_all_root() {
    let router = Router::new();
    let _user_scope = router
        .register("/user", "GET", ArgCountMask::one_of(&[1]), Arc::new(|req, mut conn| {
            let _ = conn.send(HttpResponse::text(format!("user:{}", req.url_path_args[0])));
        }))
        .unwrap();
    let _root_scope = router
        .register("/", "GET", ArgCountMask::any(), Arc::new(|_req, mut conn| {
            let _ = conn.send(HttpResponse::text("root"));
        }))
        .unwrap();

    let server = TestServer::start(router);
    assert_eq!(server.client().get("/user/7").text(), "user:7");
    assert_eq!(server.client().get("/user/7/8/9").text(), "root");
}
