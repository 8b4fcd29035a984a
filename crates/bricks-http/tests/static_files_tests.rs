use std::fs;

use bricks_http::prelude::*;

fn scratch_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("bricks-http-static-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn a_directory_with_a_trailing_slash_serves_its_index() {
    let dir = scratch_dir("index");
    fs::write(dir.join("index.html"), "<h1>home</h1>").unwrap();
    fs::write(dir.join("notes.txt"), "plain text").unwrap();

    let router = Router::new();
    let _scope = serve_static_files_from(&router, "/static", &dir, StaticFileOptions::default()).unwrap();
    let server = TestServer::start(router);

    let index = server.client().get("/static/");
    assert_eq!(index.status, 200);
    assert_eq!(index.text(), "<h1>home</h1>");

    let file = server.client().get("/static/notes.txt");
    assert_eq!(file.status, 200);
    assert_eq!(file.text(), "plain text");

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn a_directory_without_a_trailing_slash_redirects() {
    let dir = scratch_dir("redirect");
    fs::write(dir.join("index.html"), "home").unwrap();

    let router = Router::new();
    let _scope = serve_static_files_from(&router, "/static", &dir, StaticFileOptions::default()).unwrap();
    let server = TestServer::start(router);

    let without_redirects = bricks_http::client::send(RequestOptions::new("GET", server.url("/static")));
    assert!(matches!(without_redirects, Err(HttpError::RedirectNotAllowed)));

    let followed = bricks_http::client::send(
        RequestOptions::new("GET", server.url("/static")).allow_redirects(),
    )
    .unwrap();
    assert_eq!(followed.code, 200);
    assert_eq!(String::from_utf8_lossy(&followed.body), "home");

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn registering_a_file_of_unknown_mime_type_fails() {
    let dir = scratch_dir("unknown-mime");
    fs::write(dir.join("data.bin"), [0u8, 1, 2]).unwrap();

    let router = Router::new();
    let result = serve_static_files_from(&router, "/static", &dir, StaticFileOptions::default());
    assert!(matches!(result, Err(HttpError::UnknownMimeType(_))));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn two_index_candidates_in_one_directory_fail_registration() {
    let dir = scratch_dir("double-index");
    fs::write(dir.join("index.html"), "a").unwrap();
    fs::write(dir.join("index.htm"), "b").unwrap();

    let router = Router::new();
    let result = serve_static_files_from(&router, "/static", &dir, StaticFileOptions::default());
    assert!(matches!(result, Err(HttpError::MoreThanOneIndexFile(_))));

    fs::remove_dir_all(&dir).ok();
}
