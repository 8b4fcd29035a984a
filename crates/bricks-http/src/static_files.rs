//! Static file serving: walk a directory once at registration time,
//! compute each file's MIME type from a closed table, and register one
//! router entry per file plus one per directory (for index resolution and
//! the trailing-slash redirect).

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::error::{HttpError, HttpResult};
use crate::request::HttpRequest;
use crate::response::HttpResponse;
use crate::router::{ArgCountMask, RouteScope, Router};
use crate::server::HttpServerConnection;

const DEFAULT_INDEX_NAMES: &[&str] = &["index.html", "index.htm"];

fn mime_for_filename(name: &str) -> Option<&'static str> {
    if name.ends_with(".js.map") || name.ends_with(".css.map") {
        return Some("application/json; charset=utf-8");
    }
    let ext = name.rsplit('.').next()?;
    match ext {
        "html" | "htm" => Some("text/html"),
        "txt" => Some("text/plain"),
        "css" => Some("text/css"),
        "js" => Some("application/javascript"),
        "json" => Some("application/json; charset=utf-8"),
        "png" => Some("image/png"),
        "ico" => Some("image/x-icon"),
        "foo" => Some("text/plain"),
        _ => None,
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

#[derive(Clone)]
pub struct StaticFileOptions {
    pub index_names: Vec<String>,
    pub public_prefix: Option<String>,
}

impl Default for StaticFileOptions {
    fn default() -> Self {
        StaticFileOptions {
            index_names: DEFAULT_INDEX_NAMES.iter().map(|s| s.to_string()).collect(),
            public_prefix: None,
        }
    }
}

fn redirect_target(options: &StaticFileOptions, url_path: &str) -> String {
    match &options.public_prefix {
        Some(prefix) => format!("{}{}/", prefix.trim_end_matches('/'), url_path),
        None => format!("{url_path}/"),
    }
}

fn file_handler(bytes: Arc<Vec<u8>>, mime: &'static str) -> crate::router::Handler {
    Arc::new(move |request: HttpRequest, mut conn: HttpServerConnection| {
        let method = request.method.to_ascii_uppercase();
        let response = HttpResponse::text(bytes.as_ref().clone()).content_type(mime);
        let result = if method == "HEAD" {
            conn.send_head_only(response)
        } else {
            conn.send(response)
        };
        let _ = result;
    })
}

fn directory_handler(index: Option<(Arc<Vec<u8>>, &'static str)>, options: StaticFileOptions) -> crate::router::Handler {
    Arc::new(move |request: HttpRequest, mut conn: HttpServerConnection| {
        let method = request.method.to_ascii_uppercase();
        if request.url_path_had_trailing_slash || request.url.path == "/" {
            match &index {
                Some((bytes, mime)) => {
                    let response = HttpResponse::text(bytes.as_ref().clone()).content_type(*mime);
                    let _ = if method == "HEAD" { conn.send_head_only(response) } else { conn.send(response) };
                }
                None => {
                    let _ = conn.send(HttpResponse::bare("<h1>NOT FOUND</h1>\n", 404));
                }
            }
        } else {
            let location = redirect_target(&options, &request.url.path);
            let response = HttpResponse::bare(Vec::new(), 302).set_header("Location", location);
            let _ = conn.send(response);
        }
    })
}

/// Register `dir` (and every subdirectory) under `url_prefix`. Returns a
/// single combined scope covering every route this registration created.
pub fn serve_static_files_from(
    router: &Router,
    url_prefix: &str,
    dir: impl AsRef<Path>,
    options: StaticFileOptions,
) -> HttpResult<RouteScope> {
    let mut scope = router.empty_scope();
    walk_directory(router, url_prefix, dir.as_ref(), &options, &mut scope)?;
    Ok(scope)
}

fn walk_directory(
    router: &Router,
    url_prefix: &str,
    dir: &Path,
    options: &StaticFileOptions,
    scope: &mut RouteScope,
) -> HttpResult<()> {
    let entries = fs::read_dir(dir).map_err(|_| HttpError::HandlerDoesNotExist)?;

    let mut index_candidate: Option<(Arc<Vec<u8>>, &'static str)> = None;
    let mut index_names_seen: Vec<String> = Vec::new();

    for entry in entries {
        let Ok(entry) = entry else { continue };
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if is_hidden(&file_name) {
            continue;
        }
        let file_type = entry.file_type().map_err(|_| HttpError::HandlerDoesNotExist)?;
        let child_path = entry.path();

        if file_type.is_dir() {
            let child_prefix = format!("{}/{}", url_prefix.trim_end_matches('/'), file_name);
            walk_directory(router, &child_prefix, &child_path, options, scope)?;
            continue;
        }

        let mime = mime_for_filename(&file_name).ok_or_else(|| HttpError::UnknownMimeType(file_name.clone()))?;
        let bytes = Arc::new(fs::read(&child_path).map_err(|_| HttpError::HandlerDoesNotExist)?);

        if options.index_names.iter().any(|n| n == &file_name) {
            index_names_seen.push(file_name.clone());
            if index_names_seen.len() > 1 {
                return Err(HttpError::MoreThanOneIndexFile(dir.display().to_string()));
            }
            index_candidate = Some((bytes.clone(), mime));
        }

        let file_url = format!("{}/{}", url_prefix.trim_end_matches('/'), file_name);
        let handler = file_handler(bytes, mime);
        let file_scope = router.register(&file_url, "GET", ArgCountMask::none(), handler.clone())?;
        *scope = std::mem::replace(scope, router.empty_scope()) + file_scope;
        let head_scope = router.register(&file_url, "HEAD", ArgCountMask::none(), handler)?;
        *scope = std::mem::replace(scope, router.empty_scope()) + head_scope;
    }

    let dir_handler = directory_handler(index_candidate, options.clone());
    let dir_url = if url_prefix.is_empty() { "/".to_string() } else { url_prefix.to_string() };
    let dir_scope = router.register(&dir_url, "GET", ArgCountMask::none(), dir_handler.clone())?;
    *scope = std::mem::replace(scope, router.empty_scope()) + dir_scope;
    let dir_head_scope = router.register(&dir_url, "HEAD", ArgCountMask::none(), dir_handler)?;
    *scope = std::mem::replace(scope, router.empty_scope()) + dir_head_scope;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions_map_to_their_mime_type() {
        assert_eq!(mime_for_filename("a.html"), Some("text/html"));
        assert_eq!(mime_for_filename("a.css.map"), Some("application/json; charset=utf-8"));
        assert_eq!(mime_for_filename("a.unknownext"), None);
    }

    #[test]
    fn hidden_names_are_recognized() {
        assert!(is_hidden(".hidden"));
        assert!(!is_hidden("visible.txt"));
    }

    #[test]
    fn serving_a_directory_tree_registers_routes_for_every_file() {
        let tmp = std::env::temp_dir().join(format!("bricks-static-test-{}", std::process::id()));
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("sub")).unwrap();
        fs::write(tmp.join("index.html"), "H1").unwrap();
        fs::write(tmp.join("file.txt"), "T").unwrap();
        fs::write(tmp.join("sub").join("index.html"), "S").unwrap();

        let router = Router::new();
        let _scope = serve_static_files_from(&router, "/static", &tmp, StaticFileOptions::default()).unwrap();

        let mut root = HttpRequest {
            method: "GET".to_string(),
            raw_path: "/static/".to_string(),
            url: crate::request::RequestUrl { path: "/static/".to_string(), query: Vec::new() },
            url_path_args: Vec::new(),
            url_path_had_trailing_slash: false,
            headers: crate::request::Headers::default(),
            cookies: Vec::new(),
            body: None,
        };
        match router.dispatch(&mut root) {
            crate::router::DispatchOutcome::Matched(_) => {}
            _ => panic!("expected the directory index route to match"),
        }

        fs::remove_dir_all(&tmp).ok();
    }
}
