use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::HttpError;
use crate::request::HttpRequest;
use crate::server::HttpServerConnection;

/// A request handler. Takes ownership of the request and the server
/// connection so it can respond inline or move both onto a worker thread
/// and respond later — the request and connection are otherwise unused
/// once handed over, mirroring the source's move-only request semantics.
pub type Handler = Arc<dyn Fn(HttpRequest, HttpServerConnection) + Send + Sync>;

/// Which trailing path-segment counts a registration accepts. Bit `i` means
/// "exactly `i` trailing segments are accepted"; a dedicated `ANY` bit means
/// every count is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgCountMask(u32);

const ANY_BIT: u32 = 1 << 31;
const MAX_EXACT_COUNT: usize = 30;

impl ArgCountMask {
    pub fn exact(n: usize) -> Self {
        assert!(n <= MAX_EXACT_COUNT, "arg count {n} out of supported range");
        ArgCountMask(1 << n)
    }

    pub fn none() -> Self {
        Self::exact(0)
    }

    pub fn one_of(counts: &[usize]) -> Self {
        counts.iter().fold(ArgCountMask(0), |acc, &n| ArgCountMask(acc.0 | (1 << n)))
    }

    pub fn any() -> Self {
        ArgCountMask(ANY_BIT)
    }

    pub fn admits(&self, n: usize) -> bool {
        if self.0 & ANY_BIT != 0 {
            return true;
        }
        n <= MAX_EXACT_COUNT && (self.0 & (1 << n)) != 0
    }

    fn overlaps(&self, other: ArgCountMask) -> bool {
        if self.0 & ANY_BIT != 0 || other.0 & ANY_BIT != 0 {
            return true;
        }
        self.0 & other.0 != 0
    }
}

struct RouteEntry {
    id: u64,
    mask: ArgCountMask,
    handler: Handler,
}

#[derive(Default)]
struct RouterInner {
    // prefix -> method -> entries
    routes: HashMap<String, HashMap<String, Vec<RouteEntry>>>,
    next_id: u64,
}

/// The mutex-protected route table. Shared process-wide per server instance
/// (tests construct a fresh one each).
#[derive(Clone, Default)]
pub struct Router {
    inner: Arc<Mutex<RouterInner>>,
}

/// Outcome of matching a request against the table; see §4.G step 3.
pub enum DispatchOutcome {
    Matched(Handler),
    NotFound,
    MethodNotAllowed,
}

fn validate_prefix(prefix: &str) -> Result<(), HttpError> {
    if !prefix.starts_with('/') {
        return Err(HttpError::PathDoesNotStartWithSlash(prefix.to_string()));
    }
    if prefix.len() > 1 && prefix.ends_with('/') {
        return Err(HttpError::PathEndsWithSlash(prefix.to_string()));
    }
    if prefix.contains(['{', '}']) {
        return Err(HttpError::PathContainsInvalidCharacters(prefix.to_string()));
    }
    Ok(())
}

fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

impl Router {
    pub fn new() -> Self {
        Router::default()
    }

    /// A scope holding no registrations, for callers that build up a bundle
    /// with repeated `scope = scope + router.register(...)?`.
    pub fn empty_scope(&self) -> RouteScope {
        RouteScope { router: self.inner.clone(), ids: Vec::new() }
    }

    /// Register `handler` at `(prefix, method, mask)`. Returns an RAII scope
    /// that unregisters the route when dropped.
    pub fn register(
        &self,
        prefix: &str,
        method: &str,
        mask: ArgCountMask,
        handler: Handler,
    ) -> Result<RouteScope, HttpError> {
        validate_prefix(prefix)?;
        let method = method.to_ascii_uppercase();
        let mut inner = self.inner.lock().unwrap();

        if let Some(methods) = inner.routes.get(prefix) {
            if let Some(entries) = methods.get(&method) {
                if entries.iter().any(|e| e.mask.overlaps(mask)) {
                    return Err(HttpError::HandlerAlreadyExists);
                }
            }
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner
            .routes
            .entry(prefix.to_string())
            .or_default()
            .entry(method.clone())
            .or_default()
            .push(RouteEntry { id, mask, handler });

        Ok(RouteScope { router: self.inner.clone(), ids: vec![(prefix.to_string(), method, id)] })
    }

    /// Find the handler for `request`, filling in its `url_path_args` and
    /// `url_path_had_trailing_slash` fields on a match.
    pub fn dispatch(&self, request: &mut HttpRequest) -> DispatchOutcome {
        let had_trailing_slash = request.url.path.len() > 1 && request.url.path.ends_with('/');
        let trimmed = request.url.path.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed };
        let segments = split_segments(trimmed);
        let method = request.method.to_ascii_uppercase();

        let inner = self.inner.lock().unwrap();
        for split in (0..=segments.len()).rev() {
            let prefix = if split == 0 { "/".to_string() } else { format!("/{}", segments[..split].join("/")) };
            let Some(methods) = inner.routes.get(&prefix) else { continue };
            let remaining = segments.len() - split;
            let any_admits = methods.values().any(|entries| entries.iter().any(|e| e.mask.admits(remaining)));
            if !any_admits {
                continue;
            }

            return match methods.get(&method).and_then(|entries| entries.iter().find(|e| e.mask.admits(remaining))) {
                Some(entry) => {
                    request.url_path_args = segments[split..].iter().map(|s| s.to_string()).collect();
                    request.url_path_had_trailing_slash = had_trailing_slash;
                    DispatchOutcome::Matched(entry.handler.clone())
                }
                None => DispatchOutcome::MethodNotAllowed,
            };
        }
        DispatchOutcome::NotFound
    }
}

/// RAII handle for one or more registrations. Dropping it (or calling
/// nothing at all — `Drop` does the work) unregisters every route it holds.
/// Combine two scopes with `+` to manage them as one bundle.
pub struct RouteScope {
    router: Arc<Mutex<RouterInner>>,
    ids: Vec<(String, String, u64)>,
}

impl Drop for RouteScope {
    fn drop(&mut self) {
        let mut inner = self.router.lock().unwrap();
        for (prefix, method, id) in &self.ids {
            if let Some(methods) = inner.routes.get_mut(prefix) {
                if let Some(entries) = methods.get_mut(method) {
                    entries.retain(|e| e.id != *id);
                }
                if methods.get(method).is_some_and(Vec::is_empty) {
                    methods.remove(method);
                }
            }
        }
    }
}

impl std::ops::Add for RouteScope {
    type Output = RouteScope;

    fn add(mut self, mut other: RouteScope) -> RouteScope {
        assert!(Arc::ptr_eq(&self.router, &other.router), "cannot combine scopes from different routers");
        self.ids.append(&mut other.ids);
        // `other`'s ids are now owned by `self`; clear so its Drop is a no-op.
        other.ids.clear();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{Headers, RequestUrl};

    fn dummy_request(method: &str, path: &str) -> HttpRequest {
        HttpRequest {
            method: method.to_string(),
            raw_path: path.to_string(),
            url: RequestUrl { path: path.to_string(), query: Vec::new() },
            url_path_args: Vec::new(),
            url_path_had_trailing_slash: false,
            headers: Headers::default(),
            cookies: Vec::new(),
            body: None,
        }
    }

    fn noop_handler() -> Handler {
        Arc::new(|_req, _conn| {})
    }

    #[test]
    fn path_args_and_trailing_slash_are_captured() {
        let router = Router::new();
        let _scope = router.register("/user", "GET", ArgCountMask::one_of(&[1, 2]), noop_handler()).unwrap();

        let mut req = dummy_request("GET", "/user/a/b");
        match router.dispatch(&mut req) {
            DispatchOutcome::Matched(_) => {}
            _ => panic!("expected a match"),
        }
        assert_eq!(req.url_path_args, vec!["a", "b"]);
        assert!(!req.url_path_had_trailing_slash);
    }

    #[test]
    fn unmatched_count_falls_through_to_root() {
        let router = Router::new();
        let _user_scope = router.register("/user", "GET", ArgCountMask::one_of(&[1, 2]), noop_handler()).unwrap();
        let _root_scope = router.register("/", "GET", ArgCountMask::any(), noop_handler()).unwrap();

        let mut req = dummy_request("GET", "/user/a/b/c/d");
        match router.dispatch(&mut req) {
            DispatchOutcome::Matched(_) => {}
            _ => panic!("expected the root handler to match"),
        }
        assert_eq!(req.url_path_args, vec!["user", "a", "b", "c", "d"]);
    }

    #[test]
    fn wrong_method_is_405_not_404() {
        let router = Router::new();
        let _scope = router.register("/user", "GET", ArgCountMask::none(), noop_handler()).unwrap();
        let mut req = dummy_request("POST", "/user");
        assert!(matches!(router.dispatch(&mut req), DispatchOutcome::MethodNotAllowed));
    }

    #[test]
    fn dropping_scope_unregisters_the_route() {
        let router = Router::new();
        let scope = router.register("/only", "GET", ArgCountMask::none(), noop_handler()).unwrap();
        drop(scope);
        let mut req = dummy_request("GET", "/only");
        assert!(matches!(router.dispatch(&mut req), DispatchOutcome::NotFound));
    }

    #[test]
    fn colliding_registration_fails() {
        let router = Router::new();
        let _scope = router.register("/x", "GET", ArgCountMask::none(), noop_handler()).unwrap();
        let second = router.register("/x", "GET", ArgCountMask::none(), noop_handler());
        assert!(matches!(second, Err(HttpError::HandlerAlreadyExists)));
    }

    #[test]
    fn invalid_prefixes_are_rejected() {
        let router = Router::new();
        assert!(matches!(
            router.register("user", "GET", ArgCountMask::none(), noop_handler()),
            Err(HttpError::PathDoesNotStartWithSlash(_))
        ));
        assert!(matches!(
            router.register("/user/", "GET", ArgCountMask::none(), noop_handler()),
            Err(HttpError::PathEndsWithSlash(_))
        ));
    }
}
