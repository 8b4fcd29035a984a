use thiserror::Error;

use bricks_net::NetError;

/// The HTTP protocol, router, and static-file error kinds (§7's closed
/// taxonomy). Each variant that reaches the connection loop without being
/// caught by handler code is turned into a response via `status_code`/
/// `default_body`, without the handler ever being consulted.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error(transparent)]
    Net(#[from] NetError),

    #[error("no Content-Length and not chunked, but a body is required")]
    RequestBodyLengthNotProvided,

    #[error("request body exceeds the maximum payload size")]
    PayloadTooLarge,

    #[error("chunk size line is not a valid hexadecimal value: {0:?}")]
    ChunkSizeNotAValidHex(String),

    #[error("connection closed by peer")]
    ConnectionClosedByPeer,

    #[error("redirects are not allowed on this client")]
    RedirectNotAllowed,

    #[error("redirect loop detected: {0:?}")]
    RedirectLoop(Vec<String>),

    #[error("attempted to send an HTTP response more than once on the same connection")]
    AttemptedToSendResponseMoreThanOnce,

    #[error("registered path does not start with '/': {0:?}")]
    PathDoesNotStartWithSlash(String),

    #[error("registered path ends with '/': {0:?}")]
    PathEndsWithSlash(String),

    #[error("registered path contains characters the router disallows: {0:?}")]
    PathContainsInvalidCharacters(String),

    #[error("a handler is already registered for this (path, method, arg-count)")]
    HandlerAlreadyExists,

    #[error("no handler is registered for this (path, method, arg-count)")]
    HandlerDoesNotExist,

    #[error("cannot serve files of unknown MIME type: {0:?}")]
    UnknownMimeType(String),

    #[error("more than one index file candidate found in a single directory: {0:?}")]
    MoreThanOneIndexFile(String),
}

impl HttpError {
    /// The status code the server writes when this error reaches the
    /// connection loop without the handler having sent a response.
    pub fn status_code(&self) -> u16 {
        match self {
            HttpError::RequestBodyLengthNotProvided => 411,
            HttpError::PayloadTooLarge => 413,
            HttpError::HandlerDoesNotExist => 404,
            HttpError::HandlerAlreadyExists => 409,
            _ => 500,
        }
    }

    /// The body written alongside `status_code` — the two named bodies from
    /// §6, or the generic 500 page for everything else.
    pub fn default_body(&self) -> &'static str {
        match self {
            HttpError::PayloadTooLarge => "<h1>ENTITY TOO LARGE</h1>\n",
            HttpError::HandlerDoesNotExist => "<h1>NOT FOUND</h1>\n",
            _ => "<h1>INTERNAL SERVER ERROR</h1>\n",
        }
    }
}

pub type HttpResult<T> = Result<T, HttpError>;
