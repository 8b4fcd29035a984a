//! Import everything you need with one line:
//!
//! ```rust,ignore
//! use bricks_http::prelude::*;
//! ```

pub use crate::client::{self, ClientResponse, RequestOptions};
pub use crate::config::ServerConfig;
pub use crate::error::{HttpError, HttpResult};
pub use crate::logging::{init_logging, init_logging_json, init_logging_pretty, init_logging_with_level};
pub use crate::request::{HttpRequest, ParseHooks};
pub use crate::response::HttpResponse;
pub use crate::router::{ArgCountMask, DispatchOutcome, RouteScope, Router};
pub use crate::server::{run, HttpServerConnection};
pub use crate::static_files::{serve_static_files_from, StaticFileOptions};
