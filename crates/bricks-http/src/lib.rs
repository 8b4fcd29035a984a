//! Blocking HTTP/1.1 transport: request parser, server connection, client,
//! and router, built on `bricks_net`'s POSIX socket primitives.

pub mod client;
pub mod codes;
pub mod config;
pub mod error;
pub mod logging;
pub mod perf;
pub mod prelude;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod static_files;
pub mod testing;

pub use client::{send, send_streaming, send_to_file, ClientResponse, RequestBody, RequestOptions};
pub use config::ServerConfig;
pub use error::{HttpError, HttpResult};
pub use logging::{init_logging, init_logging_json, init_logging_pretty, init_logging_with_level};
pub use request::{HttpRequest, ParseHooks};
pub use response::HttpResponse;
pub use router::{ArgCountMask, DispatchOutcome, Handler, RouteScope, Router};
pub use server::{HttpServerConnection, run};
pub use static_files::{serve_static_files_from, StaticFileOptions};
