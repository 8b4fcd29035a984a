//! Error type plus the process-wide error sink that built-in diagnostics
//! (unused-block leaks, MMPQ timestamp violations reported off the hot
//! path) report through instead of panicking.

use std::panic::Location;
use std::sync::{OnceLock, RwLock};

#[derive(Debug, thiserror::Error)]
pub enum RipCurrentError {
    #[error("timestamp {observed} is inconsistent with HEAD (expected at least {expected_at_least})")]
    InconsistentTimestamp { expected_at_least: i64, observed: i64 },

    #[error("no entries have been published yet")]
    NoEntriesPublishedYet,

    #[error("invalid iterable range")]
    InvalidIterableRange,
}

pub type RipCurrentResult<T> = Result<T, RipCurrentError>;

/// A handler for diagnostics that have nowhere else to go: an unused block
/// dropped without being composed, run, or explicitly dismissed. The
/// default handler logs via `tracing`; tests can install their own with
/// [`scoped_error_handler`] to assert on what gets reported.
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, message: &str);
}

/// The default sink when no handler has been injected: log at `error`
/// level, then terminate the process. Matches the original's `std::exit(-1)`
/// on an unhandled RipCurrent error — there is no safe way to keep running
/// once an invariant like HEAD monotonicity has been violated.
struct TracingHandler;
impl ErrorHandler for TracingHandler {
    fn handle(&self, message: &str) {
        tracing::error!(target: "ripcurrent", "{message}");
        std::process::abort();
    }
}

static INJECTED_HANDLER: OnceLock<RwLock<Option<Box<dyn ErrorHandler>>>> = OnceLock::new();

fn slot() -> &'static RwLock<Option<Box<dyn ErrorHandler>>> {
    INJECTED_HANDLER.get_or_init(|| RwLock::new(None))
}

pub(crate) fn report(message: &str) {
    match slot().read().unwrap_or_else(|e| e.into_inner()).as_ref() {
        Some(handler) => handler.handle(message),
        None => TracingHandler.handle(message),
    }
}

pub(crate) fn report_leaked_block(name: &str, site: &Location<'static>) {
    report(&format!(
        "block `{name}` (constructed at {site}) was dropped without being composed, run, or dismissed"
    ));
}

/// Installs `handler` as the process-wide error sink for the lifetime of
/// the returned guard, restoring the previous handler (or the default) on
/// drop. Intended for tests that need to observe diagnostics that would
/// otherwise only reach `tracing`.
pub struct InjectedHandlerScope {
    _private: (),
}

impl InjectedHandlerScope {
    pub fn install(handler: impl ErrorHandler + 'static) -> Self {
        *slot().write().unwrap_or_else(|e| e.into_inner()) = Some(Box::new(handler));
        InjectedHandlerScope { _private: () }
    }
}

impl Drop for InjectedHandlerScope {
    fn drop(&mut self) {
        *slot().write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

pub fn scoped_error_handler(handler: impl ErrorHandler + 'static) -> InjectedHandlerScope {
    InjectedHandlerScope::install(handler)
}
