//! Cached `Date` header. Formatting it on every response is wasted work —
//! HTTP dates only change once a second — so a background thread keeps one
//! formatted string around and every request just clones it.

use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

static CACHED_DATE: OnceLock<Arc<RwLock<String>>> = OnceLock::new();

fn now_header() -> String {
    httpdate::fmt_http_date(std::time::SystemTime::now())
}

/// Start the background updater. Idempotent; call it once at server
/// startup, or not at all — `cached_date_header` falls back to formatting
/// the date live if the cache was never initialized.
pub fn init_date_cache() {
    CACHED_DATE.get_or_init(|| {
        let value = Arc::new(RwLock::new(now_header()));
        let background = value.clone();
        std::thread::spawn(move || loop {
            std::thread::sleep(Duration::from_millis(500));
            let formatted = now_header();
            *background.write().unwrap_or_else(|e| e.into_inner()) = formatted;
        });
        value
    });
}

pub fn cached_date_header() -> String {
    match CACHED_DATE.get() {
        Some(lock) => lock.read().unwrap_or_else(|e| e.into_inner()).clone(),
        None => now_header(),
    }
}
