use std::time::Duration;

/// Server-side configuration, loaded from environment variables the same
/// way the teacher's `Config::from_env` does (`.env` loaded first via
/// `dotenvy`, each field falling back to a hardcoded default).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    /// `0` lets the OS pick a port; tests instead reserve one up front via
    /// `bricks_net::reserve_local_port` and never read this field.
    pub port: u16,
    /// Maximum accepted request body size in bytes. Exceeding it fails
    /// parsing with `HttpError::PayloadTooLarge` (413).
    pub max_body_size: usize,
    /// Initial size of the request parser's growable read buffer.
    pub initial_buffer_size: usize,
    /// Growth factor applied to the read buffer each time it runs out of
    /// room before the end of headers (or a chunk) has been seen.
    pub buffer_growth_factor: f64,
    /// No timeout by default — matches the explicit "no request-level
    /// timeout" statement; set to bound a slow/idle client.
    pub read_timeout: Option<Duration>,
}

pub const DEFAULT_MAX_BODY_SIZE: usize = 16 * 1024 * 1024;
pub const DEFAULT_INITIAL_BUFFER_SIZE: usize = 100;
pub const DEFAULT_BUFFER_GROWTH_FACTOR: f64 = 2.0;

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            initial_buffer_size: DEFAULT_INITIAL_BUFFER_SIZE,
            buffer_growth_factor: DEFAULT_BUFFER_GROWTH_FACTOR,
            read_timeout: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        ServerConfig {
            host: std::env::var("BRICKS_HTTP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("BRICKS_HTTP_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            max_body_size: std::env::var("BRICKS_HTTP_MAX_BODY_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_BODY_SIZE),
            initial_buffer_size: std::env::var("BRICKS_HTTP_INITIAL_BUFFER_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_INITIAL_BUFFER_SIZE),
            buffer_growth_factor: std::env::var("BRICKS_HTTP_BUFFER_GROWTH_FACTOR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_BUFFER_GROWTH_FACTOR),
            read_timeout: std::env::var("BRICKS_HTTP_READ_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_spec_constants() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.max_body_size, 16 * 1024 * 1024);
        assert_eq!(cfg.initial_buffer_size, 100);
        assert_eq!(cfg.buffer_growth_factor, 2.0);
        assert!(cfg.read_timeout.is_none());
    }
}
