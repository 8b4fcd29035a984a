//! Tuning knobs for the dataflow engine, read the same way `bricks-http`
//! reads `ServerConfig`: defaults overridable by environment variables,
//! loaded once via `dotenvy` at process start.

pub const DEFAULT_MMPQ_CAPACITY: usize = 4096;

#[derive(Debug, Clone)]
pub struct RipCurrentConfig {
    /// Maximum number of entries an MMPQ edge holds before a publishing
    /// block blocks. Bounds memory when a consumer falls behind.
    pub mmpq_capacity: usize,
}

impl Default for RipCurrentConfig {
    fn default() -> Self {
        RipCurrentConfig { mmpq_capacity: DEFAULT_MMPQ_CAPACITY }
    }
}

impl RipCurrentConfig {
    /// Reads `RIPCURRENT_MMPQ_CAPACITY` from the environment (loading a
    /// `.env` file first, if present), falling back to the default.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mmpq_capacity = std::env::var("RIPCURRENT_MMPQ_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MMPQ_CAPACITY);
        RipCurrentConfig { mmpq_capacity }
    }
}
