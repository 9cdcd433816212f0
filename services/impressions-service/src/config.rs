use impressions_common::env_or;

const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_MAX_INFLATED_BYTES: usize = 64 * 1024 * 1024;

/// Process configuration, read once at startup and handed to whatever needs it.
#[derive(Clone)]
pub struct Config {
    pub port: u16,
    /// Not validated here; a missing value fails at the first database call.
    pub database_url: String,
    pub max_body_bytes: usize,
    /// Upper bound on a gzip body after decompression.
    pub max_inflated_bytes: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env_or("PORT", 8080u16),
            database_url: std::env::var("DATABASE_URL").unwrap_or_default(),
            max_body_bytes: env_or("MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES),
            max_inflated_bytes: env_or("MAX_INFLATED_BYTES", DEFAULT_MAX_INFLATED_BYTES),
        }
    }
}
