//! Environment-driven configuration with typed fallback-and-log-once semantics.
//!
//! An invalid numeric env var falls back to the documented default and is
//! logged once via `tracing::warn!`.

use std::env;
use std::path::PathBuf;

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for the database file and per-space index trees.
    pub data_path: PathBuf,
    /// Database file name, or `:memory:` for an in-memory catalog.
    pub db_name: String,
    /// Max number of loaded `IndexManager`s kept resident by the Index LRU.
    pub hnsw_index_cache_capacity: usize,
    /// Default HNSW `m` for indexes that don't override it.
    pub default_m: usize,
    /// Default HNSW `ef_construction` for indexes that don't override it.
    pub default_ef_construction: usize,
    /// Soft cap on expected index population, used to size backing storage.
    pub hnsw_max_datasize: usize,
    /// Default bearer-token lifetime, in days, when a request asks for `0`.
    pub default_token_expire_days: i64,
    /// HMAC key used to sign and verify JWT bearer tokens.
    pub jwt_token_key: String,
    /// Optional log file path; `None` logs to stderr.
    pub log_file: Option<PathBuf>,
    /// `tracing` env-filter directive string.
    pub log_level: String,
}

impl Config {
    /// Build configuration from the process environment, falling back to
    /// documented defaults (and logging once) for anything missing or
    /// unparsable.
    pub fn from_env() -> Self {
        Self {
            data_path: env::var("DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            db_name: env::var("DB_NAME").unwrap_or_else(|_| "vdb.sqlite3".to_string()),
            hnsw_index_cache_capacity: env_usize("HNSW_INDEX_CACHE_CAPACITY", 100),
            default_m: env_usize("DEFAULT_M", 16),
            default_ef_construction: env_usize("DEFAULT_EF_CONSTRUCTION", 100),
            hnsw_max_datasize: env_usize("HNSW_MAX_DATASIZE", 1_000_000),
            default_token_expire_days: env_usize("DEFAULT_TOKEN_EXPIRE_DAYS", 30) as i64,
            jwt_token_key: env::var("JWT_TOKEN_KEY").unwrap_or_else(|_| "dev-only-insecure-key".to_string()),
            log_file: env::var("LOG_FILE").ok().map(PathBuf::from),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// An in-memory configuration suitable for tests: `:memory:` catalog, a
    /// throwaway temp directory for index files.
    pub fn in_memory(data_path: PathBuf) -> Self {
        Self {
            data_path,
            db_name: ":memory:".to_string(),
            hnsw_index_cache_capacity: 100,
            default_m: 16,
            default_ef_construction: 100,
            hnsw_max_datasize: 1_000_000,
            default_token_expire_days: 30,
            jwt_token_key: "test-key".to_string(),
            log_file: None,
            log_level: "info".to_string(),
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    match env::var(key) {
        Ok(raw) => match raw.parse::<usize>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, raw, default, "invalid numeric env var, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Initialise the global `tracing` subscriber once per process.
///
/// Safe to call more than once; subsequent calls are no-ops (the underlying
/// `tracing::subscriber::set_global_default` error is swallowed, matching the
/// "initialise once, never teardown" shared-resource policy).
pub fn init_logging(cfg: &Config) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_new(&cfg.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter);
    let _ = builder.try_init();
}
