//! Store configuration and logging setup

use std::env;
use std::path::PathBuf;

/// Default backing file, relative to the working directory
pub const DEFAULT_DB_FILENAME: &str = "json_database.json";

/// Environment variable overriding the backing file path
pub const ENV_DB_PATH: &str = "LEDGER_DB_PATH";

/// Environment variable toggling pretty-printed output (`true`/`false`)
pub const ENV_DB_PRETTY: &str = "LEDGER_DB_PRETTY";

/// Configuration for the JSON store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Path of the single backing document
    pub path: PathBuf,
    /// Indent the written document so it stays readable by hand
    pub pretty: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            path: PathBuf::from(DEFAULT_DB_FILENAME),
            pretty: true,
        }
    }
}

impl StoreConfig {
    /// Create a config for the given backing file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Defaults overridden by `LEDGER_DB_PATH` and `LEDGER_DB_PRETTY`
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = StoreConfig::default();
        if let Ok(path) = env::var(ENV_DB_PATH) {
            if !path.trim().is_empty() {
                config.path = PathBuf::from(path);
            }
        }
        if let Some(pretty) = env::var(ENV_DB_PRETTY).ok().and_then(|v| parse_flag(&v)) {
            config.pretty = pretty;
        }
        config
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Install a fmt subscriber filtered by `RUST_LOG`, else `default_directive`
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing(default_directive: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
