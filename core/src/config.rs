//! Client configuration from the environment.

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Client settings, read from `ITEMS_*` environment variables over defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Where `HttpRecordStore` finds the record store.
    pub base_url: String,
    /// Records requested per query page.
    pub results_limit: usize,
    /// Keep querying with the returned cursor until the store runs dry.
    /// Off by default: a fetch returns at most one page.
    pub follow_cursors: bool,
}

pub const DEFAULT_RESULTS_LIMIT: usize = 50;

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".into(),
            results_limit: DEFAULT_RESULTS_LIMIT,
            follow_cursors: false,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_environment(Environment::with_prefix("ITEMS"))
    }

    fn from_environment(env: Environment) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Config::builder()
            .set_default("base_url", defaults.base_url)?
            .set_default("results_limit", defaults.results_limit as u64)?
            .set_default("follow_cursors", defaults.follow_cursors)?
            .add_source(env.prefix_separator("_").try_parsing(true))
            .build()?
            .try_deserialize()
    }
}
