//! Server settings from the environment.

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Listen address, from `RECORD_SERVER_HOST` / `RECORD_SERVER_PORT`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_environment(Environment::with_prefix("RECORD_SERVER"))
    }

    fn from_environment(env: Environment) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", defaults.port as u64)?
            .add_source(env.prefix_separator("_").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let source: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix("RECORD_SERVER").source(Some(source))
    }

    #[test]
    fn defaults_to_localhost_3000() {
        let config = ServerConfig::from_environment(env(&[])).unwrap();
        assert_eq!(config.addr(), "127.0.0.1:3000");
    }

    #[test]
    fn environment_overrides_port() {
        let config = ServerConfig::from_environment(env(&[("RECORD_SERVER_PORT", "8080")])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "127.0.0.1");
    }
}
