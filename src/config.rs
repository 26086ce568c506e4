use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::unlock::UnlockCosts;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind: SocketAddr,
    /// Base URL or directory holding `manifest.json`.
    pub content: String,
    pub database_url: String,
    pub fallback_dir: PathBuf,
    pub unlock_costs: UnlockCosts,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_raw = lookup("FINLIT_BIND").unwrap_or_else(|| "127.0.0.1:3000".to_string());
        let bind = bind_raw.parse().map_err(|_| ConfigError::InvalidAddress {
            key: "FINLIT_BIND",
            value: bind_raw.clone(),
        })?;

        let defaults = UnlockCosts::default();
        let number = |key: &'static str, default: u32| -> Result<u32, ConfigError> {
            match lookup(key) {
                None => Ok(default),
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidNumber { key, value: raw.clone() }),
            }
        };

        Ok(Config {
            bind,
            content: lookup("FINLIT_CONTENT").unwrap_or_else(|| "./content".to_string()),
            database_url: lookup("FINLIT_DATABASE_URL")
                .unwrap_or_else(|| "sqlite://finlit.db?mode=rwc".to_string()),
            fallback_dir: lookup("FINLIT_FALLBACK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".finlit/local")),
            unlock_costs: UnlockCosts {
                intermediate: number("FINLIT_UNLOCK_COST_INTERMEDIATE", defaults.intermediate)?,
                advanced: number("FINLIT_UNLOCK_COST_ADVANCED", defaults.advanced)?,
            },
        })
    }
}
