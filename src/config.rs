use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_path")]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: default_check_interval(),
        }
    }
}

fn default_path() -> String {
    "tripcount.db".to_string()
}

fn default_check_interval() -> u64 {
    60
}

/// Load configuration from config.toml and environment variables
pub fn load() -> Result<Config, figment::Error> {
    Figment::new()
        .merge(Toml::file("config.toml"))
        // Use double-underscore nesting for snake_case keys
        .merge(Env::prefixed("TRIPCOUNT_").split("__"))
        .extract()
}

/// Validate configuration and return a user-friendly error
pub fn validate(config: &Config) -> Result<(), String> {
    if config.storage.path.trim().is_empty() {
        return Err("storage.path must not be empty".into());
    }

    if config.watch.check_interval_seconds == 0 {
        return Err("watch.check_interval_seconds must be greater than 0".into());
    }

    Ok(())
}
