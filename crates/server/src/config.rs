use std::path::Path;

use anyhow::Context;
use ::config::{Config, Environment, File};
use serde::Deserialize;
use storage::DEFAULT_DATABASE_URL;

const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub bind_addr: String,
    pub database_url: String,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".into(),
            database_url: DEFAULT_DATABASE_URL.into(),
            log_filter: "info".into(),
        }
    }
}

pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from(Path::new(SETTINGS_FILE))
}

/// Defaults, then the optional TOML file at `path`, then `APP__*` variables.
///
/// Plain `SERVER_BIND` and `DATABASE_URL` replace the built-in defaults.
pub fn load_settings_from(path: &Path) -> anyhow::Result<Settings> {
    let mut defaults = Settings::default();
    if let Ok(v) = std::env::var("SERVER_BIND") {
        defaults.bind_addr = v;
    }
    if let Ok(v) = std::env::var("DATABASE_URL") {
        defaults.database_url = v;
    }

    let settings = Config::builder()
        .set_default("bind_addr", defaults.bind_addr)?
        .set_default("database_url", defaults.database_url)?
        .set_default("log_filter", defaults.log_filter)?
        .add_source(File::from(path).required(false))
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()
        .with_context(|| format!("failed to load settings from '{}'", path.display()))?
        .try_deserialize::<Settings>()
        .context("invalid server settings")?;

    Ok(settings)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
