//! Config file loading and environment overrides.

use crate::env::resolve_env_vars;
use crate::schema::HubConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Default config file name within the config directory.
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Resolve the config directory.
/// Priority: `CMDHUB_CONFIG_DIR` env > `~/.cmdhub/` > `./.cmdhub`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CMDHUB_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(".cmdhub"))
        .unwrap_or_else(|| PathBuf::from(".cmdhub"))
}

/// Resolve the config file path: `CMDHUB_CONFIG` if set, else `<config_dir>/config.yaml`.
pub fn config_file_path(config_dir: &Path) -> PathBuf {
    match std::env::var("CMDHUB_CONFIG") {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => config_dir.join(CONFIG_FILE_NAME),
    }
}

/// Load and parse the config from disk.
///
/// Returns `Ok(Default::default())` if the file doesn't exist (first run).
pub async fn load_config(path: &Path) -> Result<HubConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(HubConfig::default());
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&raw)
        .with_context(|| format!("Failed to parse config at: {}", path.display()))?;

    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Parse YAML text, substituting `${VAR}` references from the environment.
pub fn parse_config(raw: &str) -> Result<HubConfig> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("Invalid YAML")?;
    if yaml.is_null() {
        return Ok(HubConfig::default());
    }
    let value = serde_json::to_value(yaml).context("Config is not representable as JSON")?;
    let value = resolve_env_vars(&value).context("Failed to resolve env vars in config")?;
    serde_json::from_value(value).context("Config does not match schema")
}

/// Apply deployment overrides: `CMDHUB_BIND`, `CMDHUB_PORT`, `RUST_LOG`.
///
/// `lookup` abstracts the environment so tests need not mutate process state.
pub fn apply_env_overrides<F>(mut config: HubConfig, lookup: F) -> HubConfig
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(bind) = lookup("CMDHUB_BIND").filter(|b| !b.is_empty()) {
        config.server.bind = bind;
    }
    if let Some(port) = lookup("CMDHUB_PORT") {
        match port.parse() {
            Ok(port) => config.server.port = port,
            Err(_) => warn!(value = %port, "Ignoring invalid CMDHUB_PORT"),
        }
    }
    if let Some(level) = lookup("RUST_LOG").filter(|l| !l.is_empty()) {
        config.logging.level = level;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.yaml")).await.unwrap();
        assert_eq!(config, HubConfig::default());
    }

    #[tokio::test]
    async fn loads_yaml_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        tokio::fs::write(&path, "server:\n  port: 9090\ndispatch:\n  flood_limit: 10\n")
            .await
            .unwrap();
        let config = load_config(&path).await.unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.dispatch.flood_limit, 10);
        assert_eq!(config.dispatch.flood_window_secs, 60);
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(parse_config("").unwrap(), HubConfig::default());
    }

    #[test]
    fn env_overrides_replace_server_and_level() {
        let env: HashMap<&str, &str> =
            [("CMDHUB_PORT", "7000"), ("CMDHUB_BIND", "127.0.0.1"), ("RUST_LOG", "debug")]
                .into_iter()
                .collect();
        let config = apply_env_overrides(HubConfig::default(), |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn invalid_port_override_is_ignored() {
        let config = apply_env_overrides(HubConfig::default(), |k| {
            (k == "CMDHUB_PORT").then(|| "not-a-port".to_string())
        });
        assert_eq!(config.server.port, 8080);
    }
}
