//! `cmdhub-config`: command hub runtime configuration.
//!
//! Provides:
//! - Typed config schema (server, logging, dispatch, notifiers, tasks, directory seed)
//! - YAML loading with a first-run default
//! - `${ENV_VAR}` substitution
//! - Default value application and environment overrides
//! - Validation with errors and warnings

pub mod defaults;
pub mod env;
pub mod io;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{collect_referenced_vars, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{apply_env_overrides, config_dir, config_file_path, load_config, parse_config};
pub use schema::{
    CommandRow, DirectoryConfig, DispatchConfig, HubConfig, InstallationRow, LoggingConfig,
    NotifiersConfig, ServerConfig, TasksConfig, WorkflowRow, WorkflowTriggerSpec,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Result};
use std::path::Path;

/// Load the config file, apply defaults, then environment overrides.
///
/// Validation is separate so callers can set up logging first.
pub async fn load_with_overrides(path: &Path) -> Result<HubConfig> {
    let config = load_config(path).await?;
    let config = apply_all_defaults(config);
    Ok(apply_env_overrides(config, |key| std::env::var(key).ok()))
}

/// Validate, log every finding, and fail if any error was found.
pub fn ensure_valid(config: &HubConfig) -> Result<ValidationReport> {
    let report = validate(config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if !report.is_valid() {
        bail!("config has {} error(s)", report.errors.len());
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_loads_valid_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_with_overrides(&dir.path().join("config.yaml")).await.unwrap();
        assert_eq!(config.dispatch.flood_limit, 60);
        assert!(ensure_valid(&config).is_ok());
    }

    #[test]
    fn invalid_config_is_refused() {
        let mut config = HubConfig::default();
        config.tasks.max_concurrent = 0;
        let err = ensure_valid(&config).unwrap_err();
        assert!(err.to_string().contains("1 error"));
    }
}
