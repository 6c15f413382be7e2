//! Config validation: deep schema checks with user-friendly error messages.

use std::collections::HashSet;

use crate::schema::HubConfig;
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &HubConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_dispatch(config, &mut report);
    validate_notifiers(config, &mut report);
    validate_tasks(config, &mut report);
    validate_directory(config, &mut report);
    report
}

fn validate_dispatch(config: &HubConfig, report: &mut ValidationReport) {
    let d = &config.dispatch;
    if d.module_timeout_secs == 0 {
        report.error("dispatch.module_timeout_secs", "must be > 0");
    }
    if d.flood_limit == 0 {
        report.error("dispatch.flood_limit", "must be >= 1; every command would be rejected");
    }
    if d.flood_window_secs == 0 {
        report.error("dispatch.flood_window_secs", "must be > 0");
    }
    if d.response_ttl_secs == 0 {
        report.warn("dispatch.response_ttl_secs", "0 disables deferred response retrieval");
    }
    for (i, p) in d.command_prefixes.iter().enumerate() {
        if p.is_alphanumeric() || p.is_whitespace() {
            report.error(
                format!("dispatch.command_prefixes[{i}]"),
                format!("'{p}' cannot be used as a command prefix"),
            );
        }
    }
}

fn validate_notifiers(config: &HubConfig, report: &mut ValidationReport) {
    let n = &config.notifiers;
    let urls = [
        ("notifiers.activity_url", &n.activity_url),
        ("notifiers.reputation_url", &n.reputation_url),
        ("notifiers.workflow_url", &n.workflow_url),
        ("notifiers.caption_url", &n.caption_url),
        ("notifiers.translation_url", &n.translation_url),
    ];
    for (path, url) in urls {
        match url {
            Some(u) if !(u.starts_with("http://") || u.starts_with("https://")) => {
                report.error(path, format!("'{u}' must be an http(s) URL"));
            }
            None if !n.rpc_enabled && path != "notifiers.translation_url" => {
                report.warn(path, "Not configured; these notifications will be skipped");
            }
            _ => {}
        }
    }
    let rpc_urls = [
        ("notifiers.activity_rpc_url", &n.activity_rpc_url),
        ("notifiers.reputation_rpc_url", &n.reputation_rpc_url),
        ("notifiers.workflow_rpc_url", &n.workflow_rpc_url),
        ("notifiers.caption_rpc_url", &n.caption_rpc_url),
    ];
    for (path, url) in rpc_urls {
        if let Some(u) = url {
            if !(u.starts_with("http://") || u.starts_with("https://")) {
                report.error(path, format!("'{u}' must be an http(s) URL"));
            }
        }
    }
    if n.rpc_enabled && !n.has_rpc_endpoints() {
        report.warn(
            "notifiers.rpc_enabled",
            "No *_rpc_url is configured; notifier calls will use rest",
        );
    }
    if n.rest_timeout_secs == 0 || n.rpc_timeout_secs == 0 {
        report.error("notifiers", "rpc/rest timeouts must be > 0");
    }
}

fn validate_tasks(config: &HubConfig, report: &mut ValidationReport) {
    if config.tasks.max_concurrent == 0 {
        report.error("tasks.max_concurrent", "must be >= 1");
    }
}

fn validate_directory(config: &HubConfig, report: &mut ValidationReport) {
    let dir = &config.directory;
    let prefixes = &config.dispatch.command_prefixes;

    let mut seen = HashSet::new();
    for (i, row) in dir.commands.iter().enumerate() {
        let path = format!("directory.commands[{i}]");
        let info = &row.info;
        if !info.command.starts_with(|c| prefixes.contains(&c)) {
            report.error(
                format!("{path}.command"),
                format!("'{}' must start with one of {prefixes:?}", info.command),
            );
        }
        if info.module_name.trim().is_empty() {
            report.error(format!("{path}.module_name"), "cannot be empty");
        }
        if !(info.module_url.starts_with("http://") || info.module_url.starts_with("https://")) {
            report.error(format!("{path}.module_url"), "must be an http(s) URL");
        }
        if !seen.insert((row.community_id.clone(), info.command.to_lowercase())) {
            report.warn(format!("{path}.command"), format!("duplicate row for '{}'", info.command));
        }
    }

    for (i, wf) in dir.workflows.iter().enumerate() {
        if wf.workflow_id.trim().is_empty() {
            report.error(format!("directory.workflows[{i}].workflow_id"), "cannot be empty");
        }
        if !dir.entities.contains_key(&wf.entity_id) {
            report.warn(
                format!("directory.workflows[{i}].entity_id"),
                format!("'{}' has no community mapping", wf.entity_id),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CommandRow;
    use cmdhub_core::CommandInfo;

    fn row(command: &str, url: &str) -> CommandRow {
        CommandRow {
            community_id: None,
            info: CommandInfo {
                command: command.into(),
                module_name: "shoutout".into(),
                module_url: url.into(),
                is_enabled: true,
                cooldown_seconds: 0,
            },
        }
    }

    #[test]
    fn default_config_is_valid() {
        let report = validate(&HubConfig::default());
        assert!(report.is_valid(), "errors: {:?}", report.errors);
    }

    #[test]
    fn zero_flood_limit_is_error() {
        let mut cfg = HubConfig::default();
        cfg.dispatch.flood_limit = 0;
        let report = validate(&cfg);
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].path, "dispatch.flood_limit");
    }

    #[test]
    fn command_rows_need_prefix_and_url() {
        let mut cfg = HubConfig::default();
        cfg.directory.commands = vec![row("so", "shoutout:8000")];
        let report = validate(&cfg);
        let paths: Vec<_> = report.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["directory.commands[0].command", "directory.commands[0].module_url"]
        );
    }

    #[test]
    fn duplicate_rows_warn() {
        let mut cfg = HubConfig::default();
        cfg.directory.commands = vec![row("!so", "http://a"), row("!SO", "http://b")];
        let report = validate(&cfg);
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.message.contains("duplicate")));
    }

    #[test]
    fn rpc_without_endpoints_warns_and_bad_rpc_url_errors() {
        let mut cfg = HubConfig::default();
        cfg.notifiers.rpc_enabled = true;
        let report = validate(&cfg);
        assert!(report.warnings.iter().any(|w| w.path == "notifiers.rpc_enabled"));

        cfg.notifiers.activity_rpc_url = Some("activity:9000".into());
        let report = validate(&cfg);
        assert_eq!(report.errors[0].path, "notifiers.activity_rpc_url");
        assert!(!report.warnings.iter().any(|w| w.path == "notifiers.rpc_enabled"));
    }
}
