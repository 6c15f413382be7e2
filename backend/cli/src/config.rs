use std::fmt::Write;
use std::path::{Path, PathBuf};

use cmdhub_config::{config_dir, config_file_path, ValidationReport};

/// An explicit `--config` wins over `CMDHUB_CONFIG` and the config dir.
pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => config_file_path(&config_dir()),
    }
}

/// Human-readable summary for `cmdhub check-config`.
pub fn render_report(path: &Path, report: &ValidationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "config: {}", path.display());
    for e in &report.errors {
        let _ = writeln!(out, "  error   {}: {}", e.path, e.message);
    }
    for w in &report.warnings {
        let _ = writeln!(out, "  warning {}: {}", w.path, w.message);
    }
    let verdict = if report.is_valid() { "ok" } else { "invalid" };
    let _ = writeln!(
        out,
        "{verdict} ({} error(s), {} warning(s))",
        report.errors.len(),
        report.warnings.len()
    );
    out
}
