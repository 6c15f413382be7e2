//! Structured logging for the command hub.
//!
//! Console output, optional daily-rolling NDJSON files, and redaction of
//! credentials and contact details before user text reaches a log line.

pub mod logger;
pub mod redact;

pub use logger::{init_logger, LogGuard};
pub use redact::{log_preview, redact_sensitive_data};
