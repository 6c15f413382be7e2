//! Log Redaction
//!
//! Scrubs tokens, API keys, emails and phone numbers from chat text before
//! it is logged.

use once_cell::sync::Lazy;
use regex::Regex;

static TELEPHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").expect("static regex")
});
static API_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(sk-[a-zA-Z0-9]{32,})|(Bearer\s+[a-zA-Z0-9\-\._~+/]+=*)|(oauth:[a-z0-9]{20,})")
        .expect("static regex")
});
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("static regex")
});

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = API_KEY_RE.replace_all(input, "[REDACTED_TOKEN]");
    let redacted = EMAIL_RE.replace_all(&redacted, "[REDACTED_EMAIL]");
    TELEPHONE_RE.replace_all(&redacted, "[REDACTED_PHONE]").into_owned()
}

/// Redacted, char-bounded preview of user text for log fields.
pub fn log_preview(input: &str, max_chars: usize) -> String {
    let clean = redact_sensitive_data(input);
    if clean.chars().count() <= max_chars {
        return clean;
    }
    let mut out: String = clean.chars().take(max_chars).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redaction() {
        let raw = "Sending to +1-555-123-4567 with Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";
        let clean = redact_sensitive_data(raw);
        assert!(!clean.contains("+1-555-123-4567"));
        assert!(!clean.contains("Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9"));
    }

    #[test]
    fn redacts_chat_oauth_and_email() {
        let clean = redact_sensitive_data("!login oauth:abcdefghij0123456789xyz mail me@host.io");
        assert_eq!(clean, "!login [REDACTED_TOKEN] mail [REDACTED_EMAIL]");
    }

    #[test]
    fn plain_commands_untouched() {
        assert_eq!(redact_sensitive_data("!so @streamer"), "!so @streamer");
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(log_preview("héllo wörld", 5), "héllo…");
        assert_eq!(log_preview("short", 10), "short");
    }
}
