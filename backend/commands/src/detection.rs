//! Command detection: prefix commands, slash canonicalisation, interaction ids.
//!
//! Slash commands are rewritten into the prefix form so that every command,
//! whichever way it was typed, reaches the registry as `!name args`.

use cmdhub_core::{InteractionRoute, SlashOption};
use tracing::trace;

/// Prefixes that mark a chat message as a command.
pub const DEFAULT_PREFIXES: [char; 2] = ['!', '#'];

/// Canonical prefix slash commands are rewritten to.
pub const CANONICAL_PREFIX: char = '!';

/// True if `text` starts with one of `prefixes` followed by a command name.
pub fn is_command(text: &str, prefixes: &[char]) -> bool {
    let trimmed = text.trim_start();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next()) {
        (Some(p), Some(c)) => prefixes.contains(&p) && !c.is_whitespace(),
        _ => false,
    }
}

/// The lower-cased command token (prefix included, e.g. `!so`) of a command
/// message. Returns `None` for ordinary chat.
pub fn detect_command(text: &str, prefixes: &[char]) -> Option<String> {
    if !is_command(text, prefixes) {
        return None;
    }
    let command = split_first_token(text.trim()).0.to_lowercase();
    trace!(command = %command, "Detected prefix command");
    Some(command)
}

/// Arguments of a command message: everything after the first whitespace-delimited token.
pub fn parse_args(message: &str) -> String {
    split_first_token(message.trim()).1.to_string()
}

/// Rewrite `/name [text]` plus slash options into `!name opt:value ... [text]`.
pub fn canonicalize_slash(message: &str, options: &[SlashOption]) -> String {
    let (token, rest) = split_first_token(message.trim());
    let name = token.trim_start_matches('/');

    let mut parts = vec![format!("{CANONICAL_PREFIX}{name}")];
    parts.extend(
        options
            .iter()
            .map(|opt| format!("{}:{}", opt.name, opt.value_text())),
    );
    if !rest.is_empty() {
        parts.push(rest.to_string());
    }
    parts.join(" ")
}

/// Split an interaction `custom_id` of the form `module:action:context`.
/// Missing segments are empty; the context keeps any further colons.
pub fn parse_interaction(custom_id: &str) -> InteractionRoute {
    let mut segments = custom_id.splitn(3, ':');
    let mut next = || segments.next().unwrap_or_default().to_string();
    InteractionRoute {
        module: next(),
        action: next(),
        context: next(),
    }
}

fn split_first_token(text: &str) -> (&str, &str) {
    text.split_once(char::is_whitespace)
        .map(|(token, rest)| (token, rest.trim()))
        .unwrap_or((text, ""))
}
