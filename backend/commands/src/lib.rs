pub mod detection;

pub use detection::{
    canonicalize_slash, detect_command, is_command, parse_args, parse_interaction,
    CANONICAL_PREFIX, DEFAULT_PREFIXES,
};
