use thiserror::Error;

/// Infrastructure faults raised by collaborators of the command processor.
///
/// User-facing outcomes (unknown command, cooldown, ...) are not errors; see
/// [`crate::outcome::Rejection`].
#[derive(Debug, Error)]
pub enum HubError {
    #[error("cache error: {0}")]
    Cache(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("registry error: {0}")]
    Registry(String),

    #[error("rate limiter error: {0}")]
    RateLimiter(String),

    #[error("translation error: {0}")]
    Translation(String),

    #[error("transport error ({service}): {message}")]
    Transport { service: String, message: String },

    #[error("rpc error ({service}.{method}): {message}")]
    Rpc {
        service: String,
        method: String,
        message: String,
    },

    #[error("publish error: {0}")]
    Publish(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type HubResult<T> = Result<T, HubError>;
