/// Shared error type used across all chatrelay crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store: {0}")]
    Store(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("fetch: {0}")]
    Fetch(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
