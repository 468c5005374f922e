use oai_harvest::error::ConfigError;
use oai_harvest::index::QueryError;
use oai_harvest::token::TokenError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    OaiConfig(#[from] ConfigError),

    #[error("index error: {0}")]
    Index(#[from] QueryError),

    #[error("token store error: {0}")]
    Token(#[from] TokenError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
