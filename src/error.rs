use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("a review session is already active for learner '{0}'")]
    SessionActive(String),

    #[error("session token does not own the active session for learner '{0}'")]
    SessionNotOwned(String),

    #[error("invalid attempt record: {0}")]
    InvalidRecord(String),
}

pub type Result<T> = std::result::Result<T, Error>;
