use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid severity '{0}': expected success, info, warning or error")]
    InvalidSeverity(String),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("invalid activity id '{0}'")]
    InvalidId(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, Error>;
