//! CLI error types.

use thiserror::Error;

use crate::config::ConfigError;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The role is not defined in the role table.
    #[error("unknown role '{name}'. Run 'rolegate roles' to list defined roles")]
    UnknownRole { name: String },

    /// `check` needs either a principal or explicit roles.
    #[error("pass --principal or at least one --role")]
    NothingToCheck,

    /// Configuration is invalid or unreadable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error occurred in the storage layer.
    #[error(transparent)]
    Storage(#[from] storage::Error),

    /// An error occurred in the policy layer, including denials.
    #[error(transparent)]
    Policy(#[from] policy::Error),

    /// Failed to render JSON output.
    #[error("failed to render output: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
