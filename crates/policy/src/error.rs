//! Policy error types.

use thiserror::Error;

use crate::PermissionKind;

/// Policy errors.
///
/// Evaluation itself never fails; these cover building a role table and
/// turning a negative decision into an error at a call site.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A permission was denied by the role table.
    #[error("permission denied: {requested} requires one of {required:?}")]
    Denied {
        requested: PermissionKind,
        required: Vec<String>,
    },

    /// A role name failed validation.
    #[error("invalid role name '{name}': {reason}")]
    InvalidRoleName { name: String, reason: &'static str },

    /// A permission string is not one of the known kinds.
    #[error("unknown permission '{0}'")]
    UnknownPermission(String),

    /// The role table is invalid.
    #[error("invalid policy: {0}")]
    Invalid(String),

    /// Failed to parse a role table file.
    #[error("failed to parse policy: {0}")]
    Parse(String),

    /// An I/O error occurred while reading a role table.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
