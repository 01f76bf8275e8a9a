//! Role names and identities.

use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const MAX_ROLE_NAME_LEN: usize = 64;

/// A validated role name.
///
/// Lowercase ASCII letters, digits and `_`, starting with a letter,
/// at most 64 bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleName(String);

impl RoleName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let invalid = |reason| Error::InvalidRoleName {
            name: name.clone(),
            reason,
        };

        let Some(first) = name.chars().next() else {
            return Err(invalid("must not be empty"));
        };
        if name.len() > MAX_ROLE_NAME_LEN {
            return Err(invalid("longer than 64 bytes"));
        }
        if !first.is_ascii_lowercase() {
            return Err(invalid("must start with a lowercase letter"));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(invalid("only a-z, 0-9 and '_' are allowed"));
        }

        Ok(Self(name))
    }

    /// Wrap a name already known to be valid, such as a built-in role.
    pub(crate) fn trusted(name: &'static str) -> Self {
        debug_assert!(Self::new(name).is_ok());
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RoleName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for RoleName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<RoleName> for String {
    fn from(name: RoleName) -> Self {
        name.0
    }
}

impl Borrow<str> for RoleName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RoleName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A principal evaluated against the role table.
///
/// Role names are kept as raw strings: they come from an external
/// assignment store and are only resolved at evaluation time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub assigned_roles: BTreeSet<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            assigned_roles: BTreeSet::new(),
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assigned_roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn has_roles(&self) -> bool {
        !self.assigned_roles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_role_names() {
        for name in ["admin", "super_admin", "ops2", "a"] {
            assert_eq!(RoleName::new(name).unwrap().as_str(), name);
        }
    }

    #[test]
    fn test_invalid_role_names() {
        for name in ["", "Admin", "2fa", "_admin", "dev-ops", "super admin"] {
            assert!(
                matches!(RoleName::new(name), Err(Error::InvalidRoleName { .. })),
                "{name:?} should be rejected"
            );
        }
        assert!(RoleName::new("a".repeat(65)).is_err());
        assert!(RoleName::new("a".repeat(64)).is_ok());
    }

    #[test]
    fn test_role_name_serde_validates() {
        let ok: RoleName = serde_json::from_str("\"developer\"").unwrap();
        assert_eq!(ok.to_string(), "developer");
        assert!(serde_json::from_str::<RoleName>("\"Dev Ops\"").is_err());
    }

    #[test]
    fn test_identity_roles_deduplicate() {
        let identity = Identity::new("u1").with_roles(["admin", "developer", "admin"]);
        assert_eq!(identity.assigned_roles.len(), 2);
        assert!(identity.has_roles());
        assert!(!Identity::new("u2").has_roles());
    }
}
