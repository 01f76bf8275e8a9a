use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Permission kinds a role can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionKind {
    Create,
    Read,
    Update,
    Delete,
    #[serde(alias = "manageRoles")]
    ManageRoles,
}

impl PermissionKind {
    /// Every permission kind, in declaration order.
    pub const ALL: [PermissionKind; 5] = [
        PermissionKind::Create,
        PermissionKind::Read,
        PermissionKind::Update,
        PermissionKind::Delete,
        PermissionKind::ManageRoles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionKind::Create => "create",
            PermissionKind::Read => "read",
            PermissionKind::Update => "update",
            PermissionKind::Delete => "delete",
            PermissionKind::ManageRoles => "manage_roles",
        }
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(PermissionKind::Create),
            "read" => Ok(PermissionKind::Read),
            "update" => Ok(PermissionKind::Update),
            "delete" => Ok(PermissionKind::Delete),
            "manage_roles" | "manageRoles" => Ok(PermissionKind::ManageRoles),
            other => Err(Error::UnknownPermission(other.to_string())),
        }
    }
}

/// The fixed record a role name resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCapabilities {
    pub name: String,
    /// Rank; higher is more privileged. Level 0 is reserved for
    /// unrecognized roles.
    pub level: u32,
    pub capabilities: BTreeSet<PermissionKind>,
    pub description: String,
}

impl RoleCapabilities {
    pub fn new(
        name: impl Into<String>,
        level: u32,
        capabilities: impl IntoIterator<Item = PermissionKind>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            level,
            capabilities: capabilities.into_iter().collect(),
            description: description.into(),
        }
    }

    /// Zero-capability record for a name the table does not know.
    pub fn unrecognized(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: 0,
            capabilities: BTreeSet::new(),
            description: "unrecognized role".to_string(),
        }
    }

    pub fn grants(&self, kind: PermissionKind) -> bool {
        self.capabilities.contains(&kind)
    }

    pub fn is_recognized(&self) -> bool {
        self.level > 0
    }
}
