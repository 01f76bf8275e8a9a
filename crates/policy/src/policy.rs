//! Role table configuration and permission evaluation.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Identity, PermissionKind, Result, RoleCapabilities, RoleName};

/// One `[[roles]]` entry of a role table file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEntry {
    pub name: RoleName,
    pub level: u32,
    #[serde(default)]
    pub capabilities: BTreeSet<PermissionKind>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct TableFile {
    #[serde(default)]
    roles: Vec<RoleEntry>,
}

/// Immutable table mapping role names to their capabilities.
///
/// Built once at start-up and shared by reference; there is no API to
/// change a table after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTable {
    roles: BTreeMap<RoleName, RoleCapabilities>,
}

/// Result of evaluating a permission request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub requested: PermissionKind,
    /// The assigned role with the greatest level. Informational only;
    /// `allowed` is decided per capability, not by level threshold.
    pub highest_applicable_role: Option<RoleCapabilities>,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }
}

/// Every permission a role set grants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PermissionSet {
    pub can_create: bool,
    pub can_read: bool,
    pub can_update: bool,
    pub can_delete: bool,
    pub can_manage_roles: bool,
}

impl PermissionSet {
    pub fn allows(&self, kind: PermissionKind) -> bool {
        match kind {
            PermissionKind::Create => self.can_create,
            PermissionKind::Read => self.can_read,
            PermissionKind::Update => self.can_update,
            PermissionKind::Delete => self.can_delete,
            PermissionKind::ManageRoles => self.can_manage_roles,
        }
    }
}

impl FromIterator<PermissionKind> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = PermissionKind>>(iter: I) -> Self {
        let mut set = PermissionSet::default();
        for kind in iter {
            match kind {
                PermissionKind::Create => set.can_create = true,
                PermissionKind::Read => set.can_read = true,
                PermissionKind::Update => set.can_update = true,
                PermissionKind::Delete => set.can_delete = true,
                PermissionKind::ManageRoles => set.can_manage_roles = true,
            }
        }
        set
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::canonical()
    }
}

impl PolicyTable {
    /// The built-in three-role table.
    pub fn canonical() -> Self {
        use PermissionKind::*;

        let roles = [
            (
                "super_admin",
                RoleCapabilities::new(
                    "super_admin",
                    3,
                    [Create, Read, Update, Delete, ManageRoles],
                    "full access including role management",
                ),
            ),
            (
                "developer",
                RoleCapabilities::new(
                    "developer",
                    2,
                    [Create, Read, Update, Delete],
                    "full CRUD on users, cannot manage roles",
                ),
            ),
            (
                "admin",
                RoleCapabilities::new("admin", 1, [Read], "read-only access"),
            ),
        ];

        Self {
            roles: roles
                .into_iter()
                .map(|(name, record)| (RoleName::trusted(name), record))
                .collect(),
        }
    }

    /// Build a table from role entries.
    ///
    /// Names must be unique and levels non-zero; an empty list is rejected.
    pub fn from_roles(entries: impl IntoIterator<Item = RoleEntry>) -> Result<Self> {
        let mut roles = BTreeMap::new();

        for entry in entries {
            if entry.level == 0 {
                return Err(Error::Invalid(format!(
                    "role '{}' has level 0, which is reserved for unrecognized roles",
                    entry.name
                )));
            }
            if roles.contains_key(&entry.name) {
                return Err(Error::Invalid(format!(
                    "role '{}' is defined more than once",
                    entry.name
                )));
            }
            let record = RoleCapabilities {
                name: entry.name.to_string(),
                level: entry.level,
                capabilities: entry.capabilities,
                description: entry.description,
            };
            roles.insert(entry.name, record);
        }

        if roles.is_empty() {
            return Err(Error::Invalid("no roles defined".to_string()));
        }

        Ok(Self { roles })
    }

    /// Load a role table from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse a role table from a TOML string.
    pub fn parse(toml: &str) -> Result<Self> {
        let file: TableFile = toml::from_str(toml).map_err(|e| Error::Parse(e.to_string()))?;
        Self::from_roles(file.roles)
    }

    /// Look up a role record. Unknown names get a zero-capability record.
    pub fn capabilities_of(&self, name: &str) -> RoleCapabilities {
        self.roles
            .get(name)
            .cloned()
            .unwrap_or_else(|| RoleCapabilities::unrecognized(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    }

    /// All records, most privileged first.
    pub fn roles(&self) -> Vec<&RoleCapabilities> {
        let mut roles: Vec<_> = self.roles.values().collect();
        roles.sort_by(|a, b| b.level.cmp(&a.level).then_with(|| a.name.cmp(&b.name)));
        roles
    }

    /// Records that grant `kind`, most privileged first.
    pub fn roles_granting(&self, kind: PermissionKind) -> Vec<&RoleCapabilities> {
        self.roles()
            .into_iter()
            .filter(|r| r.grants(kind))
            .collect()
    }

    /// Decide whether `assigned_roles` satisfies `requested`.
    ///
    /// Allowed iff some assigned role is in the table and grants the
    /// permission. Names the table does not know grant nothing.
    pub fn evaluate<I, S>(&self, assigned_roles: I, requested: PermissionKind) -> Decision
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let records: Vec<RoleCapabilities> = assigned_roles
            .into_iter()
            .map(|name| self.capabilities_of(name.as_ref()))
            .collect();

        let allowed = records.iter().any(|r| r.grants(requested));
        // Level descending, then name ascending.
        let highest_applicable_role = records
            .into_iter()
            .min_by(|a, b| b.level.cmp(&a.level).then_with(|| a.name.cmp(&b.name)));

        tracing::debug!(
            %requested,
            allowed,
            highest = highest_applicable_role.as_ref().map(|r| r.name.as_str()),
            "evaluated permission"
        );

        Decision {
            allowed,
            requested,
            highest_applicable_role,
        }
    }

    pub fn evaluate_identity(&self, identity: &Identity, requested: PermissionKind) -> Decision {
        self.evaluate(&identity.assigned_roles, requested)
    }

    /// Evaluate and turn a denial into [`Error::Denied`].
    pub fn authorize<I, S>(&self, assigned_roles: I, requested: PermissionKind) -> Result<Decision>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let decision = self.evaluate(assigned_roles, requested);
        if decision.allowed {
            Ok(decision)
        } else {
            tracing::warn!(%requested, "permission denied");
            Err(Error::Denied {
                requested,
                required: self
                    .roles_granting(requested)
                    .into_iter()
                    .map(|r| r.name.clone())
                    .collect(),
            })
        }
    }

    /// Union of the permissions granted by `assigned_roles`.
    pub fn permissions_for<I, S>(&self, assigned_roles: I) -> PermissionSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        assigned_roles
            .into_iter()
            .flat_map(|name| self.capabilities_of(name.as_ref()).capabilities)
            .collect()
    }
}
