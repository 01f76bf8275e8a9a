//! Policy-gated operations over the store.

use policy::{Decision, PermissionKind, PolicyTable};
use storage::{NewActivity, Severity, Store};

use crate::error::{Error, Result};

/// Name recorded for commands run without `--actor`.
pub const OPERATOR: &str = "operator";

/// Couples the role table with the store and the acting principal.
///
/// Every authorization re-reads role assignments from the store.
pub struct Gate {
    table: PolicyTable,
    store: Store,
    actor: Option<String>,
}

impl Gate {
    pub fn new(table: PolicyTable, store: Store, actor: Option<String>) -> Self {
        Self {
            table,
            store,
            actor,
        }
    }

    pub fn table(&self) -> &PolicyTable {
        &self.table
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn actor(&self) -> &str {
        self.actor.as_deref().unwrap_or(OPERATOR)
    }

    /// Require the acting principal to hold `requested`.
    ///
    /// Without an actor the local operator is trusted. Denials are written
    /// to the activity log before being returned.
    pub fn require(&self, requested: PermissionKind, action: &str) -> Result<()> {
        let Some(actor) = self.actor.as_deref() else {
            return Ok(());
        };

        let roles = self.store.roles_of(actor)?;
        match self.table.authorize(&roles, requested) {
            Ok(_) => Ok(()),
            Err(err) => {
                self.record(
                    "access.denied",
                    format!("{action} requires {requested}; held roles: {roles:?}"),
                    Severity::Warning,
                )?;
                Err(err.into())
            }
        }
    }

    /// Evaluate `principal`'s current roles and record the outcome.
    ///
    /// Looking at another principal's roles needs `read`.
    pub fn check(&self, principal: &str, requested: PermissionKind) -> Result<Decision> {
        self.require(PermissionKind::Read, "permission.check")?;

        let identity = self.store.identity(principal)?;
        let decision = self.table.evaluate_identity(&identity, requested);

        let (verdict, severity) = if decision.allowed {
            ("allowed", Severity::Success)
        } else {
            ("denied", Severity::Warning)
        };
        self.store.append_activity(NewActivity::new(
            principal,
            "permission.check",
            format!("{requested} {verdict}"),
            severity,
        ))?;

        Ok(decision)
    }

    pub fn assign(&self, principal: &str, role: &str) -> Result<bool> {
        self.require(PermissionKind::ManageRoles, "role.assign")?;
        self.known_role(role)?;

        let added = self.store.assign(principal, role)?;
        if added {
            self.record(
                "role.assign",
                format!("{principal} added to {role}"),
                Severity::Success,
            )?;
        }
        Ok(added)
    }

    /// Unknown names may be revoked so stale assignments can be cleaned up.
    pub fn revoke(&self, principal: &str, role: &str) -> Result<bool> {
        self.require(PermissionKind::ManageRoles, "role.revoke")?;

        let removed = self.store.revoke(principal, role)?;
        if removed {
            self.record(
                "role.revoke",
                format!("{principal} removed from {role}"),
                Severity::Success,
            )?;
        }
        Ok(removed)
    }

    pub fn change(&self, principal: &str, from: Option<&str>, to: &str) -> Result<()> {
        self.require(PermissionKind::ManageRoles, "role.change")?;
        self.known_role(to)?;

        self.store.change_role(principal, from, to)?;
        self.record(
            "role.change",
            format!("{principal}: {} -> {to}", from.unwrap_or("none")),
            Severity::Success,
        )
    }

    pub fn clear(&self, principal: &str) -> Result<Vec<String>> {
        self.require(PermissionKind::ManageRoles, "role.clear")?;

        let removed = self.store.clear_roles(principal)?;
        self.record(
            "role.clear",
            format!("{principal} removed from {} role(s)", removed.len()),
            Severity::Info,
        )?;
        Ok(removed)
    }

    fn known_role(&self, role: &str) -> Result<()> {
        if self.table.contains(role) {
            Ok(())
        } else {
            Err(Error::UnknownRole {
                name: role.to_string(),
            })
        }
    }

    fn record(&self, action: &str, details: String, severity: Severity) -> Result<()> {
        self.store
            .append_activity(NewActivity::new(self.actor(), action, details, severity))?;
        Ok(())
    }
}
