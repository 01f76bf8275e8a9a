//! Role-based access policy.
//!
//! Core principle: **A role grants nothing it does not list.** Every
//! permission request is answered from an immutable [`PolicyTable`] built
//! once at start-up; role names the table does not know grant no
//! capabilities at all.
//!
//! # Example
//!
//! ```
//! use policy::{PermissionKind, PolicyTable};
//!
//! let table = PolicyTable::canonical();
//!
//! let decision = table.evaluate(["developer", "admin"], PermissionKind::Delete);
//! assert!(decision.allowed);
//! assert_eq!(decision.highest_applicable_role.unwrap().name, "developer");
//!
//! assert!(!table.evaluate(["admin"], PermissionKind::Create).allowed);
//! assert!(!table.evaluate(["unknown_role_xyz"], PermissionKind::Read).allowed);
//! ```

mod capability;
mod error;
mod policy;
mod role;

pub use capability::{PermissionKind, RoleCapabilities};
pub use error::{Error, Result};
pub use policy::{Decision, PermissionSet, PolicyTable, RoleEntry};
pub use role::{Identity, RoleName};
