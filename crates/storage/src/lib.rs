//! SQLite-backed persistence for role assignments and the activity log.
//!
//! The policy evaluator performs no I/O of its own; this crate is where its
//! callers fetch an identity's current roles before every check, and where
//! audited actions are written.
//!
//! # Core Concepts
//!
//! ## Store
//!
//! The [`Store`] wraps a SQLite database. Role assignments are plain
//! `(principal, role)` rows; the store does not interpret role names, so an
//! assignment of a name the role table does not know is kept and simply
//! grants nothing at evaluation time.
//!
//! ## ActivityLog
//!
//! An [`ActivityLog`] entry records who did what, with a [`Severity`] and a
//! timestamp. Entries are listed through a [`LogFilter`] and come back one
//! [`LogPage`] at a time.
//!
//! # Example
//!
//! ```no_run
//! use policy::{PermissionKind, PolicyTable};
//! use storage::{LogFilter, NewActivity, Severity, Store};
//!
//! let store = Store::open("rolegate.db")?;
//! store.assign("u-1001", "developer")?;
//!
//! let table = PolicyTable::canonical();
//! let identity = store.identity("u-1001")?;
//! let decision = table.evaluate_identity(&identity, PermissionKind::Delete);
//!
//! store.append_activity(NewActivity::new(
//!     &identity.id,
//!     "user.delete",
//!     format!("allowed: {}", decision.allowed),
//!     Severity::Info,
//! ))?;
//!
//! let page = store.list_activity(&LogFilter::default())?;
//! println!("{} entries", page.total);
//! # Ok::<(), storage::Error>(())
//! ```

mod activity;
mod error;
mod store;

pub use activity::{
    ActivityLog, ActivityUpdate, LogFilter, LogId, LogPage, LogStats, NewActivity, Severity,
    SortOrder,
};
pub use error::{Error, Result};
pub use store::{Assignment, Store};
