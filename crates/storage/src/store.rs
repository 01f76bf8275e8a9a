//! SQLite store implementation.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use policy::Identity;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use std::collections::BTreeMap;
use std::path::Path;

use crate::{
    ActivityLog, ActivityUpdate, Error, LogFilter, LogId, LogPage, LogStats, NewActivity, Result,
    Severity, SortOrder,
};

const ACTIVITY_COLUMNS: &str = "id, principal, action, details, severity, timestamp";

/// A role held by a principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub principal: String,
    pub role: String,
    pub assigned_at: DateTime<Utc>,
}

/// SQLite-backed store for role assignments and the activity log.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS role_assignments (
                principal TEXT NOT NULL,
                role TEXT NOT NULL,
                assigned_at TEXT NOT NULL,
                PRIMARY KEY (principal, role)
            );
            CREATE INDEX IF NOT EXISTS idx_assignments_role
                ON role_assignments(role);

            CREATE TABLE IF NOT EXISTS activity_log (
                id TEXT PRIMARY KEY,
                principal TEXT NOT NULL,
                action TEXT NOT NULL,
                details TEXT NOT NULL,
                severity TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_activity_timestamp
                ON activity_log(timestamp);
            "#,
        )?;
        Ok(())
    }

    // Role assignments

    /// Give `principal` a role. Returns `false` if it was already held.
    pub fn assign(&self, principal: &str, role: &str) -> Result<bool> {
        require("principal", principal)?;
        require("role", role)?;
        let inserted = insert_assignment(&self.conn, principal, role)?;
        if inserted {
            tracing::info!(principal, role, "role assigned");
        }
        Ok(inserted)
    }

    /// Take a role away from `principal`. Returns `false` if it was not held.
    pub fn revoke(&self, principal: &str, role: &str) -> Result<bool> {
        let removed = delete_assignment(&self.conn, principal, role)?;
        if removed {
            tracing::info!(principal, role, "role revoked");
        }
        Ok(removed)
    }

    /// Replace `from` (if any) with `to` in a single transaction.
    pub fn change_role(&self, principal: &str, from: Option<&str>, to: &str) -> Result<()> {
        require("principal", principal)?;
        require("role", to)?;

        let tx = self.conn.unchecked_transaction()?;
        if let Some(from) = from {
            delete_assignment(&tx, principal, from)?;
        }
        insert_assignment(&tx, principal, to)?;
        tx.commit()?;

        tracing::info!(principal, from, to, "role changed");
        Ok(())
    }

    /// Remove every role from `principal`, returning the removed names.
    pub fn clear_roles(&self, principal: &str) -> Result<Vec<String>> {
        let tx = self.conn.unchecked_transaction()?;
        let removed = select_strings(
            &tx,
            "SELECT role FROM role_assignments WHERE principal = ?1 ORDER BY role",
            principal,
        )?;
        tx.execute(
            "DELETE FROM role_assignments WHERE principal = ?1",
            [principal],
        )?;
        tx.commit()?;

        tracing::info!(principal, count = removed.len(), "roles cleared");
        Ok(removed)
    }

    /// Roles currently held by `principal`, sorted.
    pub fn roles_of(&self, principal: &str) -> Result<Vec<String>> {
        select_strings(
            &self.conn,
            "SELECT role FROM role_assignments WHERE principal = ?1 ORDER BY role",
            principal,
        )
    }

    /// Principals holding `role`, sorted.
    pub fn members_of(&self, role: &str) -> Result<Vec<String>> {
        select_strings(
            &self.conn,
            "SELECT principal FROM role_assignments WHERE role = ?1 ORDER BY principal",
            role,
        )
    }

    /// Every principal holding at least one role.
    pub fn principals(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT principal FROM role_assignments ORDER BY principal")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    /// Full assignment rows for `principal`.
    pub fn assignments(&self, principal: &str) -> Result<Vec<Assignment>> {
        let mut stmt = self.conn.prepare(
            "SELECT principal, role, assigned_at FROM role_assignments
             WHERE principal = ?1 ORDER BY role",
        )?;
        let rows = stmt.query_map([principal], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut assignments = Vec::new();
        for row in rows {
            let (principal, role, assigned_at) = row?;
            assignments.push(Assignment {
                principal,
                role,
                assigned_at: parse_timestamp(&assigned_at)?,
            });
        }
        Ok(assignments)
    }

    /// Number of principals holding each role that has any members.
    pub fn role_counts(&self) -> Result<BTreeMap<String, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT role, COUNT(*) FROM role_assignments GROUP BY role")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let (role, count) = row?;
            counts.insert(role, count as u64);
        }
        Ok(counts)
    }

    /// Principals seen in the activity log that hold no role, sorted.
    pub fn principals_without_roles(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT principal FROM activity_log
             WHERE principal NOT IN (SELECT principal FROM role_assignments)
             ORDER BY principal",
        )?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    /// A fresh snapshot of `principal`'s roles for evaluation.
    pub fn identity(&self, principal: &str) -> Result<Identity> {
        Ok(Identity::new(principal).with_roles(self.roles_of(principal)?))
    }

    // Activity log

    /// Append an activity entry.
    pub fn append_activity(&self, activity: NewActivity) -> Result<ActivityLog> {
        require("principal", &activity.principal)?;
        require("action", &activity.action)?;
        require("details", &activity.details)?;

        let log = ActivityLog {
            id: LogId::new(),
            principal: activity.principal,
            action: activity.action,
            details: activity.details,
            severity: activity.severity,
            timestamp: stored_precision(activity.timestamp.unwrap_or_else(Utc::now)),
        };

        self.conn.execute(
            "INSERT INTO activity_log (id, principal, action, details, severity, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                log.id.to_string(),
                log.principal,
                log.action,
                log.details,
                log.severity.as_str(),
                format_timestamp(&log.timestamp),
            ],
        )?;
        Ok(log)
    }

    /// Load a single activity entry.
    pub fn activity(&self, id: LogId) -> Result<ActivityLog> {
        let sql = format!("SELECT {ACTIVITY_COLUMNS} FROM activity_log WHERE id = ?1");
        let raw = self
            .conn
            .query_row(&sql, [id.to_string()], RawActivity::from_row)
            .optional()?;
        raw.ok_or_else(|| Error::NotFound(format!("activity log {id}")))?
            .into_activity()
    }

    /// List activity matching `filter`, one page at a time.
    pub fn list_activity(&self, filter: &LogFilter) -> Result<LogPage> {
        if filter.limit == 0 {
            return Err(Error::InvalidFilter("limit must be at least 1".to_string()));
        }
        if filter.page == 0 {
            return Err(Error::InvalidFilter("page numbers start at 1".to_string()));
        }

        let (clause, mut values) = where_clause(filter);

        let count_sql = format!("SELECT COUNT(*) FROM activity_log{clause}");
        let total: i64 = self
            .conn
            .query_row(&count_sql, params_from_iter(values.iter()), |row| row.get(0))?;
        let total = total as u64;

        let direction = match filter.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        let offset = (u64::from(filter.page) - 1) * u64::from(filter.limit);
        let items = if offset >= total {
            Vec::new()
        } else {
            let offset = i64::try_from(offset)
                .map_err(|_| Error::InvalidFilter(format!("page {} is out of range", filter.page)))?;
            let sql = format!(
                "SELECT {ACTIVITY_COLUMNS} FROM activity_log{clause}
                 ORDER BY timestamp {direction}, id {direction} LIMIT ? OFFSET ?"
            );
            values.push(Value::Integer(i64::from(filter.limit)));
            values.push(Value::Integer(offset));

            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), RawActivity::from_row)?;
            rows.map(|raw| raw?.into_activity())
                .collect::<Result<Vec<_>>>()?
        };

        Ok(LogPage {
            items,
            total,
            page: filter.page,
            limit: filter.limit,
            total_pages: total.div_ceil(u64::from(filter.limit)),
        })
    }

    /// Change fields of an existing entry, returning the stored result.
    pub fn update_activity(&self, id: LogId, update: ActivityUpdate) -> Result<ActivityLog> {
        if update.is_empty() {
            return Err(Error::MissingField("updates"));
        }

        let mut log = self.activity(id)?.updated(update);
        require("principal", &log.principal)?;
        require("action", &log.action)?;
        require("details", &log.details)?;
        log.timestamp = stored_precision(log.timestamp);

        self.conn.execute(
            "UPDATE activity_log
             SET principal = ?2, action = ?3, details = ?4, severity = ?5, timestamp = ?6
             WHERE id = ?1",
            params![
                log.id.to_string(),
                log.principal,
                log.action,
                log.details,
                log.severity.as_str(),
                format_timestamp(&log.timestamp),
            ],
        )?;

        tracing::info!(id = %log.id, "activity updated");
        Ok(log)
    }

    /// Delete one entry, returning it.
    pub fn delete_activity(&self, id: LogId) -> Result<ActivityLog> {
        let log = self.activity(id)?;
        self.conn
            .execute("DELETE FROM activity_log WHERE id = ?1", [id.to_string()])?;
        Ok(log)
    }

    /// Delete several entries, returning how many existed.
    pub fn delete_activities(&self, ids: &[LogId]) -> Result<usize> {
        if ids.is_empty() {
            return Err(Error::MissingField("ids"));
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut deleted = 0;
        for id in ids {
            deleted += tx.execute("DELETE FROM activity_log WHERE id = ?1", [id.to_string()])?;
        }
        tx.commit()?;
        Ok(deleted)
    }

    /// Total entries and a count per severity.
    pub fn activity_stats(&self) -> Result<LogStats> {
        let mut stats = LogStats {
            total: 0,
            by_severity: Severity::ALL.iter().map(|s| (*s, 0)).collect(),
        };

        let mut stmt = self
            .conn
            .prepare("SELECT severity, COUNT(*) FROM activity_log GROUP BY severity")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (severity, count) = row?;
            let severity: Severity = severity
                .parse()
                .map_err(|_| Error::Corrupt(format!("severity '{severity}'")))?;
            stats.by_severity.insert(severity, count as u64);
            stats.total += count as u64;
        }
        Ok(stats)
    }
}

struct RawActivity {
    id: String,
    principal: String,
    action: String,
    details: String,
    severity: String,
    timestamp: String,
}

impl RawActivity {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            principal: row.get(1)?,
            action: row.get(2)?,
            details: row.get(3)?,
            severity: row.get(4)?,
            timestamp: row.get(5)?,
        })
    }

    fn into_activity(self) -> Result<ActivityLog> {
        let id = self
            .id
            .parse()
            .map(LogId)
            .map_err(|_| Error::Corrupt(format!("activity id '{}'", self.id)))?;
        let severity = self
            .severity
            .parse()
            .map_err(|_| Error::Corrupt(format!("severity '{}'", self.severity)))?;

        Ok(ActivityLog {
            id,
            principal: self.principal,
            action: self.action,
            details: self.details,
            severity,
            timestamp: parse_timestamp(&self.timestamp)?,
        })
    }
}

fn where_clause(filter: &LogFilter) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    if let Some(principal) = &filter.principal {
        conditions.push("instr(principal, ?) > 0");
        values.push(Value::Text(principal.clone()));
    }
    if let Some(action) = &filter.action {
        conditions.push("instr(action, ?) > 0");
        values.push(Value::Text(action.clone()));
    }
    if let Some(severity) = filter.severity {
        conditions.push("severity = ?");
        values.push(Value::Text(severity.as_str().to_string()));
    }
    if let Some(start) = &filter.start {
        conditions.push("timestamp >= ?");
        values.push(Value::Text(format_timestamp(start)));
    }
    if let Some(end) = &filter.end {
        conditions.push("timestamp <= ?");
        values.push(Value::Text(format_timestamp(end)));
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), values)
    }
}

fn insert_assignment(conn: &Connection, principal: &str, role: &str) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO role_assignments (principal, role, assigned_at)
         VALUES (?1, ?2, ?3)",
        params![principal, role, format_timestamp(&Utc::now())],
    )?;
    Ok(inserted > 0)
}

fn delete_assignment(conn: &Connection, principal: &str, role: &str) -> Result<bool> {
    let removed = conn.execute(
        "DELETE FROM role_assignments WHERE principal = ?1 AND role = ?2",
        params![principal, role],
    )?;
    Ok(removed > 0)
}

fn select_strings(conn: &Connection, sql: &str, arg: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([arg], |row| row.get(0))?;
    Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
}

fn require(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::MissingField(field))
    } else {
        Ok(())
    }
}

// Timestamps are stored to the microsecond.
fn stored_precision(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}

// Fixed-width UTC so that text comparison matches time order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| Error::Corrupt(format!("timestamp '{s}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use policy::{PermissionKind, PolicyTable};

    fn store() -> Store {
        Store::in_memory().unwrap()
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, minute, 0).unwrap()
    }

    #[test]
    fn test_assign_and_revoke() {
        let store = store();
        assert!(store.assign("u1", "admin").unwrap());
        assert!(!store.assign("u1", "admin").unwrap());
        assert!(store.assign("u1", "developer").unwrap());

        assert_eq!(store.roles_of("u1").unwrap(), ["admin", "developer"]);
        assert!(store.revoke("u1", "admin").unwrap());
        assert!(!store.revoke("u1", "admin").unwrap());
        assert_eq!(store.roles_of("u1").unwrap(), ["developer"]);
    }

    #[test]
    fn test_assign_requires_fields() {
        let store = store();
        assert!(matches!(
            store.assign("", "admin"),
            Err(Error::MissingField("principal"))
        ));
        assert!(matches!(
            store.assign("u1", " "),
            Err(Error::MissingField("role"))
        ));
    }

    #[test]
    fn test_change_role() {
        let store = store();
        store.assign("u1", "admin").unwrap();

        store.change_role("u1", Some("admin"), "developer").unwrap();
        assert_eq!(store.roles_of("u1").unwrap(), ["developer"]);

        store.change_role("u1", None, "super_admin").unwrap();
        assert_eq!(store.roles_of("u1").unwrap(), ["developer", "super_admin"]);
    }

    #[test]
    fn test_clear_roles() {
        let store = store();
        store.assign("u1", "admin").unwrap();
        store.assign("u1", "developer").unwrap();
        store.assign("u2", "admin").unwrap();

        assert_eq!(store.clear_roles("u1").unwrap(), ["admin", "developer"]);
        assert!(store.roles_of("u1").unwrap().is_empty());
        assert!(store.clear_roles("u1").unwrap().is_empty());
        assert_eq!(store.principals().unwrap(), ["u2"]);
    }

    #[test]
    fn test_members_and_principals() {
        let store = store();
        store.assign("carol", "admin").unwrap();
        store.assign("alice", "admin").unwrap();
        store.assign("bob", "developer").unwrap();

        assert_eq!(store.members_of("admin").unwrap(), ["alice", "carol"]);
        assert_eq!(store.principals().unwrap(), ["alice", "bob", "carol"]);

        let assignments = store.assignments("bob").unwrap();
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].role, "developer");
    }

    #[test]
    fn test_identity_feeds_evaluator() {
        let store = store();
        store.assign("u1", "developer").unwrap();
        store.assign("u1", "admin").unwrap();

        let table = PolicyTable::canonical();
        let decision = table.evaluate_identity(&store.identity("u1").unwrap(), PermissionKind::Delete);
        assert!(decision.allowed);
        assert_eq!(decision.highest_applicable_role.unwrap().name, "developer");

        let nobody = store.identity("u404").unwrap();
        assert!(!nobody.has_roles());
        assert!(!table.evaluate_identity(&nobody, PermissionKind::Read).allowed);
    }

    #[test]
    fn test_append_and_load_activity() {
        let store = store();
        let log = store
            .append_activity(
                NewActivity::new("u1", "login", "signed in", Severity::Success).at(at(0)),
            )
            .unwrap();

        let loaded = store.activity(log.id).unwrap();
        assert_eq!(loaded, log);
        assert_eq!(loaded.timestamp, at(0));
    }

    #[test]
    fn test_appended_entry_matches_stored_entry() {
        let store = store();
        let log = store
            .append_activity(NewActivity::new("u1", "login", "x", Severity::Info))
            .unwrap();

        assert_eq!(log.timestamp.timestamp_subsec_nanos() % 1_000, 0);
        assert_eq!(store.activity(log.id).unwrap(), log);

        let page = store.list_activity(&LogFilter::default()).unwrap();
        assert_eq!(page.items, [log]);
    }

    #[test]
    fn test_append_requires_fields() {
        let store = store();
        let result = store.append_activity(NewActivity::new("u1", "", "x", Severity::Info));
        assert!(matches!(result, Err(Error::MissingField("action"))));
    }

    #[test]
    fn test_missing_activity() {
        let store = store();
        assert!(matches!(
            store.activity(LogId::new()),
            Err(Error::NotFound(_))
        ));
    }

    fn seed(store: &Store) {
        let entries = [
            ("alice", "user.create", Severity::Success),
            ("alice", "user.delete", Severity::Warning),
            ("bob", "user.read", Severity::Info),
            ("bob", "user.delete", Severity::Error),
            ("carol", "role.assign", Severity::Success),
        ];
        for (minute, (principal, action, severity)) in entries.into_iter().enumerate() {
            store
                .append_activity(
                    NewActivity::new(principal, action, "seeded", severity).at(at(minute as u32)),
                )
                .unwrap();
        }
    }

    #[test]
    fn test_list_activity_pages_newest_first() {
        let store = store();
        seed(&store);

        let filter = LogFilter {
            limit: 2,
            ..Default::default()
        };
        let page = store.list_activity(&filter).unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 3);
        let actions: Vec<_> = page.items.iter().map(|l| l.action.as_str()).collect();
        assert_eq!(actions, ["role.assign", "user.delete"]);

        let last = store
            .list_activity(&LogFilter {
                page: 3,
                ..filter.clone()
            })
            .unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].action, "user.create");
    }

    #[test]
    fn test_list_activity_filters() {
        let store = store();
        seed(&store);

        let deletes = store
            .list_activity(&LogFilter {
                action: Some("delete".to_string()),
                order: SortOrder::Asc,
                ..Default::default()
            })
            .unwrap();
        let principals: Vec<_> = deletes.items.iter().map(|l| l.principal.as_str()).collect();
        assert_eq!(principals, ["alice", "bob"]);

        let errors = store
            .list_activity(&LogFilter {
                severity: Some(Severity::Error),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(errors.total, 1);
        assert_eq!(errors.items[0].principal, "bob");

        let window = store
            .list_activity(&LogFilter {
                principal: Some("b".to_string()),
                start: Some(at(1)),
                end: Some(at(2)),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(window.total, 1);
        assert_eq!(window.items[0].action, "user.read");
    }

    #[test]
    fn test_list_activity_rejects_bad_paging() {
        let store = store();
        for filter in [
            LogFilter {
                limit: 0,
                ..Default::default()
            },
            LogFilter {
                page: 0,
                ..Default::default()
            },
        ] {
            assert!(matches!(
                store.list_activity(&filter),
                Err(Error::InvalidFilter(_))
            ));
        }
    }

    #[test]
    fn test_list_activity_past_the_end_is_empty() {
        let store = store();
        seed(&store);

        let beyond = store
            .list_activity(&LogFilter {
                page: 4,
                limit: 2,
                ..Default::default()
            })
            .unwrap();
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total, 5);

        let huge = store
            .list_activity(&LogFilter {
                page: u32::MAX,
                limit: u32::MAX,
                ..Default::default()
            })
            .unwrap();
        assert!(huge.items.is_empty());
        assert_eq!(huge.total, 5);
        assert_eq!(huge.total_pages, 1);
    }

    #[test]
    fn test_update_activity() {
        let store = store();
        let log = store
            .append_activity(NewActivity::new("u1", "login", "signed in", Severity::Info).at(at(0)))
            .unwrap();

        let later = at(5) + Duration::nanoseconds(1_234_567);
        let updated = store
            .update_activity(
                log.id,
                ActivityUpdate {
                    severity: Some(Severity::Warning),
                    timestamp: Some(later),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.action, "login");
        assert_eq!(updated.severity, Severity::Warning);
        assert_eq!(updated.timestamp, at(5) + Duration::microseconds(1_234));
        assert_eq!(store.activity(log.id).unwrap(), updated);
    }

    #[test]
    fn test_update_activity_rejects_bad_input() {
        let store = store();
        let log = store
            .append_activity(NewActivity::new("u1", "login", "x", Severity::Info))
            .unwrap();

        assert!(matches!(
            store.update_activity(log.id, ActivityUpdate::default()),
            Err(Error::MissingField("updates"))
        ));
        assert!(matches!(
            store.update_activity(
                log.id,
                ActivityUpdate {
                    action: Some(" ".to_string()),
                    ..Default::default()
                }
            ),
            Err(Error::MissingField("action"))
        ));
        assert!(matches!(
            store.update_activity(
                LogId::new(),
                ActivityUpdate {
                    details: Some("y".to_string()),
                    ..Default::default()
                }
            ),
            Err(Error::NotFound(_))
        ));
        assert_eq!(store.activity(log.id).unwrap(), log);
    }

    #[test]
    fn test_role_counts_and_unassigned_principals() {
        let store = store();
        assert!(store.role_counts().unwrap().is_empty());

        store.assign("alice", "admin").unwrap();
        store.assign("bob", "admin").unwrap();
        store.assign("bob", "developer").unwrap();
        store.assign("carol", "legacy_role").unwrap();
        seed(&store);

        let counts = store.role_counts().unwrap();
        assert_eq!(counts.len(), 3);
        assert_eq!(counts["admin"], 2);
        assert_eq!(counts["developer"], 1);
        assert_eq!(counts["legacy_role"], 1);

        store.append_activity(NewActivity::new("dave", "login", "x", Severity::Info)).unwrap();
        store.clear_roles("carol").unwrap();
        assert_eq!(store.principals_without_roles().unwrap(), ["carol", "dave"]);
    }

    #[test]
    fn test_delete_activity() {
        let store = store();
        let log = store
            .append_activity(NewActivity::new("u1", "login", "x", Severity::Info))
            .unwrap();
        let other = store
            .append_activity(NewActivity::new("u1", "logout", "x", Severity::Info))
            .unwrap();

        assert_eq!(store.delete_activity(log.id).unwrap().action, "login");
        assert!(matches!(
            store.delete_activity(log.id),
            Err(Error::NotFound(_))
        ));

        assert_eq!(
            store.delete_activities(&[other.id, LogId::new()]).unwrap(),
            1
        );
        assert!(matches!(
            store.delete_activities(&[]),
            Err(Error::MissingField("ids"))
        ));
    }

    #[test]
    fn test_activity_stats() {
        let store = store();
        assert_eq!(store.activity_stats().unwrap().total, 0);

        seed(&store);
        let stats = store.activity_stats().unwrap();
        assert_eq!(stats.total, 5);
        assert_eq!(stats.by_severity[&Severity::Success], 2);
        assert_eq!(stats.by_severity[&Severity::Info], 1);
        assert_eq!(stats.by_severity[&Severity::Warning], 1);
        assert_eq!(stats.by_severity[&Severity::Error], 1);
    }

    #[test]
    fn test_timestamps_order_as_text() {
        let early = at(0);
        let late = early + Duration::microseconds(1);
        assert!(format_timestamp(&early) < format_timestamp(&late));
    }

    #[test]
    fn test_store_persists_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rolegate.db");

        {
            let store = Store::open(&path).unwrap();
            store.assign("u1", "admin").unwrap();
        }

        let store = Store::open(&path).unwrap();
        assert_eq!(store.roles_of("u1").unwrap(), ["admin"]);
    }
}
