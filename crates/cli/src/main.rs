mod config;
mod error;
mod gate;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use policy::{Decision, PermissionKind, PolicyTable, RoleCapabilities};
use storage::{ActivityLog, ActivityUpdate, LogFilter, LogId, Severity, SortOrder, Store};
use tracing_subscriber::EnvFilter;

use config::{Config, default_data_dir};
use error::{Error, Result};
use gate::Gate;

const CONFIG_FILE: &str = "rolegate.toml";

#[derive(Parser)]
#[command(name = "rolegate")]
#[command(about = "Role-based access control for users and activity logs", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Act as this principal; the command is authorized against its roles
    #[arg(long, global = true)]
    actor: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the role table
    Roles,
    /// Check whether a principal or a set of roles holds a permission
    Check {
        /// Permission to check (create, read, update, delete, manage_roles)
        #[arg(short, long)]
        action: PermissionKind,
        /// Principal whose stored roles are checked
        #[arg(short, long, conflicts_with = "role")]
        principal: Option<String>,
        /// Role to check with (repeatable)
        #[arg(short, long)]
        role: Vec<String>,
    },
    /// Show a principal's roles and permissions
    Permissions {
        #[arg(short, long)]
        principal: String,
    },
    /// Add a principal to a role
    Assign {
        #[arg(short, long)]
        principal: String,
        #[arg(short, long)]
        role: String,
    },
    /// Remove a principal from a role
    Revoke {
        #[arg(short, long)]
        principal: String,
        #[arg(short, long)]
        role: String,
    },
    /// Move a principal from one role to another
    Change {
        #[arg(short, long)]
        principal: String,
        /// Role to leave (omit to only add)
        #[arg(long)]
        from: Option<String>,
        /// Role to join
        #[arg(long)]
        to: String,
    },
    /// Remove every role from a principal
    Clear {
        #[arg(short, long)]
        principal: String,
    },
    /// List the principals holding a role
    Members {
        #[arg(short, long)]
        role: String,
    },
    /// List every principal with at least one role
    Principals,
    /// Show activity log entries
    Logs {
        /// Principal substring
        #[arg(short, long)]
        principal: Option<String>,
        /// Action substring
        #[arg(short, long)]
        action: Option<String>,
        /// success, info, warning or error
        #[arg(short, long)]
        severity: Option<Severity>,
        /// Only entries at or after this RFC 3339 time
        #[arg(long)]
        since: Option<DateTime<Utc>>,
        /// Only entries at or before this RFC 3339 time
        #[arg(long)]
        until: Option<DateTime<Utc>>,
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(short, long, default_value = "10")]
        limit: u32,
        /// Oldest first
        #[arg(long)]
        asc: bool,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Show member counts per role and principals without roles
    RoleStats,
    /// Show activity counts by severity
    Stats,
    /// Change fields of an activity log entry
    LogUpdate {
        id: String,
        #[arg(long)]
        principal: Option<String>,
        #[arg(long)]
        action: Option<String>,
        #[arg(long)]
        details: Option<String>,
        /// success, info, warning or error
        #[arg(long)]
        severity: Option<Severity>,
        /// RFC 3339 time
        #[arg(long)]
        timestamp: Option<DateTime<Utc>>,
    },
    /// Delete activity log entries
    LogDelete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli.config)?;
    let table = config.policy_table()?;
    let actor = cli.actor;

    // Only opened by commands that need stored state.
    let connect = |table: PolicyTable| -> Result<Gate> {
        let db_path = config.database_path(
            std::env::var_os("ROLEGATE_DB").map(PathBuf::from),
            default_data_dir(),
        );
        Ok(Gate::new(table, open_store(&db_path)?, actor.clone()))
    };

    match cli.command {
        Commands::Roles => cmd_roles(&table),
        Commands::Check {
            action,
            principal: None,
            role,
        } => return cmd_check_roles(&table, &role, action),
        Commands::Check {
            action,
            principal: Some(principal),
            ..
        } => {
            let gate = connect(table)?;
            let decision = gate.check(&principal, action)?;
            println!("Principal: {principal}");
            return Ok(print_decision(gate.table(), &decision));
        }
        Commands::Permissions { principal } => cmd_permissions(&connect(table)?, &principal)?,
        Commands::Assign { principal, role } => {
            if connect(table)?.assign(&principal, &role)? {
                println!("Added {principal} to {role}.");
            } else {
                println!("{principal} already holds {role}.");
            }
        }
        Commands::Revoke { principal, role } => {
            if connect(table)?.revoke(&principal, &role)? {
                println!("Removed {principal} from {role}.");
            } else {
                println!("{principal} does not hold {role}.");
            }
        }
        Commands::Change {
            principal,
            from,
            to,
        } => {
            connect(table)?.change(&principal, from.as_deref(), &to)?;
            println!(
                "Changed {principal}: {} -> {to}.",
                from.as_deref().unwrap_or("none")
            );
        }
        Commands::Clear { principal } => {
            let removed = connect(table)?.clear(&principal)?;
            if removed.is_empty() {
                println!("{principal} held no roles.");
            } else {
                println!("Removed {principal} from: {}", removed.join(", "));
            }
        }
        Commands::Members { role } => {
            let gate = connect(table)?;
            gate.require(PermissionKind::Read, "members")?;
            print_list(&gate.store().members_of(&role)?, "No principals hold that role.");
        }
        Commands::Principals => {
            let gate = connect(table)?;
            gate.require(PermissionKind::Read, "principals")?;
            print_list(&gate.store().principals()?, "No principals have roles.");
        }
        Commands::RoleStats => cmd_role_stats(&connect(table)?)?,
        Commands::Logs {
            principal,
            action,
            severity,
            since,
            until,
            page,
            limit,
            asc,
            json,
        } => {
            let gate = connect(table)?;
            gate.require(PermissionKind::Read, "logs")?;
            let filter = LogFilter {
                principal,
                action,
                severity,
                start: since,
                end: until,
                page,
                limit,
                order: if asc { SortOrder::Asc } else { SortOrder::Desc },
            };
            cmd_logs(&gate, &filter, json)?;
        }
        Commands::Stats => {
            let gate = connect(table)?;
            gate.require(PermissionKind::Read, "stats")?;
            let stats = gate.store().activity_stats()?;
            println!("{:<10}  {}", "SEVERITY", "COUNT");
            for (severity, count) in &stats.by_severity {
                println!("{:<10}  {count}", severity.as_str());
            }
            println!("{:<10}  {}", "total", stats.total);
        }
        Commands::LogUpdate {
            id,
            principal,
            action,
            details,
            severity,
            timestamp,
        } => {
            let gate = connect(table)?;
            gate.require(PermissionKind::Update, "log-update")?;
            let update = ActivityUpdate {
                principal,
                action,
                details,
                severity,
                timestamp,
            };
            let log = gate.store().update_activity(id.parse::<LogId>()?, update)?;
            print_activity(&log);
        }
        Commands::LogDelete { ids } => {
            let gate = connect(table)?;
            gate.require(PermissionKind::Delete, "log-delete")?;
            let ids = ids
                .iter()
                .map(|id| id.parse())
                .collect::<storage::Result<Vec<LogId>>>()?;
            let deleted = gate.store().delete_activities(&ids)?;
            println!("Deleted {deleted} of {} entries.", ids.len());
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn cmd_check_roles(table: &PolicyTable, roles: &[String], action: PermissionKind) -> Result<ExitCode> {
    if roles.is_empty() {
        return Err(Error::NothingToCheck);
    }
    let decision = table.evaluate(roles, action);
    Ok(print_decision(table, &decision))
}

fn cmd_roles(table: &PolicyTable) {
    println!(
        "{:<16}  {:<5}  {:<6}  {:<4}  {:<6}  {:<6}  {:<12}  DESCRIPTION",
        "ROLE", "LEVEL", "CREATE", "READ", "UPDATE", "DELETE", "MANAGE_ROLES"
    );
    println!("{}", "-".repeat(100));

    let mark = |granted: bool| if granted { "yes" } else { "-" };
    for role in table.roles() {
        println!(
            "{:<16}  {:<5}  {:<6}  {:<4}  {:<6}  {:<6}  {:<12}  {}",
            role.name,
            role.level,
            mark(role.grants(PermissionKind::Create)),
            mark(role.grants(PermissionKind::Read)),
            mark(role.grants(PermissionKind::Update)),
            mark(role.grants(PermissionKind::Delete)),
            mark(role.grants(PermissionKind::ManageRoles)),
            role.description
        );
    }
}

fn cmd_permissions(gate: &Gate, principal: &str) -> Result<()> {
    gate.require(PermissionKind::Read, "permissions")?;

    let identity = gate.store().identity(principal)?;
    let permissions = gate.table().permissions_for(&identity.assigned_roles);

    println!("Principal: {principal}");
    if identity.has_roles() {
        let details: Vec<_> = identity
            .assigned_roles
            .iter()
            .map(|name| {
                let record = gate.table().capabilities_of(name);
                format!("{} (level {})", record.name, record.level)
            })
            .collect();
        println!("Roles: {}", details.join(", "));
    } else {
        println!("Roles: none");
    }

    for kind in PermissionKind::ALL {
        let verdict = if permissions.allows(kind) { "yes" } else { "no" };
        println!("  {:<12}  {verdict}", kind.as_str());
    }
    Ok(())
}

/// Every defined role plus any stored role the table does not define, with
/// member counts, most privileged first.
fn role_breakdown(
    table: &PolicyTable,
    counts: &BTreeMap<String, u64>,
) -> Vec<(RoleCapabilities, u64)> {
    let mut rows: Vec<_> = table
        .roles()
        .into_iter()
        .map(|role| (role.clone(), counts.get(&role.name).copied().unwrap_or(0)))
        .collect();
    rows.extend(
        counts
            .iter()
            .filter(|(name, _)| !table.contains(name.as_str()))
            .map(|(name, count)| (table.capabilities_of(name), *count)),
    );
    rows.sort_by(|(a, _), (b, _)| b.level.cmp(&a.level).then_with(|| a.name.cmp(&b.name)));
    rows
}

fn cmd_role_stats(gate: &Gate) -> Result<()> {
    gate.require(PermissionKind::Read, "role-stats")?;

    let counts = gate.store().role_counts()?;
    println!("{:<16}  {:<5}  MEMBERS", "ROLE", "LEVEL");
    for (role, count) in role_breakdown(gate.table(), &counts) {
        let note = if role.is_recognized() { "" } else { "  (undefined)" };
        println!("{:<16}  {:<5}  {count}{note}", role.name, role.level);
    }

    let unassigned = gate.store().principals_without_roles()?;
    println!("\nPrincipals with roles: {}", gate.store().principals()?.len());
    println!("Active principals without roles: {}", unassigned.len());
    for principal in &unassigned {
        println!("  {principal}");
    }
    Ok(())
}

fn cmd_logs(gate: &Gate, filter: &LogFilter, json: bool) -> Result<()> {
    let page = gate.store().list_activity(filter)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    if page.items.is_empty() {
        println!("No activity found.");
        return Ok(());
    }

    for log in &page.items {
        print_activity(log);
    }
    println!(
        "\nPage {} of {} ({} entries)",
        page.page, page.total_pages, page.total
    );
    Ok(())
}

fn print_activity(log: &ActivityLog) {
    let time = log
        .timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S");
    let severity = log.severity.as_str().to_uppercase();
    println!(
        "[{time}] {severity:<7} {} {}: {}  ({})",
        log.principal, log.action, log.details, log.id
    );
}

/// Process status for a decision: 0 when allowed, 2 when denied.
fn decision_status(decision: &Decision) -> u8 {
    if decision.allowed { 0 } else { 2 }
}

fn print_decision(table: &PolicyTable, decision: &Decision) -> ExitCode {
    let verdict = if decision.allowed { "ALLOWED" } else { "DENIED" };
    println!("{verdict}: {}", decision.requested);

    match &decision.highest_applicable_role {
        Some(role) => println!("Highest role: {} (level {})", role.name, role.level),
        None => println!("Highest role: none"),
    }

    if !decision.allowed {
        let required: Vec<_> = table
            .roles_granting(decision.requested)
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        println!("Requires one of: {}", required.join(", "));
    }
    ExitCode::from(decision_status(decision))
}

fn print_list(items: &[String], empty: &str) {
    if items.is_empty() {
        println!("{empty}");
    }
    for item in items {
        println!("{item}");
    }
}

fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        tracing::debug!(path = %path.display(), "loading config");
        Ok(Config::load(path)?)
    } else {
        tracing::debug!(path = %path.display(), "no config file, using built-in role table");
        Ok(Config::default())
    }
}

fn open_store(db_path: &Path) -> Result<Store> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    tracing::debug!(path = %db_path.display(), "opening store");
    Ok(Store::open(db_path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_check_with_roles() {
        let cli = Cli::try_parse_from([
            "rolegate", "check", "--action", "delete", "--role", "developer", "--role", "admin",
        ])
        .unwrap();
        match cli.command {
            Commands::Check {
                action,
                principal,
                role,
            } => {
                assert_eq!(action, PermissionKind::Delete);
                assert!(principal.is_none());
                assert_eq!(role, ["developer", "admin"]);
            }
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_permission() {
        let result = Cli::try_parse_from(["rolegate", "check", "--action", "drop", "--role", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_logs_filters() {
        let cli = Cli::try_parse_from([
            "rolegate",
            "--actor",
            "u1",
            "logs",
            "--severity",
            "WARNING",
            "--since",
            "2025-01-01T00:00:00Z",
            "--asc",
        ])
        .unwrap();
        assert_eq!(cli.actor.as_deref(), Some("u1"));
        match cli.command {
            Commands::Logs {
                severity,
                since,
                asc,
                page,
                limit,
                ..
            } => {
                assert_eq!(severity, Some(Severity::Warning));
                assert!(since.is_some());
                assert!(asc);
                assert_eq!((page, limit), (1, 10));
            }
            _ => panic!("expected logs"),
        }
    }

    #[test]
    fn test_parse_log_update() {
        let cli = Cli::try_parse_from([
            "rolegate",
            "log-update",
            "0b6f1c52-8f2e-4c55-9d8a-3f1f4d7f2a10",
            "--severity",
            "error",
        ])
        .unwrap();
        match cli.command {
            Commands::LogUpdate {
                id,
                severity,
                details,
                ..
            } => {
                assert!(id.parse::<LogId>().is_ok());
                assert_eq!(severity, Some(Severity::Error));
                assert!(details.is_none());
            }
            _ => panic!("expected log-update"),
        }
    }

    #[test]
    fn test_role_breakdown_orders_by_level() {
        let table = PolicyTable::canonical();
        let counts = BTreeMap::from([
            ("admin".to_string(), 4),
            ("legacy_role".to_string(), 2),
            ("super_admin".to_string(), 1),
        ]);

        let rows: Vec<_> = role_breakdown(&table, &counts)
            .into_iter()
            .map(|(role, count)| (role.name, role.level, count))
            .collect();
        assert_eq!(
            rows,
            [
                ("super_admin".to_string(), 3, 1),
                ("developer".to_string(), 2, 0),
                ("admin".to_string(), 1, 4),
                ("legacy_role".to_string(), 0, 2),
            ]
        );
    }

    #[test]
    fn test_denied_decision_status() {
        let table = PolicyTable::canonical();
        assert_eq!(
            decision_status(&table.evaluate(["admin"], PermissionKind::Create)),
            2
        );
        assert_eq!(
            decision_status(&table.evaluate(["admin"], PermissionKind::Read)),
            0
        );
    }
}
