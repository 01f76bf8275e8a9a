//! Configuration loading from rolegate.toml.

use policy::{PolicyTable, RoleEntry};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Directory name under the platform data home.
pub const APP_NAME: &str = "rolegate";

const DATABASE_FILE: &str = "rolegate.db";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Role table. Empty means the built-in table.
    #[serde(default)]
    pub roles: Vec<RoleEntry>,
}

/// Storage configuration.
#[derive(Debug, Default, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database.
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Build the role table, falling back to the built-in one.
    pub fn policy_table(&self) -> Result<PolicyTable, ConfigError> {
        if self.roles.is_empty() {
            Ok(PolicyTable::canonical())
        } else {
            Ok(PolicyTable::from_roles(self.roles.iter().cloned())?)
        }
    }

    /// Resolve the database path.
    ///
    /// Precedence: `env_override`, then `storage.path`, then `data_dir`,
    /// then the working directory.
    pub fn database_path(&self, env_override: Option<PathBuf>, data_dir: Option<PathBuf>) -> PathBuf {
        env_override
            .or_else(|| self.storage.path.clone())
            .unwrap_or_else(|| data_dir.unwrap_or_else(|| ".rolegate".into()).join(DATABASE_FILE))
    }
}

/// Per-user data directory for rolegate, if the platform has one.
pub fn default_data_dir() -> Option<PathBuf> {
    platform_data_home().map(|home| home.join(APP_NAME))
}

#[cfg(target_os = "linux")]
fn platform_data_home() -> Option<PathBuf> {
    std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|| home_dir().map(|h| h.join(".local/share")))
}

#[cfg(target_os = "macos")]
fn platform_data_home() -> Option<PathBuf> {
    home_dir().map(|h| h.join(".local/share"))
}

#[cfg(target_os = "windows")]
fn platform_data_home() -> Option<PathBuf> {
    std::env::var_os("APPDATA").map(PathBuf::from)
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn platform_data_home() -> Option<PathBuf> {
    None
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid role table: {0}")]
    Policy(#[from] policy::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use policy::PermissionKind;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_builtin_table() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.policy_table().unwrap(), PolicyTable::canonical());
    }

    #[test]
    fn test_custom_roles() {
        let config = Config::parse(
            r#"
[storage]
path = "/var/lib/rolegate/roles.db"

[[roles]]
name = "viewer"
level = 1
capabilities = ["read"]

[[roles]]
name = "owner"
level = 2
capabilities = ["create", "read", "update", "delete", "manage_roles"]
"#,
        )
        .unwrap();

        let table = config.policy_table().unwrap();
        assert!(table.evaluate(["owner"], PermissionKind::ManageRoles).allowed);
        assert!(!table.contains("developer"));
        assert_eq!(
            config.database_path(None, None),
            PathBuf::from("/var/lib/rolegate/roles.db")
        );
    }

    #[test]
    fn test_invalid_role_table() {
        let config = Config::parse(
            r#"
[[roles]]
name = "viewer"
level = 1

[[roles]]
name = "viewer"
level = 2
"#,
        )
        .unwrap();
        assert!(matches!(config.policy_table(), Err(ConfigError::Policy(_))));

        assert!(matches!(
            Config::parse("[[roles]]\nname = \"Bad Name\"\nlevel = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_database_path_precedence() {
        let config = Config {
            storage: StorageConfig {
                path: Some("configured.db".into()),
            },
            ..Default::default()
        };
        assert_eq!(
            config.database_path(Some("env.db".into()), Some("/data".into())),
            PathBuf::from("env.db")
        );
        assert_eq!(
            config.database_path(None, Some("/data".into())),
            PathBuf::from("configured.db")
        );

        let config = Config::default();
        assert_eq!(
            config.database_path(None, Some("/data".into())),
            PathBuf::from("/data/rolegate.db")
        );
        assert_eq!(
            config.database_path(None, None),
            PathBuf::from(".rolegate/rolegate.db")
        );
    }

    #[test]
    fn test_default_data_dir_is_app_specific() {
        if let Some(dir) = default_data_dir() {
            assert!(dir.ends_with(APP_NAME));
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[storage]\npath = \"x.db\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.storage.path, Some(PathBuf::from("x.db")));
    }
}
