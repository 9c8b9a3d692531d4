//! Configuration for Corkboard.
//!
//! Settings are read from `.corkboard/corkboard.toml` under the project
//! directory, then overridden by environment variables, then by CLI flags.
//! Every field has a default, so a missing file is not an error.
//!
//! # Configuration File Format
//!
//! ```toml
//! [storage]
//! backend = "sqlite"
//! # Defaults to .corkboard/boards.db for sqlite, .corkboard/boards.json for snapshot
//! path = ".corkboard/boards.db"
//! persist_timeout_ms = 5000
//!
//! [ordering]
//! compaction = "eager"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 3142
//! cors_permissive = false
//!
//! [log]
//! level = "info"
//! format = "text"
//! directory = ""
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::board::ordering::CompactionPolicy;

/// Directory under the project root holding config and data.
pub const CORKBOARD_DIR: &str = ".corkboard";

/// Config file name inside [`CORKBOARD_DIR`].
pub const CONFIG_FILE: &str = "corkboard.toml";

/// Which [`BoardStore`](crate::board::store::BoardStore) backs the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// SQLite database with boards/lists/cards tables.
    #[default]
    Sqlite,
    /// Single JSON document, rewritten on every change.
    Snapshot,
    /// Nothing is written to disk.
    Memory,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Sqlite => write!(f, "sqlite"),
            StorageBackend::Snapshot => write!(f, "snapshot"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(StorageBackend::Sqlite),
            "snapshot" | "json" => Ok(StorageBackend::Snapshot),
            "memory" => Ok(StorageBackend::Memory),
            _ => anyhow::bail!(
                "Invalid storage backend '{}'. Valid values: sqlite, snapshot, memory",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Database or snapshot path, relative to the project directory.
    /// Unset means the backend's own default file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default = "default_persist_timeout_ms")]
    pub persist_timeout_ms: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: None,
            persist_timeout_ms: default_persist_timeout_ms(),
        }
    }
}

impl StorageSection {
    pub fn persist_timeout(&self) -> Duration {
        Duration::from_millis(self.persist_timeout_ms)
    }

    /// Storage path resolved against `project_dir`.
    pub fn resolved_path(&self, project_dir: &Path) -> PathBuf {
        let path = match &self.path {
            Some(path) => path.clone(),
            None => default_storage_path(self.backend),
        };
        if path.is_absolute() {
            path
        } else {
            project_dir.join(path)
        }
    }
}

fn default_storage_path(backend: StorageBackend) -> PathBuf {
    let file = match backend {
        StorageBackend::Snapshot => "boards.json",
        StorageBackend::Sqlite | StorageBackend::Memory => "boards.db",
    };
    PathBuf::from(CORKBOARD_DIR).join(file)
}

fn default_persist_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderingSection {
    #[serde(default)]
    pub compaction: CompactionPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Permissive CORS for a separately served front-end during development.
    #[serde(default)]
    pub cors_permissive: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_permissive: false,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3142
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSection {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Directory for a daily rolling log file. Empty disables file logging.
    #[serde(default)]
    pub directory: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            directory: String::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Root of `corkboard.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorkboardConfig {
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub ordering: OrderingSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub log: LogSection,
}

impl CorkboardConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse corkboard.toml")
    }

    /// Path of the config file for `project_dir`.
    pub fn path_for(project_dir: &Path) -> PathBuf {
        project_dir.join(CORKBOARD_DIR).join(CONFIG_FILE)
    }

    /// Load `.corkboard/corkboard.toml` under `project_dir`, or defaults if
    /// the file doesn't exist, then apply environment overrides.
    pub fn load_for_project(project_dir: &Path) -> Result<Self> {
        let path = Self::path_for(project_dir);
        let mut config = if path.exists() {
            Self::load(&path)?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize corkboard.toml")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply `CORKBOARD_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(backend) = lookup("CORKBOARD_STORAGE_BACKEND") {
            self.storage.backend = backend.parse()?;
        }
        if let Some(path) = lookup("CORKBOARD_STORAGE_PATH") {
            self.storage.path = Some(PathBuf::from(path));
        }
        if let Some(port) = lookup("CORKBOARD_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("Invalid CORKBOARD_PORT '{}'", port))?;
        }
        if let Some(level) = lookup("CORKBOARD_LOG_LEVEL") {
            self.log.level = level;
        }
        Ok(())
    }

    /// Validate the configuration and return any problems found.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.server.port == 0 {
            problems.push("server.port must be non-zero".to_string());
        }
        if self.storage.persist_timeout_ms == 0 {
            problems.push("storage.persist_timeout_ms must be greater than zero".to_string());
        }
        if self.storage.backend != StorageBackend::Memory
            && self
                .storage
                .path
                .as_ref()
                .is_some_and(|path| path.as_os_str().is_empty())
        {
            problems.push(format!(
                "storage.path is required for the {} backend",
                self.storage.backend
            ));
        }
        if tracing_subscriber::EnvFilter::try_new(&self.log.level).is_err() {
            problems.push(format!("Invalid log.level '{}'", self.log.level));
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn empty_file_yields_defaults() -> Result<()> {
        let config = CorkboardConfig::parse("")?;
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.storage.persist_timeout(), Duration::from_secs(5));
        assert_eq!(config.ordering.compaction, CompactionPolicy::Eager);
        assert_eq!(config.server.port, 3142);
        assert_eq!(config.log.format, LogFormat::Text);
        assert!(config.validate().is_empty());
        Ok(())
    }

    #[test]
    fn parses_every_section() -> Result<()> {
        let config = CorkboardConfig::parse(
            r#"
[storage]
backend = "snapshot"
path = "/tmp/boards.json"
persist_timeout_ms = 250

[ordering]
compaction = "lazy"

[server]
host = "0.0.0.0"
port = 8080
cors_permissive = true

[log]
level = "debug"
format = "json"
"#,
        )?;
        assert_eq!(config.storage.backend, StorageBackend::Snapshot);
        assert_eq!(
            config.storage.resolved_path(Path::new("/project")),
            PathBuf::from("/tmp/boards.json")
        );
        assert_eq!(config.ordering.compaction, CompactionPolicy::Lazy);
        assert!(config.server.cors_permissive);
        assert_eq!(config.log.format, LogFormat::Json);
        Ok(())
    }

    #[test]
    fn relative_storage_path_resolves_under_project() {
        let config = CorkboardConfig::default();
        assert_eq!(
            config.storage.resolved_path(Path::new("/project")),
            PathBuf::from("/project/.corkboard/boards.db")
        );
    }

    #[test]
    fn snapshot_backend_defaults_to_json_file() -> Result<()> {
        let mut config = CorkboardConfig::default();
        config.apply_overrides(|key| {
            (key == "CORKBOARD_STORAGE_BACKEND").then(|| "snapshot".to_string())
        })?;
        assert_eq!(
            config.storage.resolved_path(Path::new("/project")),
            PathBuf::from("/project/.corkboard/boards.json")
        );

        let parsed = CorkboardConfig::parse("[storage]\nbackend = \"snapshot\"\n")?;
        assert_eq!(
            parsed.storage.resolved_path(Path::new("/project")),
            PathBuf::from("/project/.corkboard/boards.json")
        );
        Ok(())
    }

    #[test]
    fn unset_path_is_not_written_out() -> Result<()> {
        let dir = TempDir::new()?;
        let path = CorkboardConfig::path_for(dir.path());
        CorkboardConfig::default().save(&path)?;

        let mut loaded = CorkboardConfig::load(&path)?;
        assert_eq!(loaded.storage.path, None);
        loaded.storage.backend = StorageBackend::Snapshot;
        assert!(
            loaded
                .storage
                .resolved_path(dir.path())
                .ends_with(".corkboard/boards.json")
        );
        Ok(())
    }

    #[test]
    fn overrides_replace_file_values() -> Result<()> {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CORKBOARD_STORAGE_BACKEND", "memory"),
            ("CORKBOARD_PORT", "9000"),
            ("CORKBOARD_LOG_LEVEL", "warn"),
        ]);
        let mut config = CorkboardConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()))?;
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.log.level, "warn");
        Ok(())
    }

    #[test]
    fn bad_override_is_an_error() {
        let mut config = CorkboardConfig::default();
        assert!(
            config
                .apply_overrides(|key| (key == "CORKBOARD_PORT").then(|| "abc".to_string()))
                .is_err()
        );
    }

    #[test]
    fn validate_reports_problems() {
        let mut config = CorkboardConfig::default();
        config.server.port = 0;
        config.storage.persist_timeout_ms = 0;
        config.storage.path = Some(PathBuf::new());
        let problems = config.validate();
        assert_eq!(problems.len(), 3);

        config.storage.backend = StorageBackend::Memory;
        assert_eq!(config.validate().len(), 2);
    }

    #[test]
    fn save_then_load_round_trips() -> Result<()> {
        let dir = TempDir::new()?;
        let path = CorkboardConfig::path_for(dir.path());
        let mut config = CorkboardConfig::default();
        config.server.port = 4000;
        config.save(&path)?;

        let loaded = CorkboardConfig::load(&path)?;
        assert_eq!(loaded.server.port, 4000);
        Ok(())
    }
}
