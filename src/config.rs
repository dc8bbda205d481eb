use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use crate::error::{Error, Result};
use crate::migration::DriftPolicy;

pub const MODE_ENV: &str = "JOBBOARD_ENV";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Development,
    Production,
}

impl Mode {
    pub fn from_env() -> Self {
        std::env::var(MODE_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Mode::Development),
            "production" | "prod" => Ok(Mode::Production),
            other => Err(format!("unknown mode '{}' (expected development or production)", other)),
        }
    }
}

/// Maps 1:1 to SQLite `journal_mode` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    #[default]
    Wal,
    Delete,
}

impl JournalMode {
    pub fn pragma_value(&self) -> &'static str {
        match self {
            JournalMode::Wal => "WAL",
            JournalMode::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub primary_dir: PathBuf,
    /// Defaults to the platform data directory, then the OS temp directory.
    pub fallback_dir: Option<PathBuf>,
    pub database_file: String,
    pub mode: Mode,
    pub drift_policy: DriftPolicy,
    pub journal_mode: JournalMode,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            primary_dir: PathBuf::from("./data"),
            fallback_dir: None,
            database_file: "jobboard.db".to_string(),
            mode: Mode::default(),
            drift_policy: DriftPolicy::default(),
            journal_mode: JournalMode::default(),
        }
    }
}

impl BootstrapConfig {
    pub fn new(primary_dir: impl Into<PathBuf>) -> Self {
        Self {
            primary_dir: primary_dir.into(),
            ..Self::default()
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let config: BootstrapConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_file.trim().is_empty() {
            return Err(Error::Config("database_file must not be empty".to_string()));
        }
        if Path::new(&self.database_file).components().count() != 1 {
            return Err(Error::Config(format!(
                "database_file '{}' must be a bare file name",
                self.database_file
            )));
        }
        Ok(())
    }

    pub fn with_fallback_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fallback_dir = Some(dir.into());
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_drift_policy(mut self, policy: DriftPolicy) -> Self {
        self.drift_policy = policy;
        self
    }

    pub fn secondary_dir(&self) -> PathBuf {
        self.fallback_dir
            .clone()
            .or_else(|| dirs::data_local_dir().map(|d| d.join("jobboard")))
            .unwrap_or_else(|| std::env::temp_dir().join("jobboard"))
    }
}
