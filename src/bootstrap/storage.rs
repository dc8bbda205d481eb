use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use crate::config::{BootstrapConfig, JournalMode};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum StorageLocation {
    Primary(PathBuf),
    Secondary(PathBuf),
    InMemory,
}

impl StorageLocation {
    pub fn path(&self) -> Option<&Path> {
        match self {
            StorageLocation::Primary(p) | StorageLocation::Secondary(p) => Some(p),
            StorageLocation::InMemory => None,
        }
    }

    pub fn is_durable(&self) -> bool {
        !matches!(self, StorageLocation::InMemory)
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageLocation::Primary(p) => write!(f, "{}", p.display()),
            StorageLocation::Secondary(p) => write!(f, "{} (fallback)", p.display()),
            StorageLocation::InMemory => write!(f, ":memory:"),
        }
    }
}

/// A recovered storage failure. Each one is logged once as a warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageFallback {
    SecondaryDirectory {
        primary: PathBuf,
        secondary: PathBuf,
        reason: String,
    },
    InMemory {
        attempted: Option<PathBuf>,
        reason: String,
    },
}

impl fmt::Display for StorageFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageFallback::SecondaryDirectory { primary, secondary, reason } => write!(
                f,
                "could not create {} ({}); using {}",
                primary.display(),
                reason,
                secondary.display()
            ),
            StorageFallback::InMemory { attempted: Some(path), reason } => write!(
                f,
                "could not open {} ({}); using an in-memory store, data will not survive a restart",
                path.display(),
                reason
            ),
            StorageFallback::InMemory { attempted: None, reason } => write!(
                f,
                "no usable storage directory ({}); using an in-memory store, data will not survive a restart",
                reason
            ),
        }
    }
}

pub struct OpenedStorage {
    pub conn: Connection,
    pub location: StorageLocation,
    pub fallbacks: Vec<StorageFallback>,
}

fn record(fallbacks: &mut Vec<StorageFallback>, fallback: StorageFallback) {
    warn!("Storage fallback: {}", fallback);
    fallbacks.push(fallback);
}

/// Primary directory, else the secondary one. `None` when neither can be created.
pub fn resolve_directory(
    config: &BootstrapConfig,
    fallbacks: &mut Vec<StorageFallback>,
) -> Option<StorageLocation> {
    let primary_err = match fs::create_dir_all(&config.primary_dir) {
        Ok(()) => return Some(StorageLocation::Primary(config.primary_dir.clone())),
        Err(e) => e,
    };

    let secondary = config.secondary_dir();
    match fs::create_dir_all(&secondary) {
        Ok(()) => {
            record(
                fallbacks,
                StorageFallback::SecondaryDirectory {
                    primary: config.primary_dir.clone(),
                    secondary: secondary.clone(),
                    reason: primary_err.to_string(),
                },
            );
            Some(StorageLocation::Secondary(secondary))
        }
        Err(e) => {
            record(
                fallbacks,
                StorageFallback::InMemory {
                    attempted: None,
                    reason: format!(
                        "{}: {}; {}: {}",
                        config.primary_dir.display(),
                        primary_err,
                        secondary.display(),
                        e
                    ),
                },
            );
            None
        }
    }
}

fn apply_pragmas(conn: &Connection, journal_mode: JournalMode) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.query_row(
        &format!("PRAGMA journal_mode = {}", journal_mode.pragma_value()),
        [],
        |row| row.get::<_, String>(0),
    )?;
    // forces a read of the header so unusable files fail here
    conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))?;
    Ok(())
}

pub fn open_file(path: &Path, journal_mode: JournalMode) -> rusqlite::Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(path, flags)?;
    apply_pragmas(&conn, journal_mode)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}

/// Opens the store an earlier bootstrap left behind, read-only.
///
/// Looks in the primary directory, then the secondary one. Nothing is
/// created, no pragma is changed and no fallback is taken: a missing or
/// unreadable store is an error.
pub fn open_existing(config: &BootstrapConfig) -> Result<(Connection, StorageLocation)> {
    let primary = config.primary_dir.join(&config.database_file);
    let secondary = config.secondary_dir().join(&config.database_file);
    let missing = format!(
        "no database at {} or {}",
        primary.display(),
        secondary.display()
    );

    let location = [StorageLocation::Primary(primary), StorageLocation::Secondary(secondary)]
        .into_iter()
        .find(|l| l.path().is_some_and(Path::is_file))
        .ok_or(Error::Storage(missing))?;
    let path = location.path().map(Path::to_path_buf).unwrap_or_default();

    let unreadable = |e: rusqlite::Error| Error::Storage(format!("{}: {}", path.display(), e));
    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(&path, flags).map_err(unreadable)?;
    conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
        .map_err(unreadable)?;

    info!("Opened database at {} read-only", path.display());
    Ok((conn, location))
}

/// Resolves the directory and opens the store, falling back as far as an
/// in-memory database. Only a failing in-memory open is an error.
pub fn open_storage(config: &BootstrapConfig) -> Result<OpenedStorage> {
    let mut fallbacks = Vec::new();

    if let Some(dir) = resolve_directory(config, &mut fallbacks) {
        let path = dir.path().map(|d| d.join(&config.database_file)).unwrap_or_default();
        match open_file(&path, config.journal_mode) {
            Ok(conn) => {
                info!("Opened database at {}", path.display());
                let location = match dir {
                    StorageLocation::Primary(_) => StorageLocation::Primary(path),
                    _ => StorageLocation::Secondary(path),
                };
                return Ok(OpenedStorage { conn, location, fallbacks });
            }
            Err(e) => record(
                &mut fallbacks,
                StorageFallback::InMemory {
                    attempted: Some(path),
                    reason: e.to_string(),
                },
            ),
        }
    }

    let conn = open_in_memory()?;
    Ok(OpenedStorage {
        conn,
        location: StorageLocation::InMemory,
        fallbacks,
    })
}
