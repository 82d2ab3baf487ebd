//! Per-user persisted state: saved BINs and recent activity.
//!
//! Reads and writes are whole-record and non-transactional. Two concurrent
//! read-modify-write cycles for the same user can lose one update; the command
//! throttle makes that unlikely in practice but does not rule it out.

use crate::error::{Error, Result};
use binforge::{BinMetadata, CallerId, Prefix};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

/// Maximum number of history entries kept per user.
pub const HISTORY_LIMIT: usize = 50;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub favorites: Vec<Favorite>,
    /// Most recent first.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub bin: Prefix,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cvv: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HistoryEntry {
    Gen {
        bin: Prefix,
        count: usize,
        timestamp: DateTime<Utc>,
    },
    Lookup {
        bin: Prefix,
        info: BinMetadata,
        timestamp: DateTime<Utc>,
    },
}

impl HistoryEntry {
    pub fn bin(&self) -> &Prefix {
        match self {
            Self::Gen { bin, .. } | Self::Lookup { bin, .. } => bin,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Gen { timestamp, .. } | Self::Lookup { timestamp, .. } => *timestamp,
        }
    }
}

impl UserRecord {
    /// Records `entry` as the most recent activity, dropping the oldest
    /// entries beyond [`HISTORY_LIMIT`].
    pub fn push_history(&mut self, entry: HistoryEntry) {
        self.history.insert(0, entry);
        self.history.truncate(HISTORY_LIMIT);
    }

    /// Saves `favorite` unless the same BIN is already saved.
    ///
    /// Returns `false` for a duplicate.
    pub fn add_favorite(&mut self, favorite: Favorite) -> bool {
        if self.favorites.iter().any(|f| f.bin == favorite.bin) {
            return false;
        }
        self.favorites.push(favorite);
        true
    }

    /// Removes the favorite at 1-based `position`.
    pub fn remove_favorite(&mut self, position: usize) -> Option<Favorite> {
        let index = position.checked_sub(1)?;
        (index < self.favorites.len()).then(|| self.favorites.remove(index))
    }
}

/// Keyed storage of [`UserRecord`]s.
pub trait UserStore: Send + Sync {
    /// Loads the record for `user`, or an empty one if none exists yet.
    fn load(&self, user: CallerId) -> Result<UserRecord>;

    /// Replaces the record for `user`.
    fn save(&self, user: CallerId, record: &UserRecord) -> Result<()>;
}

/// One pretty-printed JSON file per user under a data directory.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Opens (and creates if needed) the data directory.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, user: CallerId) -> PathBuf {
        self.dir.join(format!("{user}.json"))
    }
}

impl UserStore for JsonFileStore {
    fn load(&self, user: CallerId) -> Result<UserRecord> {
        let raw = match fs::read_to_string(self.path(user)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(UserRecord::default()),
            Err(source) => return Err(Error::StoreIo { user, source }),
        };
        serde_json::from_str(&raw).map_err(|source| Error::StoreCorrupt { user, source })
    }

    fn save(&self, user: CallerId, record: &UserRecord) -> Result<()> {
        let json = serde_json::to_string_pretty(record)
            .map_err(|source| Error::StoreCorrupt { user, source })?;

        // Each save gets its own temp file in the data directory, so
        // overlapping saves for one user replace the record whole and never
        // interleave bytes. The last rename wins.
        let io_err = |source| Error::StoreIo { user, source };
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.persist(self.path(user)).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

/// In-process store, mainly for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<CallerId, UserRecord>>,
}

impl UserStore for MemoryStore {
    fn load(&self, user: CallerId) -> Result<UserRecord> {
        Ok(self.records.lock().get(&user).cloned().unwrap_or_default())
    }

    fn save(&self, user: CallerId, record: &UserRecord) -> Result<()> {
        self.records.lock().insert(user, record.clone());
        Ok(())
    }
}
