use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

use crate::error::StoreError;

pub mod models;
use models::*;

/// Key of the last good match snapshot.
pub const CACHE_KEY: &str = "football-scores-cache";
/// Key of the favorite match id list.
pub const FAVORITES_KEY: &str = "football-favorites";

/// Durable string-keyed storage underneath [`Store`].
pub trait KeyValueBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Overwrite the value under `key` in a single write.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// SQLite-backed key-value table (single connection with mutex)
#[derive(Clone)]
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let backend = SqliteBackend {
            conn: Arc::new(Mutex::new(conn)),
        };
        backend.run_migrations()?;
        Ok(backend)
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<(), StoreError> {
        self.lock()?.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Unavailable {
            reason: "sqlite connection mutex poisoned".to_string(),
        })
    }
}

impl KeyValueBackend for SqliteBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value=excluded.value,
                updated_at=excluded.updated_at",
            params![key, value, Utc::now()],
        )?;
        Ok(())
    }
}

/// Volatile backend for tests and snapshot-less runs.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.entries.lock().map_err(|_| StoreError::Unavailable {
            reason: "memory store mutex poisoned".to_string(),
        })
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Snapshot and favorites persistence over an injected backend.
///
/// Every call is synchronous and durable once it returns. There is one
/// writer by construction, so last write wins.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn KeyValueBackend>,
}

impl Store {
    pub fn new(backend: impl KeyValueBackend + 'static) -> Self {
        Store {
            backend: Arc::new(backend),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    // ── Snapshot ──────────────────────────────────────────────────────────────

    /// Overwrite the persisted snapshot.
    pub fn save_snapshot(&self, snapshot: &CacheSnapshot) -> Result<(), StoreError> {
        let raw = serde_json::to_string(snapshot).map_err(|source| StoreError::Serialization {
            key: CACHE_KEY,
            source,
        })?;
        self.backend.set(CACHE_KEY, &raw)
    }

    /// Load the snapshot, propagating corruption and backend failures.
    pub fn try_load_snapshot(&self) -> Result<Option<CacheSnapshot>, StoreError> {
        let Some(raw) = self.backend.get(CACHE_KEY)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::CorruptCache {
                key: CACHE_KEY,
                source,
            })
    }

    /// Load the snapshot; any failure reads as "no snapshot".
    pub fn load_snapshot(&self) -> Option<CacheSnapshot> {
        match self.try_load_snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Ignoring unreadable match snapshot: {}", e);
                None
            }
        }
    }

    // ── Favorites ─────────────────────────────────────────────────────────────

    /// Overwrite the persisted favorite set.
    pub fn save_favorites(&self, favorites: &FavoriteSet) -> Result<(), StoreError> {
        let raw = serde_json::to_string(favorites).map_err(|source| StoreError::Serialization {
            key: FAVORITES_KEY,
            source,
        })?;
        self.backend.set(FAVORITES_KEY, &raw)
    }

    /// Load favorites, propagating corruption and backend failures.
    pub fn try_load_favorites(&self) -> Result<FavoriteSet, StoreError> {
        let Some(raw) = self.backend.get(FAVORITES_KEY)? else {
            return Ok(FavoriteSet::new());
        };
        serde_json::from_str(&raw).map_err(|source| StoreError::CorruptCache {
            key: FAVORITES_KEY,
            source,
        })
    }

    /// Load favorites; missing or unreadable entries give an empty set.
    pub fn load_favorites(&self) -> FavoriteSet {
        self.try_load_favorites().unwrap_or_else(|e| {
            warn!("Favorites unavailable, using empty set: {}", e);
            FavoriteSet::new()
        })
    }

    /// Flip `id` in the persisted favorite set and return the new set.
    ///
    /// A corrupt entry is replaced. A backend read failure aborts before
    /// anything is written, so the stored set is never clobbered.
    pub fn toggle_favorite(&self, id: &str) -> Result<FavoriteSet, StoreError> {
        let mut favorites = match self.try_load_favorites() {
            Ok(favorites) => favorites,
            Err(e @ StoreError::CorruptCache { .. }) => {
                warn!("Replacing corrupt favorites entry: {}", e);
                FavoriteSet::new()
            }
            Err(e) => return Err(e),
        };
        favorites.toggle(id);
        self.save_favorites(&favorites)?;
        Ok(favorites)
    }
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS kv_entries (
    key         TEXT    PRIMARY KEY,
    value       TEXT    NOT NULL,
    updated_at  TEXT    NOT NULL
);
"#;
