//! Storage for the persisted collections.
//!
//! Each collection (search terms, tools, templates) is stored as one JSON
//! payload and always overwritten whole. `Database` keeps them in SQLite;
//! `MemoryStorage` keeps them in a map for hosts without a file.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::RwLock;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// The persisted collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    SearchTerms,
    Tools,
    Templates,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 3] = [Self::SearchTerms, Self::Tools, Self::Templates];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SearchTerms => "searchTerms",
            Self::Tools => "tools",
            Self::Templates => "templates",
        }
    }
}

/// Get/set of whole collections
pub trait ConfigStorage: Send + Sync {
    fn load_collection(&self, kind: CollectionKind) -> DatabaseResult<Option<String>>;
    fn save_collection(&self, kind: CollectionKind, payload: &str) -> DatabaseResult<()>;
}

/// Thread-safe SQLite storage using connection pooling
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DatabaseResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=NORMAL;
                ",
            )?;
            Ok(())
        });

        let pool = Pool::builder().max_size(4).build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::memory();

        // In-memory needs single connection to maintain state
        let pool = Pool::builder().max_size(1).build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    fn get_conn(&self) -> DatabaseResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn setup_schema(&self) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY NOT NULL,
                payload TEXT NOT NULL,
                updatedAt INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Last write time of a collection, unix millis
    #[cfg(test)]
    pub(crate) fn updated_at(&self, kind: CollectionKind) -> DatabaseResult<Option<i64>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT updatedAt FROM collections WHERE name = ?1",
                params![kind.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}

impl ConfigStorage for Database {
    fn load_collection(&self, kind: CollectionKind) -> DatabaseResult<Option<String>> {
        let conn = self.get_conn()?;
        let payload = conn
            .query_row(
                "SELECT payload FROM collections WHERE name = ?1",
                params![kind.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(payload)
    }

    fn save_collection(&self, kind: CollectionKind, payload: &str) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO collections (name, payload, updatedAt) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET payload = excluded.payload, updatedAt = excluded.updatedAt",
            params![kind.as_str(), payload, crate::models::now_millis()],
        )?;
        Ok(())
    }
}

/// Storage that lives only as long as the process
#[derive(Default)]
pub struct MemoryStorage {
    collections: RwLock<HashMap<CollectionKind, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStorage for MemoryStorage {
    fn load_collection(&self, kind: CollectionKind) -> DatabaseResult<Option<String>> {
        Ok(self.collections.read().get(&kind).cloned())
    }

    fn save_collection(&self, kind: CollectionKind, payload: &str) -> DatabaseResult<()> {
        self.collections.write().insert(kind, payload.to_string());
        Ok(())
    }
}
