//! Database module for talkback
//!
//! Persists the session as JSON documents in a small key-value table.

mod schema;

pub use schema::*;

use crate::session::Settings;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Corrupt record for key {key}: {source}")]
    Corrupt {
        key: &'static str,
        source: serde_json::Error,
    },
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Database lock poisoned")]
    Poisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Session Operations ====================

    /// Load the persisted session, if one was ever saved
    pub fn load_session(&self) -> DbResult<Option<PersistedSession>> {
        let conn = self.lock()?;
        get_json(&conn, SESSION_KEY)
    }

    /// Load persisted settings, if any
    pub fn load_settings(&self) -> DbResult<Option<Settings>> {
        let conn = self.lock()?;
        get_json(&conn, SETTINGS_KEY)
    }

    /// Write session and settings in one transaction
    pub fn save(&self, session: &PersistedSession, settings: &Settings) -> DbResult<()> {
        let session_json = serde_json::to_string(session)?;
        let settings_json = serde_json::to_string(settings)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        for (key, value) in [(SESSION_KEY, &session_json), (SETTINGS_KEY, &settings_json)] {
            tx.execute(
                "INSERT INTO session_state (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn get_json<T: serde::de::DeserializeOwned>(
    conn: &Connection,
    key: &'static str,
) -> DbResult<Option<T>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM session_state WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;

    raw.map(|value| serde_json::from_str(&value).map_err(|source| DbError::Corrupt { key, source }))
        .transpose()
}
