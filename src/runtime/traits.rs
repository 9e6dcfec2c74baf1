//! Trait abstractions for runtime I/O
//!
//! These traits let the store and controller run against in-memory mocks.

use crate::db::{Database, DbError, PersistedSession};
use crate::session::{Session, Settings};
use std::sync::Arc;

/// Durable storage for the whole session
pub trait SessionStorage: Send + Sync {
    /// The stored session, or `None` on first run
    fn load(&self) -> Result<Option<Session>, String>;

    /// Replace the stored session in one atomic write
    fn save(&self, session: &Session) -> Result<(), String>;
}

impl<T: SessionStorage + ?Sized> SessionStorage for Arc<T> {
    fn load(&self) -> Result<Option<Session>, String> {
        (**self).load()
    }

    fn save(&self, session: &Session) -> Result<(), String> {
        (**self).save(session)
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as SessionStorage
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[allow(dead_code)] // Useful for tests
    pub fn inner(&self) -> &Database {
        &self.db
    }
}

impl SessionStorage for DatabaseStorage {
    fn load(&self) -> Result<Option<Session>, String> {
        let Some(persisted) = self.db.load_session().map_err(|e| e.to_string())? else {
            return Ok(None);
        };
        let settings = match self.db.load_settings() {
            Ok(settings) => settings.unwrap_or_default(),
            Err(e @ DbError::Corrupt { .. }) => {
                tracing::warn!(error = %e, "Discarding unreadable settings");
                Settings::default()
            }
            Err(e) => return Err(e.to_string()),
        };
        let settings = match settings.validate() {
            Ok(()) => settings,
            Err(reason) => {
                tracing::warn!(%reason, "Stored settings are out of range, using defaults");
                Settings::default()
            }
        };
        Ok(Some(persisted.into_session(settings)))
    }

    fn save(&self, session: &Session) -> Result<(), String> {
        self.db
            .save(&PersistedSession::from(session), session.settings())
            .map_err(|e| e.to_string())
    }
}
