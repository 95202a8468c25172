//! Per-conversation welcome state.
//!
//! The dispatcher reads and updates one boolean flag per conversation; the
//! store owns its persistence lifecycle.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};

use crate::error::BotError;
use crate::types::WelcomeState;

/// Persisted per-conversation session flags.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the welcome state for a conversation, defaulting to not-welcomed.
    async fn load(&self, conversation_id: &str) -> Result<WelcomeState, BotError>;

    /// Persist the welcome state for a conversation.
    async fn save(&self, conversation_id: &str, state: WelcomeState) -> Result<(), BotError>;
}

// =============================================================================
// In-memory store
// =============================================================================

/// Process-local store, suitable for tests and single-instance runs.
#[derive(Default)]
pub struct InMemorySessionStore {
    flags: Mutex<HashMap<String, WelcomeState>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, conversation_id: &str) -> Result<WelcomeState, BotError> {
        let flags = self
            .flags
            .lock()
            .map_err(|e| BotError::SessionState(format!("session lock poisoned: {}", e)))?;
        Ok(flags.get(conversation_id).copied().unwrap_or_default())
    }

    async fn save(&self, conversation_id: &str, state: WelcomeState) -> Result<(), BotError> {
        let mut flags = self
            .flags
            .lock()
            .map_err(|e| BotError::SessionState(format!("session lock poisoned: {}", e)))?;
        flags.insert(conversation_id.to_string(), state);
        Ok(())
    }
}

// =============================================================================
// SQLite store
// =============================================================================

/// SQLite-backed store for state that must survive restarts.
///
/// The connection is wrapped in a Mutex since rusqlite's `Connection` is not
/// `Sync`; the single-row queries here are short enough that blocking the
/// async executor briefly is acceptable.
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    /// Open (or create) the store at the given path.
    pub fn open(path: &Path) -> Result<Self, BotError> {
        let conn = Connection::open(path)
            .map_err(|e| BotError::SessionState(format!("open failed: {}", e)))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(|e| BotError::SessionState(format!("pragma failed: {}", e)))?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store (tests).
    pub fn open_in_memory() -> Result<Self, BotError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| BotError::SessionState(format!("open failed: {}", e)))?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init(conn: &Connection) -> Result<(), BotError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS welcome_state (
                conversation_id TEXT PRIMARY KEY,
                has_welcomed INTEGER NOT NULL DEFAULT 0
            );",
        )
        .map_err(|e| BotError::SessionState(format!("schema init failed: {}", e)))
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load(&self, conversation_id: &str) -> Result<WelcomeState, BotError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| BotError::SessionState(format!("connection lock poisoned: {}", e)))?;
        let flag: Option<i64> = conn
            .query_row(
                "SELECT has_welcomed FROM welcome_state WHERE conversation_id = ?1",
                [conversation_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| BotError::SessionState(format!("load failed: {}", e)))?;
        Ok(WelcomeState {
            has_welcomed: flag.unwrap_or(0) != 0,
        })
    }

    async fn save(&self, conversation_id: &str, state: WelcomeState) -> Result<(), BotError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| BotError::SessionState(format!("connection lock poisoned: {}", e)))?;
        conn.execute(
            "INSERT INTO welcome_state (conversation_id, has_welcomed) VALUES (?1, ?2)
             ON CONFLICT(conversation_id) DO UPDATE SET has_welcomed = excluded.has_welcomed",
            rusqlite::params![conversation_id, state.has_welcomed as i64],
        )
        .map_err(|e| BotError::SessionState(format!("save failed: {}", e)))?;
        Ok(())
    }
}
