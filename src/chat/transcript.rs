//! SQLite-backed chat transcript storage.

use crate::error::{ReplikkError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chats (
    chat_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chats_user_id ON chats(user_id);

CREATE TABLE IF NOT EXISTS messages (
    message_id TEXT PRIMARY KEY,
    chat_id TEXT NOT NULL,
    message TEXT NOT NULL,
    response TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_chat_id ON messages(chat_id);
"#;

/// One (message, response) turn in a chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    pub message_id: String,
    pub message: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

/// A full chat transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRecord {
    pub chat_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<TurnRecord>,
}

/// A chat without its messages, for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSummary {
    pub chat_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: u32,
}

/// Append-only transcript store.
pub struct TranscriptStore {
    conn: Mutex<Connection>,
}

impl TranscriptStore {
    /// Open or create the store at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized transcript store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ReplikkError::Transcript(format!("Failed to acquire lock: {}", e)))
    }

    /// Create a new chat for a user and return its id.
    #[instrument(skip(self))]
    pub fn create_chat(&self, user_id: &str) -> Result<String> {
        let conn = self.lock_conn()?;

        let chat_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO chats (chat_id, user_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![chat_id, user_id, now, now],
        )?;

        debug!("Created chat {} for user {}", chat_id, user_id);
        Ok(chat_id)
    }

    /// Append a completed turn. Returns `false` when the chat does not exist.
    #[instrument(skip(self, message, response))]
    pub fn append_turn(&self, chat_id: &str, message: &str, response: &str) -> Result<bool> {
        let conn = self.lock_conn()?;

        let now = Utc::now().to_rfc3339();
        let tx = conn.unchecked_transaction()?;

        let updated = tx.execute(
            "UPDATE chats SET updated_at = ?1 WHERE chat_id = ?2",
            params![now, chat_id],
        )?;
        if updated == 0 {
            return Ok(false);
        }

        tx.execute(
            r#"
            INSERT INTO messages (message_id, chat_id, message, response, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![Uuid::new_v4().to_string(), chat_id, message, response, now],
        )?;

        tx.commit()?;
        Ok(true)
    }

    /// Fetch a full transcript.
    #[instrument(skip(self))]
    pub fn get_chat(&self, chat_id: &str) -> Result<Option<ChatRecord>> {
        let conn = self.lock_conn()?;

        let chat = conn.query_row(
            "SELECT chat_id, user_id, created_at, updated_at FROM chats WHERE chat_id = ?1",
            params![chat_id],
            |row| {
                let created_at: String = row.get(2)?;
                let updated_at: String = row.get(3)?;
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    created_at,
                    updated_at,
                ))
            },
        );

        let (chat_id, user_id, created_at, updated_at) = match chat {
            Ok(row) => row,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut stmt = conn.prepare(
            r#"
            SELECT message_id, message, response, timestamp
            FROM messages
            WHERE chat_id = ?1
            ORDER BY timestamp, rowid
            "#,
        )?;

        let messages = stmt.query_map(params![chat_id], |row| {
            let timestamp: String = row.get(3)?;
            Ok(TurnRecord {
                message_id: row.get(0)?,
                message: row.get(1)?,
                response: row.get(2)?,
                timestamp: parse_timestamp(&timestamp),
            })
        })?;

        Ok(Some(ChatRecord {
            chat_id,
            user_id,
            created_at: parse_timestamp(&created_at),
            updated_at: parse_timestamp(&updated_at),
            messages: messages.filter_map(|m| m.ok()).collect(),
        }))
    }

    /// List a user's chats, most recently touched first.
    #[instrument(skip(self))]
    pub fn user_chats(&self, user_id: &str) -> Result<Vec<ChatSummary>> {
        let conn = self.lock_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT c.chat_id, c.user_id, c.created_at, c.updated_at,
                   (SELECT COUNT(*) FROM messages m WHERE m.chat_id = c.chat_id) as message_count
            FROM chats c
            WHERE c.user_id = ?1
            ORDER BY c.updated_at DESC
            "#,
        )?;

        let chats = stmt.query_map(params![user_id], |row| {
            let created_at: String = row.get(2)?;
            let updated_at: String = row.get(3)?;
            Ok(ChatSummary {
                chat_id: row.get(0)?,
                user_id: row.get(1)?,
                created_at: parse_timestamp(&created_at),
                updated_at: parse_timestamp(&updated_at),
                message_count: row.get(4)?,
            })
        })?;

        Ok(chats.filter_map(|c| c.ok()).collect())
    }

    /// Delete a chat and its messages. Returns whether the chat existed.
    #[instrument(skip(self))]
    pub fn delete_chat(&self, chat_id: &str) -> Result<bool> {
        let conn = self.lock_conn()?;

        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM messages WHERE chat_id = ?1", params![chat_id])?;
        let deleted = tx.execute("DELETE FROM chats WHERE chat_id = ?1", params![chat_id])?;
        tx.commit()?;

        if deleted > 0 {
            info!("Deleted chat {}", chat_id);
        }
        Ok(deleted > 0)
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_create_append_get() {
        let store = TranscriptStore::in_memory().unwrap();

        let chat_id = store.create_chat("alice").unwrap();
        assert!(store.append_turn(&chat_id, "hello", "hi there").unwrap());
        assert!(store.append_turn(&chat_id, "who are you", "a cop").unwrap());

        let chat = store.get_chat(&chat_id).unwrap().unwrap();
        assert_eq!(chat.user_id, "alice");
        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.messages[0].message, "hello");
        assert_eq!(chat.messages[1].response, "a cop");
    }

    #[test]
    fn test_get_missing_chat() {
        let store = TranscriptStore::in_memory().unwrap();
        assert!(store.get_chat("nope").unwrap().is_none());
    }

    #[test]
    fn test_append_to_missing_chat() {
        let store = TranscriptStore::in_memory().unwrap();
        assert!(!store.append_turn("nope", "hello", "hi").unwrap());
    }

    #[test]
    fn test_user_chats_newest_first() {
        let store = TranscriptStore::in_memory().unwrap();

        let first = store.create_chat("alice").unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let second = store.create_chat("alice").unwrap();
        store.create_chat("bob").unwrap();

        let chats = store.user_chats("alice").unwrap();
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].chat_id, second);

        // Appending touches updated_at and moves the chat to the front.
        std::thread::sleep(Duration::from_millis(5));
        store.append_turn(&first, "hello", "hi").unwrap();

        let chats = store.user_chats("alice").unwrap();
        assert_eq!(chats[0].chat_id, first);
        assert_eq!(chats[0].message_count, 1);
    }

    #[test]
    fn test_delete_chat_removes_messages() {
        let store = TranscriptStore::in_memory().unwrap();

        let chat_id = store.create_chat("alice").unwrap();
        store.append_turn(&chat_id, "hello", "hi").unwrap();

        assert!(store.delete_chat(&chat_id).unwrap());
        assert!(store.get_chat(&chat_id).unwrap().is_none());
        assert!(!store.delete_chat(&chat_id).unwrap());
    }
}
