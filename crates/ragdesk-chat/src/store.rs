//! Conversation memory: an append-only log of answered questions.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use ragdesk_core::traits::ConversationStore;
use ragdesk_core::types::{ConversationRecord, ConversationTurn, EscalationStats};
use ragdesk_core::{Error, Result};
use rusqlite::{params, Connection};
use tracing::info;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS conversation (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT,
    user_id TEXT,
    question TEXT,
    context TEXT,
    answer TEXT,
    escalated INTEGER DEFAULT 0
);
CREATE INDEX IF NOT EXISTS conversation_user ON conversation(user_id, id);
";

fn storage(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

/// SQLite-backed store. One connection, serialized behind a mutex.
pub struct SqliteConversationStore {
    conn: Mutex<Connection>,
}

impl SqliteConversationStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(storage)?;
        info!(path = %path.display(), "conversation store opened");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().map_err(storage)?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL).map_err(storage)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::Storage("connection lock poisoned".into()))
    }
}

impl ConversationStore for SqliteConversationStore {
    fn append(&self, record: &ConversationRecord) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT INTO conversation (timestamp, user_id, question, context, answer, escalated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.timestamp,
                    record.user_id,
                    record.question,
                    record.context,
                    record.answer,
                    record.escalated as i64,
                ],
            )
            .map_err(storage)?;
        Ok(())
    }

    fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT user_id, question, answer FROM conversation
                 WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(storage)?;
        let rows = stmt
            .query_map(params![user_id, limit as i64], |row| {
                Ok(ConversationTurn {
                    user_id: row.get(0)?,
                    question: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    answer: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                })
            })
            .map_err(storage)?;
        let turns = rows.collect::<std::result::Result<Vec<_>, _>>().map_err(storage)?;
        Ok(turns)
    }

    fn stats(&self) -> Result<EscalationStats> {
        let (escalated_users, cases, users, questions): (i64, i64, i64, i64) = self
            .conn()?
            .query_row(
                "SELECT
                    COUNT(DISTINCT CASE WHEN escalated = 1 THEN user_id END),
                    COALESCE(SUM(CASE WHEN escalated = 1 THEN 1 ELSE 0 END), 0),
                    COUNT(DISTINCT user_id),
                    COUNT(*)
                 FROM conversation",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .map_err(storage)?;
        Ok(EscalationStats::new(escalated_users as u64, cases as u64, users as u64, questions as u64))
    }
}

/// Process-local store with the same semantics; for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryConversationStore {
    records: Mutex<Vec<ConversationRecord>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ConversationRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<ConversationRecord>>> {
        self.records.lock().map_err(|_| Error::Storage("record lock poisoned".into()))
    }
}

impl ConversationStore for MemoryConversationStore {
    fn append(&self, record: &ConversationRecord) -> Result<()> {
        self.lock()?.push(record.clone());
        Ok(())
    }

    fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        Ok(self
            .lock()?
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .take(limit)
            .map(|r| ConversationTurn {
                user_id: r.user_id.clone(),
                question: r.question.clone(),
                answer: r.answer.clone(),
            })
            .collect())
    }

    fn stats(&self) -> Result<EscalationStats> {
        let records = self.lock()?;
        let escalated: Vec<&ConversationRecord> = records.iter().filter(|r| r.escalated).collect();
        let escalated_users: HashSet<&str> = escalated.iter().map(|r| r.user_id.as_str()).collect();
        let users: HashSet<&str> = records.iter().map(|r| r.user_id.as_str()).collect();
        Ok(EscalationStats::new(
            escalated_users.len() as u64,
            escalated.len() as u64,
            users.len() as u64,
            records.len() as u64,
        ))
    }
}
