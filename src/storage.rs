use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{Connection, Row, Transaction};
use serde::de::DeserializeOwned;

use crate::error::{AppError, AppResult};

const DATABASE_FILE: &str = "content.db";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS reading_tests (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        passage_ids TEXT NOT NULL DEFAULT '[]',
        question_distribution TEXT NOT NULL DEFAULT '{}',
        time_limit INTEGER NOT NULL DEFAULT 60,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS passages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        test_id INTEGER REFERENCES reading_tests(id) ON DELETE SET NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS paragraphs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        passage_id INTEGER NOT NULL REFERENCES passages(id) ON DELETE CASCADE,
        text TEXT NOT NULL,
        position INTEGER NOT NULL,
        label TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_paragraphs_passage
        ON paragraphs(passage_id, position);

    CREATE TABLE IF NOT EXISTS question_packs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        passage_id INTEGER NOT NULL REFERENCES passages(id) ON DELETE CASCADE,
        format TEXT NOT NULL,
        start_question INTEGER NOT NULL,
        end_question INTEGER NOT NULL,
        CHECK (end_question >= start_question)
    );

    CREATE INDEX IF NOT EXISTS idx_question_packs_passage
        ON question_packs(passage_id, start_question);

    CREATE TABLE IF NOT EXISTS questions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        pack_id INTEGER NOT NULL REFERENCES question_packs(id) ON DELETE CASCADE,
        format TEXT NOT NULL,
        number INTEGER,
        title TEXT,
        text TEXT NOT NULL,
        body TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_questions_pack
        ON questions(pack_id, number);
";

/// SQLite-backed store for all reading content.
///
/// Every mutating operation goes through [`ContentStore::write`], which runs
/// the whole operation inside one transaction.
pub struct ContentStore {
    conn: Mutex<Connection>,
}

impl ContentStore {
    pub fn new(data_dir: &Path) -> AppResult<Self> {
        tracing::info!("Creating content storage at {:?}", data_dir);
        std::fs::create_dir_all(data_dir)?;
        Self::open(&data_dir.join(DATABASE_FILE))
    }

    pub fn open(db_path: &Path) -> AppResult<Self> {
        tracing::info!("Opening database at {:?}", db_path);
        let conn = Connection::open(db_path)?;
        Self::initialize(conn)
    }

    fn initialize(conn: Connection) -> AppResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn read<T>(&self, f: impl FnOnce(&Connection) -> AppResult<T>) -> AppResult<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Internal("Lock poisoned".into()))?;
        f(&conn)
    }

    /// Runs `f` in a transaction; it commits only when `f` returns `Ok`.
    pub(crate) fn write<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> AppResult<T>,
    ) -> AppResult<T> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Internal("Lock poisoned".into()))?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

pub(crate) fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Reads a JSON-encoded TEXT column.
pub(crate) fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

pub(crate) fn require_text(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}
