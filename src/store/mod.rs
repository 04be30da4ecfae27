//! SQLite-backed entity store
//!
//! Holds users, questions, papers and the `paper_questions` association.
//! Foreign keys are enforced, so deleting a question or a paper removes its
//! association rows, and deleting a user only clears attribution.

mod papers;
mod questions;
mod users;

use crate::error::BankResult;
use crate::types::{QuestionType, DEFAULT_PER_PAGE, MAX_PER_PAGE};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::Connection;
use std::path::Path;
use tracing::debug;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS "user" (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL UNIQUE,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    is_admin      INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS question (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    type           TEXT NOT NULL CHECK (type IN ('single_choice', 'multiple_choice', 'essay', 'fill_blank')),
    content        TEXT NOT NULL,
    options        TEXT,
    correct_answer TEXT NOT NULL,
    explanation    TEXT,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    created_by_id  INTEGER REFERENCES "user"(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS paper (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    title         TEXT NOT NULL,
    description   TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    created_by_id INTEGER REFERENCES "user"(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS paper_questions (
    paper_id    INTEGER NOT NULL REFERENCES paper(id) ON DELETE CASCADE,
    question_id INTEGER NOT NULL REFERENCES question(id) ON DELETE CASCADE,
    PRIMARY KEY (paper_id, question_id)
);

CREATE INDEX IF NOT EXISTS idx_question_created_at ON question(created_at);
CREATE INDEX IF NOT EXISTS idx_paper_created_at ON paper(created_at);
"#;

/// Persistent store for the question bank
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) a database file and make sure the schema exists
    pub fn open<P: AsRef<Path>>(path: P) -> BankResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "opened question bank database");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> BankResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> BankResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }
}

/// Normalized `(page, limit, offset)` for a listing request
pub(crate) fn page_window(page: u32, per_page: u32) -> (u32, u32, i64) {
    let page = page.max(1);
    let per_page = match per_page {
        0 => DEFAULT_PER_PAGE,
        n => n.min(MAX_PER_PAGE),
    };
    let offset = i64::from(page - 1).saturating_mul(i64::from(per_page));
    (page, per_page, offset)
}

/// `%query%` pattern for a LIKE ... ESCAPE '\' clause
pub(crate) fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// `?, ?, ?` placeholder list for an IN clause
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

impl ToSql for QuestionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for QuestionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_creates_schema() {
        let store = Store::open_in_memory().unwrap();
        let tables: Vec<String> = store
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        for expected in ["paper", "paper_questions", "question", "user"] {
            assert!(tables.iter().any(|t| t == expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_schema_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank.db");
        Store::open(&path).unwrap();
        Store::open(&path).unwrap();
    }

    #[test]
    fn test_page_window_clamps() {
        assert_eq!(page_window(0, 20), (1, 20, 0));
        assert_eq!(page_window(3, 10), (3, 10, 20));
        assert_eq!(page_window(1, 0), (1, DEFAULT_PER_PAGE, 0));
    }

    #[test]
    fn test_page_window_extreme_values() {
        let (page, per_page, offset) = page_window(u32::MAX, u32::MAX);
        assert_eq!(page, u32::MAX);
        assert_eq!(per_page, MAX_PER_PAGE);
        assert_eq!(offset, i64::from(u32::MAX - 1) * i64::from(MAX_PER_PAGE));
    }

    #[test]
    fn test_listing_with_extreme_page_is_empty() {
        let store = Store::open_in_memory().unwrap();
        let page = store.list_questions(None, u32::MAX, u32::MAX).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.per_page, MAX_PER_PAGE);
        assert!(!page.has_next());
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%"), "%50\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern("rust"), "%rust%");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }
}
