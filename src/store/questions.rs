use super::{like_pattern, page_window, placeholders, Store};
use crate::error::{BankError, BankResult};
use crate::types::{NewQuestion, Page, Question, QuestionUpdate};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tracing::info;

pub(super) const QUESTION_COLUMNS: &str =
    "q.id, q.type, q.content, q.options, q.correct_answer, q.explanation, q.created_at, q.updated_at, q.created_by_id";

pub(super) fn question_from_row(row: &Row<'_>) -> rusqlite::Result<Question> {
    let raw_options: Option<String> = row.get(3)?;
    let options = raw_options
        .map(|raw| serde_json::from_str::<Vec<String>>(&raw))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

    Ok(Question {
        id: row.get(0)?,
        question_type: row.get(1)?,
        content: row.get(2)?,
        options,
        correct_answer: row.get(4)?,
        explanation: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        created_by_id: row.get(8)?,
    })
}

fn options_json(options: Option<&Vec<String>>) -> BankResult<Option<String>> {
    Ok(options.map(serde_json::to_string).transpose()?)
}

const INSERT_QUESTION: &str = "INSERT INTO question \
    (type, content, options, correct_answer, explanation, created_at, updated_at, created_by_id) \
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, ?7)";

impl Store {
    pub fn create_question(&mut self, question: &NewQuestion) -> BankResult<Question> {
        question.validate()?;
        let now = Utc::now();
        self.conn.execute(
            INSERT_QUESTION,
            params![
                question.question_type,
                question.content,
                options_json(question.options.as_ref())?,
                question.correct_answer,
                question.explanation,
                now,
                question.created_by_id,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.find_question_by_id(id)?
            .ok_or_else(|| BankError::not_found(format!("Question {}", id)))
    }

    /// Insert a batch of questions in one transaction: either every row is
    /// written or none is.
    pub fn insert_questions(&mut self, questions: &[NewQuestion]) -> BankResult<Vec<i64>> {
        let now = Utc::now();
        let tx = self.conn.transaction()?;
        let mut ids = Vec::with_capacity(questions.len());
        {
            let mut stmt = tx.prepare(INSERT_QUESTION)?;
            for question in questions {
                question.validate()?;
                stmt.execute(params![
                    question.question_type,
                    question.content,
                    options_json(question.options.as_ref())?,
                    question.correct_answer,
                    question.explanation,
                    now,
                    question.created_by_id,
                ])?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        info!(count = ids.len(), "committed question batch");
        Ok(ids)
    }

    pub fn find_question_by_id(&self, id: i64) -> BankResult<Option<Question>> {
        let sql = format!("SELECT {} FROM question q WHERE q.id = ?1", QUESTION_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![id], question_from_row)
            .optional()?)
    }

    /// Questions whose id is in `ids`; unknown ids are ignored
    pub fn questions_by_ids(&self, ids: &[i64]) -> BankResult<Vec<Question>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM question q WHERE q.id IN ({}) ORDER BY q.id",
            QUESTION_COLUMNS,
            placeholders(ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), question_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn all_questions(&self) -> BankResult<Vec<Question>> {
        let sql = format!("SELECT {} FROM question q ORDER BY q.id", QUESTION_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], question_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Newest-first listing, optionally filtered by a case-insensitive
    /// substring of the content or the correct answer.
    pub fn list_questions(
        &self,
        query: Option<&str>,
        page: u32,
        per_page: u32,
    ) -> BankResult<Page<Question>> {
        let (page, per_page, offset) = page_window(page, per_page);
        let filter = query.map(str::trim).filter(|q| !q.is_empty());

        let (where_clause, pattern) = match filter {
            Some(q) => (
                "WHERE q.content LIKE ?1 ESCAPE '\\' OR q.correct_answer LIKE ?1 ESCAPE '\\'",
                Some(like_pattern(q)),
            ),
            None => ("WHERE ?1 IS NULL", None),
        };

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM question q {}", where_clause),
            params![pattern],
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {} FROM question q {} ORDER BY q.created_at DESC, q.id DESC LIMIT ?2 OFFSET ?3",
            QUESTION_COLUMNS, where_clause
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let items = stmt
            .query_map(params![pattern, per_page, offset], question_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            total: total as u64,
            page,
            per_page,
        })
    }

    pub fn update_question(&mut self, id: i64, update: &QuestionUpdate) -> BankResult<Question> {
        let current = self
            .find_question_by_id(id)?
            .ok_or_else(|| BankError::not_found(format!("Question {}", id)))?;
        let merged = update.apply_to(&current);
        crate::types::validate_question_fields(
            merged.question_type,
            &merged.content,
            merged.options.as_deref(),
            &merged.correct_answer,
        )?;

        self.conn.execute(
            "UPDATE question SET type = ?1, content = ?2, options = ?3, correct_answer = ?4, \
             explanation = ?5, updated_at = ?6 WHERE id = ?7",
            params![
                merged.question_type,
                merged.content,
                options_json(merged.options.as_ref())?,
                merged.correct_answer,
                merged.explanation,
                Utc::now(),
                id,
            ],
        )?;
        self.find_question_by_id(id)?
            .ok_or_else(|| BankError::not_found(format!("Question {}", id)))
    }

    /// Delete one question; it disappears from every paper that held it
    pub fn delete_question(&mut self, id: i64) -> BankResult<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM question WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(BankError::not_found(format!("Question {}", id)));
        }
        Ok(())
    }

    /// Delete every listed question, returning how many rows existed
    pub fn delete_questions(&mut self, ids: &[i64]) -> BankResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let sql = format!("DELETE FROM question WHERE id IN ({})", placeholders(ids.len()));
        let tx = self.conn.transaction()?;
        let deleted = tx.execute(&sql, params_from_iter(ids.iter()))?;
        tx.commit()?;
        Ok(deleted)
    }

    pub fn clear_questions(&mut self) -> BankResult<usize> {
        Ok(self.conn.execute("DELETE FROM question", [])?)
    }

    pub fn count_questions(&self) -> BankResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM question", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
