use super::questions::{question_from_row, QUESTION_COLUMNS};
use super::{page_window, Store};
use crate::error::{BankError, BankResult};
use crate::types::{NewPaper, Page, Paper, PaperDetail, PaperUpdate, Question};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row, Transaction};

const PAPER_COLUMNS: &str = "p.id, p.title, p.description, p.created_at, p.updated_at, p.created_by_id, \
    (SELECT COUNT(*) FROM paper_questions pq WHERE pq.paper_id = p.id)";

fn paper_from_row(row: &Row<'_>) -> rusqlite::Result<Paper> {
    let count: i64 = row.get(6)?;
    Ok(Paper {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        created_by_id: row.get(5)?,
        question_count: count as usize,
    })
}

/// Link existing questions to a paper. Ids without a question row are
/// skipped so the association never points at missing questions.
fn link_questions(tx: &Transaction<'_>, paper_id: i64, question_ids: &[i64]) -> BankResult<()> {
    let mut stmt = tx.prepare(
        "INSERT OR IGNORE INTO paper_questions (paper_id, question_id) \
         SELECT ?1, id FROM question WHERE id = ?2",
    )?;
    for question_id in question_ids {
        stmt.execute(params![paper_id, question_id])?;
    }
    Ok(())
}

fn require_title(title: &str) -> BankResult<()> {
    if title.trim().is_empty() {
        return Err(BankError::Validation("Paper title is required".to_string()));
    }
    Ok(())
}

impl Store {
    pub fn create_paper(&mut self, paper: &NewPaper, created_by_id: Option<i64>) -> BankResult<Paper> {
        require_title(&paper.title)?;
        let now = Utc::now();
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO paper (title, description, created_at, updated_at, created_by_id) \
             VALUES (?1, ?2, ?3, ?3, ?4)",
            params![paper.title, paper.description, now, created_by_id],
        )?;
        let id = tx.last_insert_rowid();
        link_questions(&tx, id, &paper.questions)?;
        tx.commit()?;

        self.find_paper_by_id(id)?
            .ok_or_else(|| BankError::not_found(format!("Paper {}", id)))
    }

    pub fn find_paper_by_id(&self, id: i64) -> BankResult<Option<Paper>> {
        let sql = format!("SELECT {} FROM paper p WHERE p.id = ?1", PAPER_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![id], paper_from_row)
            .optional()?)
    }

    pub fn paper_questions(&self, paper_id: i64) -> BankResult<Vec<Question>> {
        let sql = format!(
            "SELECT {} FROM question q \
             JOIN paper_questions pq ON pq.question_id = q.id \
             WHERE pq.paper_id = ?1 ORDER BY q.id",
            QUESTION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![paper_id], question_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn paper_detail(&self, id: i64) -> BankResult<PaperDetail> {
        let paper = self
            .find_paper_by_id(id)?
            .ok_or_else(|| BankError::not_found(format!("Paper {}", id)))?;
        let questions = self.paper_questions(id)?;
        Ok(PaperDetail { paper, questions })
    }

    pub fn list_papers(&self, page: u32, per_page: u32) -> BankResult<Page<Paper>> {
        let (page, per_page, offset) = page_window(page, per_page);
        let total = self.count_papers()?;
        let sql = format!(
            "SELECT {} FROM paper p ORDER BY p.created_at DESC, p.id DESC LIMIT ?1 OFFSET ?2",
            PAPER_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let items = stmt
            .query_map(params![per_page, offset], paper_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page {
            items,
            total,
            page,
            per_page,
        })
    }

    /// Replace title and description; when `questions` is given the paper's
    /// question set is replaced as well.
    pub fn update_paper(&mut self, id: i64, update: &PaperUpdate) -> BankResult<Paper> {
        require_title(&update.title)?;
        let tx = self.conn.transaction()?;
        let changed = tx.execute(
            "UPDATE paper SET title = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
            params![update.title, update.description, Utc::now(), id],
        )?;
        if changed == 0 {
            return Err(BankError::not_found(format!("Paper {}", id)));
        }
        if let Some(ref question_ids) = update.questions {
            tx.execute("DELETE FROM paper_questions WHERE paper_id = ?1", params![id])?;
            link_questions(&tx, id, question_ids)?;
        }
        tx.commit()?;

        self.find_paper_by_id(id)?
            .ok_or_else(|| BankError::not_found(format!("Paper {}", id)))
    }

    /// Delete a paper. Its questions stay in the bank.
    pub fn delete_paper(&mut self, id: i64) -> BankResult<()> {
        let deleted = self.conn.execute("DELETE FROM paper WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(BankError::not_found(format!("Paper {}", id)));
        }
        Ok(())
    }

    pub fn count_papers(&self) -> BankResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM paper", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NewQuestion, QuestionType};

    fn seed_questions(store: &mut Store, n: usize) -> Vec<i64> {
        (0..n)
            .map(|i| {
                store
                    .create_question(&NewQuestion::new(
                        QuestionType::FillBlank,
                        format!("Q{}", i),
                        "answer",
                    ))
                    .unwrap()
                    .id
            })
            .collect()
    }

    fn new_paper(title: &str, questions: Vec<i64>) -> NewPaper {
        NewPaper {
            title: title.to_string(),
            description: Some("midterm".to_string()),
            questions,
        }
    }

    #[test]
    fn test_create_paper_skips_unknown_questions() {
        let mut store = Store::open_in_memory().unwrap();
        let ids = seed_questions(&mut store, 2);

        let paper = store
            .create_paper(&new_paper("Exam", vec![ids[0], ids[1], 404]), None)
            .unwrap();
        assert_eq!(paper.question_count, 2);
        assert_eq!(store.paper_questions(paper.id).unwrap().len(), 2);
    }

    #[test]
    fn test_create_paper_requires_title() {
        let mut store = Store::open_in_memory().unwrap();
        assert!(store.create_paper(&new_paper("  ", vec![]), None).is_err());
        assert_eq!(store.count_papers().unwrap(), 0);
    }

    #[test]
    fn test_deleting_question_removes_it_from_paper() {
        let mut store = Store::open_in_memory().unwrap();
        let ids = seed_questions(&mut store, 3);
        let paper = store.create_paper(&new_paper("Exam", ids.clone()), None).unwrap();

        store.delete_question(ids[1]).unwrap();

        let detail = store.paper_detail(paper.id).unwrap();
        assert_eq!(detail.paper.question_count, 2);
        assert!(detail.questions.iter().all(|q| q.id != ids[1]));
    }

    #[test]
    fn test_deleting_paper_keeps_questions() {
        let mut store = Store::open_in_memory().unwrap();
        let ids = seed_questions(&mut store, 2);
        let paper = store.create_paper(&new_paper("Exam", ids), None).unwrap();

        store.delete_paper(paper.id).unwrap();
        assert_eq!(store.count_papers().unwrap(), 0);
        assert_eq!(store.count_questions().unwrap(), 2);
    }

    #[test]
    fn test_update_paper_replaces_question_set() {
        let mut store = Store::open_in_memory().unwrap();
        let ids = seed_questions(&mut store, 3);
        let paper = store
            .create_paper(&new_paper("Exam", vec![ids[0], ids[1]]), None)
            .unwrap();

        let keep = PaperUpdate {
            title: "Renamed".to_string(),
            description: None,
            questions: None,
        };
        let updated = store.update_paper(paper.id, &keep).unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.description, None);
        assert_eq!(updated.question_count, 2);

        let replace = PaperUpdate {
            title: "Renamed".to_string(),
            description: None,
            questions: Some(vec![ids[2]]),
        };
        store.update_paper(paper.id, &replace).unwrap();
        let questions = store.paper_questions(paper.id).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].id, ids[2]);
    }

    #[test]
    fn test_update_missing_paper() {
        let mut store = Store::open_in_memory().unwrap();
        let update = PaperUpdate {
            title: "x".to_string(),
            ..Default::default()
        };
        assert!(matches!(store.update_paper(5, &update), Err(BankError::NotFound(_))));
    }

    #[test]
    fn test_list_papers_newest_first() {
        let mut store = Store::open_in_memory().unwrap();
        store.create_paper(&new_paper("First", vec![]), None).unwrap();
        store.create_paper(&new_paper("Second", vec![]), None).unwrap();

        let page = store.list_papers(1, 20).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].title, "Second");
    }
}
