use super::{like_pattern, page_window, Store};
use crate::error::{BankError, BankResult};
use crate::types::{NewUser, Page, User, UserUpdate};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

const USER_COLUMNS: &str = "id, username, email, password_hash, is_admin, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        is_admin: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl Store {
    /// Create a user after checking username and email are free
    pub fn create_user(&mut self, user: &NewUser) -> BankResult<User> {
        if user.username.trim().is_empty() || user.email.trim().is_empty() {
            return Err(BankError::Validation("Missing fields".to_string()));
        }
        self.ensure_unique("username", &user.username, None)?;
        self.ensure_unique("email", &user.email, None)?;

        self.conn.execute(
            r#"INSERT INTO "user" (username, email, password_hash, is_admin, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                user.username,
                user.email,
                user.password_hash,
                user.is_admin,
                Utc::now()
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.find_user_by_id(id)?
            .ok_or_else(|| BankError::not_found(format!("User {}", id)))
    }

    /// Reject a username/email already used by another account
    fn ensure_unique(&self, column: &str, value: &str, exclude_id: Option<i64>) -> BankResult<()> {
        let sql = format!(
            r#"SELECT EXISTS(SELECT 1 FROM "user" WHERE {} = ?1 AND (?2 IS NULL OR id != ?2))"#,
            column
        );
        let taken: bool = self
            .conn
            .query_row(&sql, params![value, exclude_id], |row| row.get(0))?;
        if taken {
            let label = match column {
                "username" => "Username",
                _ => "Email",
            };
            return Err(BankError::Conflict(format!("{} already exists", label)));
        }
        Ok(())
    }

    pub fn find_user_by_id(&self, id: i64) -> BankResult<Option<User>> {
        let sql = format!(r#"SELECT {} FROM "user" WHERE id = ?1"#, USER_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![id], user_from_row)
            .optional()?)
    }

    pub fn find_user_by_username(&self, username: &str) -> BankResult<Option<User>> {
        let sql = format!(r#"SELECT {} FROM "user" WHERE username = ?1"#, USER_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![username], user_from_row)
            .optional()?)
    }

    /// Newest-first user listing filtered on username or email
    pub fn list_users(&self, query: Option<&str>, page: u32, per_page: u32) -> BankResult<Page<User>> {
        let (page, per_page, offset) = page_window(page, per_page);
        let pattern = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(like_pattern);
        let where_clause =
            r"WHERE ?1 IS NULL OR username LIKE ?1 ESCAPE '\' OR email LIKE ?1 ESCAPE '\'";

        let total: i64 = self.conn.query_row(
            &format!(r#"SELECT COUNT(*) FROM "user" {}"#, where_clause),
            params![pattern],
            |row| row.get(0),
        )?;
        let sql = format!(
            r#"SELECT {} FROM "user" {} ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"#,
            USER_COLUMNS, where_clause
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let items = stmt
            .query_map(params![pattern, per_page, offset], user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            total: total as u64,
            page,
            per_page,
        })
    }

    pub fn update_user(&mut self, id: i64, update: &UserUpdate) -> BankResult<User> {
        let mut user = self
            .find_user_by_id(id)?
            .ok_or_else(|| BankError::not_found(format!("User {}", id)))?;

        let blank = |value: &Option<String>| value.as_deref().is_some_and(|v| v.trim().is_empty());
        if blank(&update.username) || blank(&update.email) {
            return Err(BankError::Validation("Missing fields".to_string()));
        }

        if let Some(ref username) = update.username {
            self.ensure_unique("username", username, Some(id))?;
            user.username = username.clone();
        }
        if let Some(ref email) = update.email {
            self.ensure_unique("email", email, Some(id))?;
            user.email = email.clone();
        }
        if let Some(is_admin) = update.is_admin {
            user.is_admin = is_admin;
        }

        self.conn.execute(
            r#"UPDATE "user" SET username = ?1, email = ?2, is_admin = ?3 WHERE id = ?4"#,
            params![user.username, user.email, user.is_admin, id],
        )?;
        Ok(user)
    }

    pub fn set_password_hash(&mut self, id: i64, password_hash: &str) -> BankResult<()> {
        let changed = self.conn.execute(
            r#"UPDATE "user" SET password_hash = ?1 WHERE id = ?2"#,
            params![password_hash, id],
        )?;
        if changed == 0 {
            return Err(BankError::not_found(format!("User {}", id)));
        }
        Ok(())
    }

    /// Delete a user; their questions and papers lose attribution only
    pub fn delete_user(&mut self, id: i64) -> BankResult<()> {
        let deleted = self
            .conn
            .execute(r#"DELETE FROM "user" WHERE id = ?1"#, params![id])?;
        if deleted == 0 {
            return Err(BankError::not_found(format!("User {}", id)));
        }
        Ok(())
    }

    pub fn count_users(&self) -> BankResult<u64> {
        let count: i64 = self
            .conn
            .query_row(r#"SELECT COUNT(*) FROM "user""#, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
