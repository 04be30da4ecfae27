use thiserror::Error;

pub type BankResult<T> = Result<T, BankError>;

#[derive(Error, Debug)]
pub enum BankError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Login required")]
    Unauthorized,

    #[error("Access denied")]
    Forbidden,

    #[error("{0}")]
    InvalidUpload(String),

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Error reading file: {0}")]
    SheetRead(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Password error: {0}")]
    Password(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl BankError {
    pub fn not_found(what: impl Into<String>) -> Self {
        BankError::NotFound(what.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_lists_every_column() {
        let err = BankError::MissingColumns(vec!["题目类型".to_string(), "正确答案".to_string()]);
        assert_eq!(err.to_string(), "Missing required columns: 题目类型, 正确答案");
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(BankError::not_found("Question 4").to_string(), "Question 4 not found");
    }

    #[test]
    fn test_database_error_prefix() {
        let err = BankError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(err.to_string().starts_with("Database error: "));
    }
}
