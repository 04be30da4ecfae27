//! Quizbank - question bank and exam paper manager
//!
//! Questions (single choice, multiple choice, essay, fill-in-the-blank) are
//! kept in a SQLite store, grouped into papers and exchanged with teachers
//! as single-sheet Excel workbooks.
//!
//! # Features
//!
//! - Bulk import from .xlsx with per-row validation and an all-or-nothing commit
//! - Export of all, selected or one paper's questions, plus a fill-in template
//! - HTTP API with session login and admin management endpoints
//!
//! # Example
//!
//! ```no_run
//! use quizbank::import::import_workbook;
//! use quizbank::store::Store;
//!
//! let mut store = Store::open("quizbank.db")?;
//! let bytes = std::fs::read("questions.xlsx")?;
//! let report = import_workbook(&mut store, bytes, None)?;
//!
//! println!("{}", report.summary());
//! for line in report.error_messages() {
//!     println!("  {}", line);
//! }
//! # Ok::<(), quizbank::error::BankError>(())
//! ```

pub mod api;
pub mod auth;
pub mod cli;
pub mod error;
pub mod excel;
pub mod import;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use error::{BankError, BankResult};
pub use types::{NewQuestion, Paper, Question, QuestionType, User};
