//! Bulk question import from an uploaded workbook
//!
//! Rows are validated one at a time. A bad row is recorded and skipped, the
//! remaining rows still import. Valid rows are staged in memory and written
//! in a single transaction at the end, so a database failure leaves the
//! bank untouched.

use crate::error::{BankError, BankResult};
use crate::excel::{columns, ExcelImporter, QuestionSheet, SheetRow, XLSX_EXTENSION};
use crate::store::Store;
use crate::types::{split_options, NewQuestion, QuestionType};
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

/// Number of row errors listed individually in [`ImportReport::error_messages`]
pub const MAX_LISTED_ERRORS: usize = 5;

/// Why a single row was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub row: u32,
    pub message: String,
}

impl RowError {
    fn new(row: &SheetRow<'_>, message: impl Into<String>) -> Self {
        Self {
            row: row.display_row,
            message: message.into(),
        }
    }
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row {}: {}", self.row, self.message)
    }
}

/// Outcome of an import run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub success_count: usize,
    pub error_count: usize,
    /// Row errors in sheet order
    pub errors: Vec<RowError>,
    /// Ids of the created questions
    pub question_ids: Vec<i64>,
}

impl ImportReport {
    /// Combined counts line, e.g.
    /// `Successfully imported 2 questions | Failed to import 1 questions`
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if self.success_count > 0 {
            parts.push(format!("Successfully imported {} questions", self.success_count));
        }
        if self.error_count > 0 {
            parts.push(format!("Failed to import {} questions", self.error_count));
        }
        if parts.is_empty() {
            return "No questions found in file".to_string();
        }
        parts.join(" | ")
    }

    /// The first few row errors, followed by a count of the rest
    pub fn error_messages(&self) -> Vec<String> {
        let mut messages: Vec<String> = self
            .errors
            .iter()
            .take(MAX_LISTED_ERRORS)
            .map(RowError::to_string)
            .collect();
        if self.errors.len() > MAX_LISTED_ERRORS {
            messages.push(format!(
                "... and {} more errors",
                self.errors.len() - MAX_LISTED_ERRORS
            ));
        }
        messages
    }

    pub fn is_success(&self) -> bool {
        self.success_count > 0
    }
}

/// Rows that passed validation, ready to be committed
#[derive(Debug, Default)]
pub struct StagedImport {
    pub questions: Vec<NewQuestion>,
    pub report: ImportReport,
}

/// Reject uploads whose name is missing or does not end in `.xlsx`
pub fn check_upload_name(filename: Option<&str>) -> BankResult<()> {
    match filename {
        None => Err(BankError::InvalidUpload("No file uploaded".to_string())),
        Some(name) if name.is_empty() => {
            Err(BankError::InvalidUpload("No file selected".to_string()))
        }
        Some(name) if !name.ends_with(XLSX_EXTENSION) => Err(BankError::InvalidUpload(
            "Please upload an Excel file (.xlsx)".to_string(),
        )),
        Some(_) => Ok(()),
    }
}

/// Validate every row of the sheet, staging the valid ones
pub fn stage_rows(sheet: &QuestionSheet, created_by_id: Option<i64>) -> StagedImport {
    let mut staged = StagedImport::default();
    let has_options = sheet.has_column(columns::OPTIONS);
    let has_explanation = sheet.has_column(columns::EXPLANATION);

    for row in sheet.rows() {
        match build_question(&row, has_options, has_explanation, created_by_id) {
            Ok(question) => {
                staged.questions.push(question);
                staged.report.success_count += 1;
            }
            Err(err) => {
                warn!(row = err.row, "skipping row: {}", err.message);
                staged.report.error_count += 1;
                staged.report.errors.push(err);
            }
        }
    }
    staged
}

fn build_question(
    row: &SheetRow<'_>,
    has_options: bool,
    has_explanation: bool,
    created_by_id: Option<i64>,
) -> Result<NewQuestion, RowError> {
    let text = |column: &str| row.text(column).map_err(|e| RowError::new(row, e.to_string()));

    let (label, content, answer) = match (
        text(columns::TYPE)?,
        text(columns::CONTENT)?,
        text(columns::CORRECT_ANSWER)?,
    ) {
        (Some(label), Some(content), Some(answer)) => (label, content, answer),
        _ => return Err(RowError::new(row, "Missing required fields")),
    };

    let label = label.trim();
    let question_type = QuestionType::from_label(label)
        .ok_or_else(|| RowError::new(row, format!("Invalid question type \"{}\"", label)))?;

    let options = if has_options {
        text(columns::OPTIONS)?
            .map(|raw| split_options(&raw))
            .filter(|opts| !opts.is_empty())
    } else {
        None
    };
    if question_type.is_choice() && options.is_none() {
        return Err(RowError::new(row, "Choice questions must have options"));
    }

    let explanation = if has_explanation {
        text(columns::EXPLANATION)?.map(|e| e.trim().to_string())
    } else {
        None
    };

    Ok(NewQuestion {
        question_type,
        content: content.trim().to_string(),
        options,
        correct_answer: answer.trim().to_string(),
        explanation,
        created_by_id,
    })
}

/// Stage the sheet and commit all valid rows at once.
///
/// A commit failure returns the database error and nothing is persisted.
pub fn import_sheet(
    store: &mut Store,
    sheet: &QuestionSheet,
    created_by_id: Option<i64>,
) -> BankResult<ImportReport> {
    let StagedImport {
        questions,
        mut report,
    } = stage_rows(sheet, created_by_id);

    if !questions.is_empty() {
        report.question_ids = store.insert_questions(&questions)?;
    }

    info!(
        succeeded = report.success_count,
        failed = report.error_count,
        "question import finished"
    );
    Ok(report)
}

/// Read an uploaded workbook and import it
pub fn import_workbook(
    store: &mut Store,
    bytes: Vec<u8>,
    created_by_id: Option<i64>,
) -> BankResult<ImportReport> {
    let sheet = ExcelImporter::from_bytes(bytes).read_sheet()?;
    import_sheet(store, &sheet, created_by_id)
}
