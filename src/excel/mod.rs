//! Excel import/export for question lists
//!
//! This module maps between a single-sheet workbook and question records:
//! - Export: questions → .xlsx (one row per question, localized headers)
//! - Template: four example rows, one per question type
//! - Import: .xlsx → header-keyed rows for the import pipeline

mod exporter;
mod importer;

pub use exporter::{parse_id_list, ExcelExporter, ExportScope};
pub use importer::{ExcelImporter, QuestionSheet, SheetRow};

/// Localized column headers
pub mod columns {
    pub const ID: &str = "题目ID";
    pub const TYPE: &str = "题目类型";
    pub const CONTENT: &str = "题目内容";
    pub const OPTIONS: &str = "选项";
    pub const CORRECT_ANSWER: &str = "正确答案";
    pub const EXPLANATION: &str = "解析";

    /// Columns an uploaded sheet must contain, in reporting order
    pub const REQUIRED: [&str; 3] = [TYPE, CONTENT, CORRECT_ANSWER];
}

pub const EXPORT_SHEET_NAME: &str = "题目列表";
pub const TEMPLATE_SHEET_NAME: &str = "题目模板";
pub const TEMPLATE_FILENAME: &str = "question_template.xlsx";

/// Accepted upload extension
pub const XLSX_EXTENSION: &str = ".xlsx";
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Widest column the exporter will produce (in characters)
pub const MAX_COLUMN_WIDTH: usize = 50;
