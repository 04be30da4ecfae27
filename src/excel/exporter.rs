//! Excel exporter implementation

use super::{columns, EXPORT_SHEET_NAME, MAX_COLUMN_WIDTH, TEMPLATE_SHEET_NAME};
use crate::error::{BankError, BankResult};
use crate::store::Store;
use crate::types::{join_options, Question, QuestionType};
use chrono::{Local, NaiveDateTime};
use rust_xlsxwriter::{Format, Workbook};
use std::path::Path;

/// Which questions an export contains; decides the filename prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportScope {
    /// All questions of one paper
    Paper(i64),
    /// An explicit list of question ids
    Selected(Vec<i64>),
    All,
}

impl ExportScope {
    /// Build the scope from request parameters. A paper id wins over an id list.
    pub fn from_params(paper_id: Option<i64>, ids: Option<&str>) -> BankResult<Self> {
        if let Some(id) = paper_id {
            return Ok(ExportScope::Paper(id));
        }
        match ids.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Ok(ExportScope::Selected(parse_id_list(raw)?)),
            None => Ok(ExportScope::All),
        }
    }

    pub fn prefix(&self) -> String {
        match self {
            ExportScope::Paper(id) => format!("paper_{}_questions", id),
            ExportScope::Selected(_) => "selected_questions".to_string(),
            ExportScope::All => "all_questions".to_string(),
        }
    }

    /// `{prefix}_{YYYYMMDD_HHMMSS}.xlsx` for the given local time
    pub fn filename_at(&self, at: NaiveDateTime) -> String {
        format!("{}_{}.xlsx", self.prefix(), at.format("%Y%m%d_%H%M%S"))
    }

    pub fn filename(&self) -> String {
        self.filename_at(Local::now().naive_local())
    }

    /// Fetch the questions in scope. An unknown paper is an error, unknown
    /// ids in a selection are skipped.
    pub fn load(&self, store: &Store) -> BankResult<Vec<Question>> {
        match self {
            ExportScope::Paper(id) => {
                if store.find_paper_by_id(*id)?.is_none() {
                    return Err(BankError::not_found(format!("Paper {}", id)));
                }
                store.paper_questions(*id)
            }
            ExportScope::Selected(ids) => store.questions_by_ids(ids),
            ExportScope::All => store.all_questions(),
        }
    }
}

/// Parse a comma separated id list such as `1,2,3`
pub fn parse_id_list(raw: &str) -> BankResult<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .map_err(|_| BankError::Validation(format!("Invalid question id: {}", part)))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Number(f64),
    Text(String),
}

impl Cell {
    fn display_width(&self) -> usize {
        match self {
            Cell::Number(n) => n.to_string().chars().count(),
            Cell::Text(s) => s.chars().count(),
        }
    }
}

/// Excel exporter for question lists and the import template
pub struct ExcelExporter {
    sheet_name: &'static str,
    headers: Vec<&'static str>,
    rows: Vec<Vec<Cell>>,
}

impl ExcelExporter {
    /// One row per question: id, type label, content, options, answer, explanation
    pub fn questions(questions: &[Question]) -> Self {
        let rows = questions
            .iter()
            .map(|q| {
                vec![
                    Cell::Number(q.id as f64),
                    Cell::Text(q.question_type.label().to_string()),
                    Cell::Text(q.content.clone()),
                    Cell::Text(q.options.as_deref().map(join_options).unwrap_or_default()),
                    Cell::Text(q.correct_answer.clone()),
                    Cell::Text(q.explanation.clone().unwrap_or_default()),
                ]
            })
            .collect();

        Self {
            sheet_name: EXPORT_SHEET_NAME,
            headers: vec![
                columns::ID,
                columns::TYPE,
                columns::CONTENT,
                columns::OPTIONS,
                columns::CORRECT_ANSWER,
                columns::EXPLANATION,
            ],
            rows,
        }
    }

    /// Example workbook showing the expected layout for each question type
    pub fn template() -> Self {
        let examples: [(QuestionType, &str, &str, &str, &str); 4] = [
            (
                QuestionType::SingleChoice,
                "示例：1+1=?",
                "A.1|B.2|C.3|D.4",
                "B",
                "1+1=2",
            ),
            (
                QuestionType::MultipleChoice,
                "示例：以下哪些是编程语言？",
                "A.Python|B.Word|C.Java|D.Excel",
                "A,C",
                "Python和Java是编程语言",
            ),
            (
                QuestionType::Essay,
                "示例：简述Python的特点",
                "",
                "1.简单易学\n2.开源免费\n3.跨平台",
                "这是解析",
            ),
            (
                QuestionType::FillBlank,
                "示例：___是世界上最大的搜索引擎",
                "",
                "谷歌",
                "截至2024年谷歌仍是最大搜索引擎",
            ),
        ];

        let rows = examples
            .iter()
            .map(|(t, content, options, answer, explanation)| {
                vec![
                    Cell::Text(t.label().to_string()),
                    Cell::Text(content.to_string()),
                    Cell::Text(options.to_string()),
                    Cell::Text(answer.to_string()),
                    Cell::Text(explanation.to_string()),
                ]
            })
            .collect();

        Self {
            sheet_name: TEMPLATE_SHEET_NAME,
            headers: vec![
                columns::TYPE,
                columns::CONTENT,
                columns::OPTIONS,
                columns::CORRECT_ANSWER,
                columns::EXPLANATION,
            ],
            rows,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Column widths: longest value (header included) + 2, capped
    fn column_widths(&self) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(col, header)| {
                let longest = self
                    .rows
                    .iter()
                    .filter_map(|row| row.get(col))
                    .map(Cell::display_width)
                    .chain(std::iter::once(header.chars().count()))
                    .max()
                    .unwrap_or(0);
                (longest + 2).min(MAX_COLUMN_WIDTH)
            })
            .collect()
    }

    fn build_workbook(&self) -> BankResult<Workbook> {
        let mut workbook = Workbook::new();
        let header_format = Format::new().set_bold();
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(self.sheet_name)
            .map_err(|e| BankError::Export(format!("Failed to set worksheet name: {}", e)))?;

        for (col, header) in self.headers.iter().enumerate() {
            worksheet
                .write_string_with_format(0, col as u16, *header, &header_format)
                .map_err(|e| BankError::Export(format!("Failed to write header: {}", e)))?;
        }

        for (row_idx, row) in self.rows.iter().enumerate() {
            let excel_row = (row_idx + 1) as u32;
            for (col, cell) in row.iter().enumerate() {
                match cell {
                    Cell::Number(n) => {
                        worksheet.write_number(excel_row, col as u16, *n).map_err(|e| {
                            BankError::Export(format!("Failed to write cell: {}", e))
                        })?;
                    }
                    // Blank cells stay blank so they read back as missing
                    Cell::Text(s) if s.is_empty() => {}
                    Cell::Text(s) => {
                        worksheet.write_string(excel_row, col as u16, s).map_err(|e| {
                            BankError::Export(format!("Failed to write cell: {}", e))
                        })?;
                    }
                }
            }
        }

        for (col, width) in self.column_widths().into_iter().enumerate() {
            worksheet
                .set_column_width(col as u16, width as f64)
                .map_err(|e| BankError::Export(format!("Failed to set column width: {}", e)))?;
        }

        Ok(workbook)
    }

    /// Serialize the workbook for a download response
    pub fn to_bytes(&self) -> BankResult<Vec<u8>> {
        let mut workbook = self.build_workbook()?;
        workbook
            .save_to_buffer()
            .map_err(|e| BankError::Export(format!("Failed to build Excel file: {}", e)))
    }

    pub fn save(&self, output_path: &Path) -> BankResult<()> {
        let mut workbook = self.build_workbook()?;
        workbook
            .save(output_path)
            .map_err(|e| BankError::Export(format!("Failed to save Excel file: {}", e)))
    }
}
