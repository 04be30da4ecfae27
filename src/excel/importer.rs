//! Excel importer implementation - Excel (.xlsx) → header-keyed rows

use super::columns;
use crate::error::{BankError, BankResult};
use calamine::{Data, Range, Reader, Xlsx};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

/// Excel importer reading the first worksheet of an uploaded workbook
#[derive(Debug)]
pub struct ExcelImporter {
    bytes: Vec<u8>,
}

impl ExcelImporter {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> BankResult<Self> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| BankError::SheetRead(format!("{}: {}", path.as_ref().display(), e)))?;
        Ok(Self::from_bytes(bytes))
    }

    /// Parse the first sheet and check the required columns are present.
    ///
    /// A missing required column rejects the whole sheet: no row is returned.
    pub fn read_sheet(&self) -> BankResult<QuestionSheet> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(self.bytes.as_slice()))
            .map_err(|e| BankError::SheetRead(e.to_string()))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| BankError::SheetRead("workbook contains no worksheets".to_string()))?
            .map_err(|e| BankError::SheetRead(e.to_string()))?;

        let sheet = QuestionSheet::from_range(&range);
        sheet.require_columns()?;
        Ok(sheet)
    }
}

/// Parsed worksheet: header lookup plus raw data rows
#[derive(Debug, Clone)]
pub struct QuestionSheet {
    columns: HashMap<String, usize>,
    /// 1-based sheet row of the header line
    header_row: u32,
    rows: Vec<Vec<Data>>,
}

impl QuestionSheet {
    pub(crate) fn from_range(range: &Range<Data>) -> Self {
        let header_row = range.start().map(|(row, _)| row + 1).unwrap_or(1);
        let mut rows = range.rows();

        let mut columns = HashMap::new();
        if let Some(header) = rows.next() {
            for (idx, cell) in header.iter().enumerate() {
                let name = match cell {
                    Data::Empty => continue,
                    Data::String(s) => s.trim().to_string(),
                    other => other.to_string(),
                };
                // First occurrence wins on duplicate headers
                columns.entry(name).or_insert(idx);
            }
        }

        Self {
            columns,
            header_row,
            rows: rows.map(|row| row.to_vec()).collect(),
        }
    }

    fn require_columns(&self) -> BankResult<()> {
        let missing: Vec<String> = columns::REQUIRED
            .iter()
            .filter(|col| !self.has_column(col))
            .map(|col| col.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(BankError::MissingColumns(missing))
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Data rows in sheet order
    pub fn rows(&self) -> impl Iterator<Item = SheetRow<'_>> {
        self.rows.iter().enumerate().map(move |(idx, cells)| SheetRow {
            display_row: self.header_row + 1 + idx as u32,
            cells,
            columns: &self.columns,
        })
    }
}

/// One data row of a [`QuestionSheet`]
#[derive(Debug, Clone, Copy)]
pub struct SheetRow<'a> {
    /// 1-based row number as shown by a spreadsheet application
    pub display_row: u32,
    cells: &'a [Data],
    columns: &'a HashMap<String, usize>,
}

impl<'a> SheetRow<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Data> {
        self.columns
            .get(column)
            .and_then(|&idx| self.cells.get(idx))
    }

    /// Cell text, or `None` when the column is absent or the cell is blank.
    /// Error-valued cells (`#N/A`, `#REF!`, ...) are reported as errors.
    pub fn text(&self, column: &str) -> BankResult<Option<String>> {
        match self.get(column) {
            None => Ok(None),
            Some(cell) => cell_text(cell)
                .map_err(|e| BankError::Validation(format!("Invalid value in column {}: {}", column, e))),
        }
    }
}

fn cell_text(cell: &Data) -> Result<Option<String>, String> {
    let text = match cell {
        Data::Empty => return Ok(None),
        Data::Error(e) => return Err(e.to_string()),
        Data::String(s) => s.clone(),
        Data::Float(f) => format_number(*f),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    };
    if text.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(text))
    }
}

/// Render whole numbers without a trailing `.0`
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
