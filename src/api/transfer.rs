//! Excel template download, export and import endpoints

use std::sync::Arc;

use axum::{
    extract::{Multipart, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio::task;
use tracing::{debug, info};

use super::extract::AdminUser;
use super::handlers::{ok, ApiResult};
use super::server::AppState;
use crate::error::{BankError, BankResult};
use crate::excel::{
    ExcelExporter, ExcelImporter, ExportScope, QuestionSheet, TEMPLATE_FILENAME, XLSX_CONTENT_TYPE,
};
use crate::import::{check_upload_name, import_sheet};

/// Multipart field carrying the workbook
pub const UPLOAD_FIELD: &str = "file";

/// Workbook bytes sent as a file download
fn xlsx_download(bytes: Vec<u8>, filename: &str) -> BankResult<Response> {
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .map_err(|e| BankError::Export(e.to_string()))?;
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(XLSX_CONTENT_TYPE)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// GET /admin/questions/template
pub async fn download_template(_admin: AdminUser) -> BankResult<Response> {
    let bytes = ExcelExporter::template().to_bytes()?;
    xlsx_download(bytes, TEMPLATE_FILENAME)
}

#[derive(Deserialize, Default)]
pub struct ExportQuery {
    #[serde(default)]
    pub ids: Option<String>,
    #[serde(default)]
    pub paper_id: Option<i64>,
}

/// GET /admin/questions/export?ids=1,2,3 or ?paper_id=7
pub async fn export_questions(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<ExportQuery>,
) -> BankResult<Response> {
    let scope = ExportScope::from_params(query.paper_id, query.ids.as_deref())?;
    let questions = scope.load(&state.store())?;
    let filename = scope.filename();
    info!(count = questions.len(), file = %filename, "exporting questions");

    let bytes = ExcelExporter::questions(&questions).to_bytes()?;
    xlsx_download(bytes, &filename)
}

#[derive(Serialize)]
pub struct ImportResponse {
    pub imported: bool,
    pub success_count: usize,
    pub error_count: usize,
    pub message: String,
    /// First few row errors, then a `... and N more errors` line
    pub errors: Vec<String>,
    pub question_ids: Vec<i64>,
}

/// Parse an uploaded workbook on the blocking pool
async fn read_upload(bytes: Vec<u8>) -> BankResult<QuestionSheet> {
    task::spawn_blocking(move || ExcelImporter::from_bytes(bytes).read_sheet()).await?
}

/// POST /admin/questions/import (multipart field `file`)
pub async fn import_questions(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    mut multipart: Multipart,
) -> ApiResult<ImportResponse> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| BankError::InvalidUpload(e.to_string()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| BankError::InvalidUpload(e.to_string()))?;
        upload = Some((filename, bytes.to_vec()));
        break;
    }

    check_upload_name(upload.as_ref().map(|(name, _)| name.as_str()))?;
    let Some((filename, bytes)) = upload else {
        return Err(BankError::InvalidUpload("No file uploaded".to_string()));
    };
    debug!(file = %filename, size = bytes.len(), "received upload");

    let sheet = read_upload(bytes).await?;
    let report = import_sheet(&mut state.store(), &sheet, Some(admin.id))?;
    ok(ImportResponse {
        imported: report.success_count > 0,
        success_count: report.success_count,
        error_count: report.error_count,
        message: report.summary(),
        errors: report.error_messages(),
        question_ids: report.question_ids,
    })
}
