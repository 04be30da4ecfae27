//! API request handlers
//!
//! Response envelope, service info, sessions and the public browsing
//! endpoints. Admin handlers live in [`super::admin`] and
//! [`super::transfer`].

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio::task;
use tracing::{info, warn};
use uuid::Uuid;

use super::extract::{session_token, CurrentUser, SESSION_COOKIE};
use super::server::AppState;
use crate::auth::{check_credentials, hash_password, verify_password};
use crate::error::{BankError, BankResult};
use crate::types::{Page, Paper, PaperDetail, Question, User, DEFAULT_PER_PAGE};

/// Standard API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            request_id: Uuid::new_v4().to_string(),
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            request_id: Uuid::new_v4().to_string(),
            data: None,
            error: Some(message.into()),
        }
    }
}

pub type ApiResult<T> = BankResult<Json<ApiResponse<T>>>;

pub fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

impl BankError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BankError::NotFound(_) => StatusCode::NOT_FOUND,
            BankError::Validation(_)
            | BankError::Conflict(_)
            | BankError::InvalidUpload(_)
            | BankError::MissingColumns(_)
            | BankError::SheetRead(_) => StatusCode::BAD_REQUEST,
            BankError::Unauthorized => StatusCode::UNAUTHORIZED,
            BankError::Forbidden => StatusCode::FORBIDDEN,
            BankError::Io(_)
            | BankError::Database(_)
            | BankError::Json(_)
            | BankError::Export(_)
            | BankError::Password(_)
            | BankError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BankError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!("request failed: {}", self);
        }
        (status, Json(ApiResponse::<()>::err(self.to_string()))).into_response()
    }
}

/// Plain confirmation payload
#[derive(Serialize, Default)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

//==============================================================================
// Service info
//==============================================================================

/// Root endpoint response
#[derive(Serialize)]
pub struct RootResponse {
    pub name: String,
    pub version: String,
    pub description: String,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Serialize)]
pub struct EndpointInfo {
    pub path: String,
    pub method: String,
    pub description: String,
}

impl EndpointInfo {
    fn new(method: &str, path: &str, description: &str) -> Self {
        Self {
            path: path.to_string(),
            method: method.to_string(),
            description: description.to_string(),
        }
    }
}

/// GET / - Root info
pub async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = RootResponse {
        name: "Question Bank API".to_string(),
        version: state.version.clone(),
        description: "Question and exam paper management".to_string(),
        endpoints: vec![
            EndpointInfo::new("GET", "/health", "Health check endpoint"),
            EndpointInfo::new("POST", "/login", "Start a session"),
            EndpointInfo::new("GET", "/api/papers", "List papers, newest first"),
            EndpointInfo::new("GET", "/api/papers/{id}", "View a paper with its questions"),
            EndpointInfo::new("GET", "/api/search", "Search questions"),
            EndpointInfo::new("GET", "/admin/questions/template", "Download the import template"),
            EndpointInfo::new("GET", "/admin/questions/export", "Export questions to Excel"),
            EndpointInfo::new("POST", "/admin/questions/import", "Import questions from Excel"),
        ],
    };
    Json(ApiResponse::ok(response))
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_message: String,
}

/// GET /health - Health check
pub async fn health() -> impl IntoResponse {
    Json(ApiResponse::ok(HealthResponse {
        status: "healthy".to_string(),
        uptime_message: "Server is running".to_string(),
    }))
}

/// Version response
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub features: Vec<String>,
}

/// GET /version - Server version
pub async fn version(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(VersionResponse {
        version: state.version.clone(),
        features: ["browse", "search", "manage", "export", "import"]
            .iter()
            .map(|f| f.to_string())
            .collect(),
    }))
}

//==============================================================================
// Sessions
//==============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

fn session_cookie(value: &str, max_age: i64) -> BankResult<HeaderValue> {
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, value, max_age
    );
    HeaderValue::from_str(&cookie).map_err(|e| BankError::Validation(e.to_string()))
}

/// POST /login - Check credentials and start a session
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> BankResult<impl IntoResponse> {
    // bcrypt runs off the runtime threads and without the store lock
    let found = state.store().find_user_by_username(&req.username)?;
    let password = req.password;
    let user = task::spawn_blocking(move || check_credentials(found, &password)).await??;
    let token = state.sessions.create(user.id);
    info!(username = %user.username, "user logged in");

    let mut headers = HeaderMap::new();
    let cookie = session_cookie(&token, state.sessions.ttl_seconds())?;
    headers.insert(header::SET_COOKIE, cookie);
    Ok((headers, Json(ApiResponse::ok(LoginResponse { token, user }))))
}

/// POST /logout - End the current session (no-op without one)
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> BankResult<impl IntoResponse> {
    if let Some(token) = session_token(&headers) {
        state.sessions.remove(&token);
    }
    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::SET_COOKIE, session_cookie("", 0)?);
    Ok((
        response_headers,
        Json(ApiResponse::ok(MessageResponse::new("Logged out"))),
    ))
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

/// POST /api/user/change_password - Change the caller's own password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<MessageResponse> {
    if req.old_password.is_empty() || req.new_password.is_empty() {
        return Err(BankError::Validation("Missing fields".to_string()));
    }
    if !verify_password(&req.old_password, &user.password_hash) {
        return Err(BankError::Validation("Old password incorrect".to_string()));
    }
    let hash = hash_password(&req.new_password, state.password_cost)?;
    state.store().set_password_hash(user.id, &hash)?;
    ok(MessageResponse::new("Password changed"))
}

//==============================================================================
// Public browsing
//==============================================================================

#[derive(Deserialize, Default)]
pub struct PageQuery {
    #[serde(default = "first_page")]
    pub page: u32,
}

pub(crate) fn first_page() -> u32 {
    1
}

#[derive(Deserialize, Default)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default = "first_page")]
    pub page: u32,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Page<Question>,
}

/// GET /api/papers - Newest papers first
pub async fn list_papers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Page<Paper>> {
    ok(state.store().list_papers(query.page, DEFAULT_PER_PAGE)?)
}

/// GET /api/papers/:id - One paper with its questions
pub async fn view_paper(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<PaperDetail> {
    ok(state.store().paper_detail(id)?)
}

/// GET /api/search - Questions whose content or answer contains `q`
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<SearchResponse> {
    let results = state
        .store()
        .list_questions(Some(query.q.as_str()), query.page, DEFAULT_PER_PAGE)?;
    ok(SearchResponse {
        query: query.q,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== ApiResponse Tests ====================

    #[test]
    fn test_api_response_ok_creates_success_response() {
        let response: ApiResponse<String> = ApiResponse::ok("test data".to_string());

        assert!(response.success);
        assert_eq!(response.data, Some("test data".to_string()));
        assert!(response.error.is_none());
        // Verify UUID format (8-4-4-4-12)
        assert_eq!(response.request_id.len(), 36);
    }

    #[test]
    fn test_api_response_err_creates_error_response() {
        let response: ApiResponse<String> = ApiResponse::err("Something went wrong");

        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(response.error, Some("Something went wrong".to_string()));
    }

    #[test]
    fn test_api_response_serializes_without_none_fields() {
        let response: ApiResponse<String> = ApiResponse::ok("data".to_string());
        let json = serde_json::to_string(&response).unwrap();

        assert!(!json.contains("\"error\""));
        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"data\":\"data\""));
    }

    // ==================== Error Status Tests ====================

    #[test]
    fn test_error_status_codes() {
        assert_eq!(BankError::not_found("Paper 1").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(BankError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(BankError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            BankError::Conflict("Username already exists".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BankError::MissingColumns(vec!["题目类型".to_string()]).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BankError::from(rusqlite::Error::QueryReturnedNoRows).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    // ==================== Request Deserialization Tests ====================

    #[test]
    fn test_search_query_defaults() {
        let query: SearchQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.q, "");
        assert_eq!(query.page, 1);
    }

    #[test]
    fn test_session_cookie_format() {
        let cookie = session_cookie("abc", 86400).unwrap();
        assert_eq!(
            cookie.to_str().unwrap(),
            "quizbank_session=abc; Path=/; HttpOnly; SameSite=Lax; Max-Age=86400"
        );
        let expired = session_cookie("", 0).unwrap();
        assert!(expired.to_str().unwrap().ends_with("Max-Age=0"));
    }
}
