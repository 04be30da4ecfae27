//! Admin handlers: dashboard, question, paper and user management
//!
//! Every handler takes [`AdminUser`], so a missing session answers 401 and a
//! non-admin session answers 403 before any work is done.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::extract::AdminUser;
use super::handlers::{first_page, ok, ApiResult, MessageResponse, PageQuery};
use super::server::AppState;
use crate::auth::hash_password;
use crate::error::BankError;
use crate::types::{
    join_options, split_options, NewPaper, NewQuestion, NewUser, Page, Paper, PaperDetail,
    PaperUpdate, Question, QuestionType, QuestionUpdate, User, UserUpdate, DEFAULT_PER_PAGE,
};

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default)]
    pub q: Option<String>,
}

fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

impl ListQuery {
    fn query(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

//==============================================================================
// Dashboard
//==============================================================================

#[derive(Serialize)]
pub struct DashboardResponse {
    pub question_count: u64,
    pub paper_count: u64,
    pub user_count: u64,
}

/// GET /admin/api/dashboard
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> ApiResult<DashboardResponse> {
    let store = state.store();
    ok(DashboardResponse {
        question_count: store.count_questions()?,
        paper_count: store.count_papers()?,
        user_count: store.count_users()?,
    })
}

//==============================================================================
// Questions
//==============================================================================

/// GET /admin/api/questions
pub async fn list_questions(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Page<Question>> {
    ok(state
        .store()
        .list_questions(query.query(), query.page, query.per_page)?)
}

/// POST /admin/api/questions
pub async fn create_question(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(question): Json<NewQuestion>,
) -> ApiResult<Question> {
    let question = question.created_by(admin.id);
    let created = state.store().create_question(&question)?;
    info!(id = created.id, "question created");
    ok(created)
}

/// Picker entry used when composing a paper
#[derive(Serialize)]
pub struct QuestionSummary {
    pub id: i64,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub type_label: &'static str,
    pub content: String,
}

/// GET /admin/api/questions/summary
pub async fn question_summaries(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> ApiResult<Vec<QuestionSummary>> {
    let questions = state.store().all_questions()?;
    ok(questions
        .into_iter()
        .map(|q| QuestionSummary {
            id: q.id,
            question_type: q.question_type,
            type_label: q.question_type.label(),
            content: q.content,
        })
        .collect())
}

/// Question as shown in the edit form: options as one `|` string
#[derive(Debug, Serialize, Deserialize)]
pub struct QuestionForm {
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub content: String,
    #[serde(default)]
    pub options: String,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: String,
}

impl From<&Question> for QuestionForm {
    fn from(question: &Question) -> Self {
        Self {
            question_type: question.question_type,
            content: question.content.clone(),
            options: question
                .options
                .as_deref()
                .map(join_options)
                .unwrap_or_default(),
            correct_answer: question.correct_answer.clone(),
            explanation: question.explanation.clone().unwrap_or_default(),
        }
    }
}

impl QuestionForm {
    /// Full replacement of the editable fields
    fn into_update(self) -> QuestionUpdate {
        let options = split_options(&self.options);
        let explanation = self.explanation.trim().to_string();
        QuestionUpdate {
            question_type: Some(self.question_type),
            content: Some(self.content),
            options: Some((!options.is_empty()).then_some(options)),
            correct_answer: Some(self.correct_answer),
            explanation: Some((!explanation.is_empty()).then_some(explanation)),
        }
    }
}

#[derive(Serialize)]
pub struct QuestionFormResponse {
    pub id: i64,
    pub form: QuestionForm,
}

/// GET /admin/questions/:id
pub async fn question_form(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<QuestionFormResponse> {
    let question = state
        .store()
        .find_question_by_id(id)?
        .ok_or_else(|| BankError::not_found(format!("Question {}", id)))?;
    ok(QuestionFormResponse {
        id,
        form: QuestionForm::from(&question),
    })
}

/// POST /admin/questions/:id
pub async fn save_question_form(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(form): Json<QuestionForm>,
) -> ApiResult<Question> {
    ok(state.store().update_question(id, &form.into_update())?)
}

/// PUT /api/question/:id
pub async fn update_question(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(update): Json<QuestionUpdate>,
) -> ApiResult<Question> {
    ok(state.store().update_question(id, &update)?)
}

/// DELETE /admin/questions/:id and /api/question/:id
pub async fn delete_question(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<MessageResponse> {
    state.store().delete_question(id)?;
    info!(id, "question deleted");
    ok(MessageResponse::new("Question deleted"))
}

#[derive(Deserialize)]
pub struct BulkDeleteRequest {
    #[serde(default)]
    pub question_ids: Vec<i64>,
}

#[derive(Serialize)]
pub struct DeleteCountResponse {
    pub message: String,
    pub deleted_count: usize,
}

/// POST /admin/questions/bulk-delete
pub async fn bulk_delete_questions(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(req): Json<BulkDeleteRequest>,
) -> ApiResult<DeleteCountResponse> {
    if req.question_ids.is_empty() {
        return Err(BankError::Validation("No questions selected".to_string()));
    }
    let deleted_count = state.store().delete_questions(&req.question_ids)?;
    info!(deleted_count, "questions bulk deleted");
    ok(DeleteCountResponse {
        message: format!("Successfully deleted {} questions", deleted_count),
        deleted_count,
    })
}

/// POST /admin/questions/clear-all
pub async fn clear_all_questions(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
) -> ApiResult<DeleteCountResponse> {
    let deleted_count = state.store().clear_questions()?;
    info!(deleted_count, by = %admin.username, "question bank cleared");
    ok(DeleteCountResponse {
        message: format!("Successfully cleared {} questions", deleted_count),
        deleted_count,
    })
}

//==============================================================================
// Papers
//==============================================================================

/// GET /admin/api/papers
pub async fn list_papers(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<PageQuery>,
) -> ApiResult<Page<Paper>> {
    ok(state.store().list_papers(query.page, DEFAULT_PER_PAGE)?)
}

/// POST /admin/api/papers
pub async fn create_paper(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(paper): Json<NewPaper>,
) -> ApiResult<Paper> {
    let created = state.store().create_paper(&paper, Some(admin.id))?;
    info!(id = created.id, questions = created.question_count, "paper created");
    ok(created)
}

/// GET /admin/papers/:id
pub async fn paper_form(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<PaperDetail> {
    ok(state.store().paper_detail(id)?)
}

/// POST /admin/papers/:id
pub async fn update_paper(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(update): Json<PaperUpdate>,
) -> ApiResult<Paper> {
    ok(state.store().update_paper(id, &update)?)
}

/// DELETE /admin/papers/:id
pub async fn delete_paper(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<MessageResponse> {
    state.store().delete_paper(id)?;
    info!(id, "paper deleted");
    ok(MessageResponse::new("Paper deleted"))
}

//==============================================================================
// Users
//==============================================================================

/// GET /admin/api/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Page<User>> {
    ok(state
        .store()
        .list_users(query.query(), query.page, query.per_page)?)
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// POST /api/user
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<User> {
    if req.username.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty() {
        return Err(BankError::Validation("Missing fields".to_string()));
    }
    // Hash before taking the store lock
    let password_hash = hash_password(&req.password, state.password_cost)?;
    let user = state.store().create_user(&NewUser {
        username: req.username.trim().to_string(),
        email: req.email.trim().to_string(),
        password_hash,
        is_admin: req.is_admin,
    })?;
    info!(username = %user.username, "user created");
    ok(user)
}

/// PUT /api/user/:id
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(update): Json<UserUpdate>,
) -> ApiResult<User> {
    ok(state.store().update_user(id, &update)?)
}

/// DELETE /api/user/:id
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<MessageResponse> {
    if id == admin.id {
        return Err(BankError::Validation("Cannot delete yourself".to_string()));
    }
    state.store().delete_user(id)?;
    state.sessions.remove_user(id);
    info!(id, "user deleted");
    ok(MessageResponse::new("User deleted"))
}
