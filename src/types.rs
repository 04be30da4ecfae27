use crate::error::{BankError, BankResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

//==============================================================================
// Question Types
//==============================================================================

/// Kind of question stored in the bank.
///
/// Internal names (`single_choice`, ...) are what the database and the JSON
/// API use. Spreadsheets use the localized labels returned by [`label`].
///
/// [`label`]: QuestionType::label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    Essay,
    FillBlank,
}

impl QuestionType {
    pub const ALL: [QuestionType; 4] = [
        QuestionType::SingleChoice,
        QuestionType::MultipleChoice,
        QuestionType::Essay,
        QuestionType::FillBlank,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "single_choice",
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::Essay => "essay",
            QuestionType::FillBlank => "fill_blank",
        }
    }

    /// Spreadsheet label for this type
    pub fn label(&self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "单选题",
            QuestionType::MultipleChoice => "多选题",
            QuestionType::Essay => "问答题",
            QuestionType::FillBlank => "填空题",
        }
    }

    /// Resolve a spreadsheet label. Matching is exact and case-sensitive.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "单选题" => Some(QuestionType::SingleChoice),
            "多选题" => Some(QuestionType::MultipleChoice),
            "问答题" => Some(QuestionType::Essay),
            "填空题" => Some(QuestionType::FillBlank),
            _ => None,
        }
    }

    /// Choice questions must carry a non-empty option list
    pub fn is_choice(&self) -> bool {
        matches!(
            self,
            QuestionType::SingleChoice | QuestionType::MultipleChoice
        )
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QuestionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| BankError::Validation(format!("Unknown question type: {}", s)))
    }
}

//==============================================================================
// Options Encoding
//==============================================================================

/// Delimiter between options in a single spreadsheet cell / edit form field
pub const OPTION_DELIMITER: char = '|';

/// Split a `|`-delimited option cell, trimming parts and dropping empty ones
pub fn split_options(raw: &str) -> Vec<String> {
    raw.split(OPTION_DELIMITER)
        .map(str::trim)
        .filter(|opt| !opt.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_options(options: &[String]) -> String {
    options.join(&OPTION_DELIMITER.to_string())
}

//==============================================================================
// Questions
//==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub content: String,
    pub options: Option<Vec<String>>,
    pub correct_answer: String,
    pub explanation: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by_id: Option<i64>,
}

/// A question that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewQuestion {
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub content: String,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(skip)]
    pub created_by_id: Option<i64>,
}

impl NewQuestion {
    pub fn new(
        question_type: QuestionType,
        content: impl Into<String>,
        correct_answer: impl Into<String>,
    ) -> Self {
        Self {
            question_type,
            content: content.into(),
            options: None,
            correct_answer: correct_answer.into(),
            explanation: None,
            created_by_id: None,
        }
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    pub fn created_by(mut self, user_id: i64) -> Self {
        self.created_by_id = Some(user_id);
        self
    }

    pub fn validate(&self) -> BankResult<()> {
        validate_question_fields(
            self.question_type,
            &self.content,
            self.options.as_deref(),
            &self.correct_answer,
        )
    }
}

/// Partial question update. A `None` field is left untouched; for the
/// nullable columns `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QuestionUpdate {
    #[serde(default, rename = "type")]
    pub question_type: Option<QuestionType>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub options: Option<Option<Vec<String>>>,
    #[serde(default)]
    pub correct_answer: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub explanation: Option<Option<String>>,
}

impl QuestionUpdate {
    /// Apply the update to a stored question, returning the merged record
    pub fn apply_to(&self, question: &Question) -> Question {
        let mut merged = question.clone();
        if let Some(t) = self.question_type {
            merged.question_type = t;
        }
        if let Some(ref content) = self.content {
            merged.content = content.clone();
        }
        if let Some(ref options) = self.options {
            merged.options = options.clone();
        }
        if let Some(ref answer) = self.correct_answer {
            merged.correct_answer = answer.clone();
        }
        if let Some(ref explanation) = self.explanation {
            merged.explanation = explanation.clone();
        }
        merged
    }
}

pub(crate) fn validate_question_fields(
    question_type: QuestionType,
    content: &str,
    options: Option<&[String]>,
    correct_answer: &str,
) -> BankResult<()> {
    if content.trim().is_empty() {
        return Err(BankError::Validation("Question content is required".to_string()));
    }
    if correct_answer.trim().is_empty() {
        return Err(BankError::Validation("Correct answer is required".to_string()));
    }
    if question_type.is_choice() && options.map_or(true, |opts| opts.is_empty()) {
        return Err(BankError::Validation(
            "Choice questions must have options".to_string(),
        ));
    }
    Ok(())
}

/// Distinguish an explicit `null` from an absent field
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

//==============================================================================
// Papers
//==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paper {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub question_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by_id: Option<i64>,
}

/// A paper together with its questions
#[derive(Debug, Clone, Serialize)]
pub struct PaperDetail {
    #[serde(flatten)]
    pub paper: Paper,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPaper {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub questions: Vec<i64>,
}

/// Paper edit; `questions: None` keeps the current question set
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaperUpdate {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub questions: Option<Vec<i64>>,
}

//==============================================================================
// Users
//==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_admin: Option<bool>,
}

//==============================================================================
// Pagination
//==============================================================================

pub const DEFAULT_PER_PAGE: u32 = 20;
/// Largest page size a listing will return
pub const MAX_PER_PAGE: u32 = 100;

/// One page of a newest-first listing
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn pages(&self) -> u32 {
        if self.per_page == 0 || self.total == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.per_page)) as u32
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.pages()
    }

    pub fn prev_num(&self) -> Option<u32> {
        self.has_prev().then(|| self.page - 1)
    }

    pub fn next_num(&self) -> Option<u32> {
        self.has_next().then(|| self.page + 1)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Serialize)]
struct PageBody<'a, T> {
    items: &'a [T],
    total: u64,
    pages: u32,
    page: u32,
    per_page: u32,
    has_prev: bool,
    has_next: bool,
    prev_num: Option<u32>,
    next_num: Option<u32>,
}

impl<T: Serialize> Serialize for Page<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PageBody {
            items: &self.items,
            total: self.total,
            pages: self.pages(),
            page: self.page,
            per_page: self.per_page,
            has_prev: self.has_prev(),
            has_next: self.has_next(),
            prev_num: self.prev_num(),
            next_num: self.next_num(),
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_mapping_covers_every_type() {
        for t in QuestionType::ALL {
            assert_eq!(QuestionType::from_label(t.label()), Some(t));
        }
    }

    #[test]
    fn test_unknown_label_is_rejected() {
        assert_eq!(QuestionType::from_label("判断题"), None);
        assert_eq!(QuestionType::from_label("single_choice"), None);
        assert_eq!(QuestionType::from_label(" 单选题"), None);
    }

    #[test]
    fn test_internal_name_parse() {
        assert_eq!(
            "fill_blank".parse::<QuestionType>().unwrap(),
            QuestionType::FillBlank
        );
        assert!("true_false".parse::<QuestionType>().is_err());
    }

    #[test]
    fn test_split_options_trims_and_drops_empty() {
        assert_eq!(split_options(" A.1 | B.2 ||  "), vec!["A.1", "B.2"]);
        assert!(split_options(" | ").is_empty());
    }

    #[test]
    fn test_join_options() {
        let opts = vec!["A.1".to_string(), "B.2".to_string()];
        assert_eq!(join_options(&opts), "A.1|B.2");
        assert_eq!(split_options(&join_options(&opts)), opts);
    }

    #[test]
    fn test_choice_question_requires_options() {
        let q = NewQuestion::new(QuestionType::SingleChoice, "1+1=?", "B");
        assert!(q.validate().is_err());

        let q = q.with_options(vec!["A.1".to_string(), "B.2".to_string()]);
        assert!(q.validate().is_ok());

        let essay = NewQuestion::new(QuestionType::Essay, "Describe Rust", "Safe and fast");
        assert!(essay.validate().is_ok());
    }

    #[test]
    fn test_question_update_distinguishes_null_from_absent() {
        let update: QuestionUpdate = serde_json::from_str(r#"{"explanation": null}"#).unwrap();
        assert_eq!(update.explanation, Some(None));
        assert_eq!(update.options, None);

        let update: QuestionUpdate = serde_json::from_str(r#"{"content": "new"}"#).unwrap();
        assert_eq!(update.explanation, None);
        assert_eq!(update.content.as_deref(), Some("new"));
    }

    #[test]
    fn test_page_navigation() {
        let page = Page {
            items: vec![1, 2],
            total: 45,
            page: 2,
            per_page: 20,
        };
        assert_eq!(page.pages(), 3);
        assert_eq!(page.prev_num(), Some(1));
        assert_eq!(page.next_num(), Some(3));

        let empty: Page<i32> = Page {
            items: vec![],
            total: 0,
            page: 1,
            per_page: 20,
        };
        assert_eq!(empty.pages(), 0);
        assert!(!empty.has_next());
        assert!(!empty.has_prev());
    }

    #[test]
    fn test_user_serialization_hides_password_hash() {
        let user = User {
            id: 1,
            username: "admin".to_string(),
            email: "admin@example.com".to_string(),
            password_hash: "$2b$secret".to_string(),
            is_admin: true,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("secret"));
    }
}
