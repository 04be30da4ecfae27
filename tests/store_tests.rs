//! Entity store tests: persistence, pagination, search and relationships

use pretty_assertions::assert_eq;
use quizbank::error::BankError;
use quizbank::store::Store;
use quizbank::types::{
    NewPaper, NewQuestion, NewUser, PaperUpdate, QuestionType, QuestionUpdate, UserUpdate,
    DEFAULT_PER_PAGE,
};
use tempfile::TempDir;

fn essay(n: usize) -> NewQuestion {
    NewQuestion::new(QuestionType::Essay, format!("Question {}", n), format!("Answer {}", n))
}

fn new_user(name: &str, is_admin: bool) -> NewUser {
    NewUser {
        username: name.to_string(),
        email: format!("{}@example.com", name),
        password_hash: "hash".to_string(),
        is_admin,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PERSISTENCE TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_file_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bank.db");

    {
        let mut store = Store::open(&path).unwrap();
        store
            .create_question(
                &NewQuestion::new(QuestionType::SingleChoice, "1+1=?", "B")
                    .with_options(vec!["A.1".to_string(), "B.2".to_string()]),
            )
            .unwrap();
    }

    let store = Store::open(&path).unwrap();
    let questions = store.all_questions().unwrap();
    assert_eq!(questions.len(), 1);
    assert_eq!(
        questions[0].options,
        Some(vec!["A.1".to_string(), "B.2".to_string()])
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// PAGINATION AND SEARCH TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_question_pagination() {
    let mut store = Store::open_in_memory().unwrap();
    let batch: Vec<_> = (0..25).map(essay).collect();
    store.insert_questions(&batch).unwrap();

    let first = store.list_questions(None, 1, DEFAULT_PER_PAGE).unwrap();
    assert_eq!(first.items.len(), 20);
    assert_eq!(first.total, 25);
    assert_eq!(first.pages(), 2);
    assert!(first.has_next());
    assert!(!first.has_prev());
    // Same timestamp for the whole batch, so the id breaks the tie
    assert_eq!(first.items[0].content, "Question 24");

    let second = store.list_questions(None, 2, DEFAULT_PER_PAGE).unwrap();
    assert_eq!(second.items.len(), 5);
    assert_eq!(second.prev_num(), Some(1));
    assert_eq!(second.next_num(), None);

    let beyond = store.list_questions(None, 9, DEFAULT_PER_PAGE).unwrap();
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.total, 25);

    let clamped = store.list_questions(None, 0, DEFAULT_PER_PAGE).unwrap();
    assert_eq!(clamped.page, 1);
}

#[test]
fn test_search_matches_content_and_answer() {
    let mut store = Store::open_in_memory().unwrap();
    store
        .insert_questions(&[
            NewQuestion::new(QuestionType::FillBlank, "中国的首都是__", "北京"),
            NewQuestion::new(QuestionType::Essay, "Describe Rust", "Ownership"),
            NewQuestion::new(QuestionType::Essay, "Describe Go", "Goroutines"),
        ])
        .unwrap();

    assert_eq!(store.list_questions(Some("首都"), 1, 20).unwrap().total, 1);
    assert_eq!(store.list_questions(Some("北京"), 1, 20).unwrap().total, 1);
    assert_eq!(store.list_questions(Some("describe"), 1, 20).unwrap().total, 2);
    assert_eq!(store.list_questions(Some("100%"), 1, 20).unwrap().total, 0);
    assert_eq!(store.list_questions(Some("  "), 1, 20).unwrap().total, 3);
}

// ═══════════════════════════════════════════════════════════════════════════
// QUESTION LIFECYCLE TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_update_question_clears_explanation() {
    let mut store = Store::open_in_memory().unwrap();
    let q = store
        .create_question(&essay(1).with_explanation("old"))
        .unwrap();

    let update: QuestionUpdate = serde_json::from_str(r#"{"explanation": null}"#).unwrap();
    let updated = store.update_question(q.id, &update).unwrap();
    assert_eq!(updated.explanation, None);
    assert_eq!(updated.content, "Question 1");
    assert!(updated.updated_at >= q.updated_at);
}

#[test]
fn test_update_question_to_choice_needs_options() {
    let mut store = Store::open_in_memory().unwrap();
    let q = store.create_question(&essay(1)).unwrap();

    let update = QuestionUpdate {
        question_type: Some(QuestionType::SingleChoice),
        ..Default::default()
    };
    let err = store.update_question(q.id, &update).unwrap_err();
    assert_eq!(err.to_string(), "Choice questions must have options");
}

#[test]
fn test_clear_questions_empties_papers() {
    let mut store = Store::open_in_memory().unwrap();
    let ids = store
        .insert_questions(&[essay(1), essay(2), essay(3)])
        .unwrap();
    let paper = store
        .create_paper(
            &NewPaper {
                title: "Final".to_string(),
                description: Some("All chapters".to_string()),
                questions: ids.clone(),
            },
            None,
        )
        .unwrap();
    assert_eq!(paper.question_count, 3);

    assert_eq!(store.clear_questions().unwrap(), 3);
    assert_eq!(store.count_questions().unwrap(), 0);

    let paper = store.find_paper_by_id(paper.id).unwrap().unwrap();
    assert_eq!(paper.question_count, 0);
}

#[test]
fn test_bulk_delete_ignores_unknown_ids() {
    let mut store = Store::open_in_memory().unwrap();
    let ids = store.insert_questions(&[essay(1), essay(2)]).unwrap();
    assert_eq!(store.delete_questions(&[ids[0], 1000]).unwrap(), 1);
    assert_eq!(store.count_questions().unwrap(), 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// PAPER TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_paper_detail_lists_questions() {
    let mut store = Store::open_in_memory().unwrap();
    let ids = store.insert_questions(&[essay(1), essay(2)]).unwrap();
    let paper = store
        .create_paper(
            &NewPaper {
                title: "Quiz".to_string(),
                description: None,
                questions: vec![ids[1], 77],
            },
            None,
        )
        .unwrap();

    let detail = store.paper_detail(paper.id).unwrap();
    assert_eq!(detail.paper.title, "Quiz");
    assert_eq!(detail.questions.len(), 1);
    assert_eq!(detail.questions[0].id, ids[1]);

    assert!(matches!(
        store.paper_detail(paper.id + 1),
        Err(BankError::NotFound(_))
    ));
}

#[test]
fn test_update_paper_keeps_questions_when_not_given() {
    let mut store = Store::open_in_memory().unwrap();
    let ids = store.insert_questions(&[essay(1), essay(2)]).unwrap();
    let paper = store
        .create_paper(
            &NewPaper {
                title: "Draft".to_string(),
                description: None,
                questions: ids.clone(),
            },
            None,
        )
        .unwrap();

    let updated = store
        .update_paper(
            paper.id,
            &PaperUpdate {
                title: "Final".to_string(),
                description: Some("v2".to_string()),
                questions: None,
            },
        )
        .unwrap();
    assert_eq!(updated.title, "Final");
    assert_eq!(updated.description.as_deref(), Some("v2"));
    assert_eq!(updated.question_count, 2);
}

#[test]
fn test_paper_pagination_counts() {
    let mut store = Store::open_in_memory().unwrap();
    for i in 0..3 {
        store
            .create_paper(
                &NewPaper {
                    title: format!("Paper {}", i),
                    ..Default::default()
                },
                None,
            )
            .unwrap();
    }
    let page = store.list_papers(1, 2).unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].title, "Paper 2");
    assert_eq!(store.count_papers().unwrap(), 3);
}

// ═══════════════════════════════════════════════════════════════════════════
// USER TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_user_uniqueness_conflicts() {
    let mut store = Store::open_in_memory().unwrap();
    store.create_user(&new_user("alice", false)).unwrap();

    let mut same_email = new_user("alice2", false);
    same_email.email = "alice@example.com".to_string();
    let err = store.create_user(&same_email).unwrap_err();
    assert_eq!(err.to_string(), "Email already exists");

    let err = store.create_user(&new_user("alice", true)).unwrap_err();
    assert_eq!(err.to_string(), "Username already exists");
}

#[test]
fn test_update_user_rename_conflict() {
    let mut store = Store::open_in_memory().unwrap();
    store.create_user(&new_user("alice", false)).unwrap();
    let bob = store.create_user(&new_user("bob", false)).unwrap();

    let err = store
        .update_user(
            bob.id,
            &UserUpdate {
                username: Some("alice".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, BankError::Conflict(_)));

    let promoted = store
        .update_user(
            bob.id,
            &UserUpdate {
                is_admin: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(promoted.is_admin);
    assert_eq!(promoted.username, "bob");
}

#[test]
fn test_deleting_user_clears_attribution() {
    let mut store = Store::open_in_memory().unwrap();
    let user = store.create_user(&new_user("teacher", false)).unwrap();
    let q = store.create_question(&essay(1).created_by(user.id)).unwrap();
    let paper = store
        .create_paper(
            &NewPaper {
                title: "Owned".to_string(),
                questions: vec![q.id],
                ..Default::default()
            },
            Some(user.id),
        )
        .unwrap();
    assert_eq!(paper.created_by_id, Some(user.id));

    store.delete_user(user.id).unwrap();

    let q = store.find_question_by_id(q.id).unwrap().unwrap();
    assert_eq!(q.created_by_id, None);
    let paper = store.find_paper_by_id(paper.id).unwrap().unwrap();
    assert_eq!(paper.created_by_id, None);
    assert_eq!(paper.question_count, 1);
}

#[test]
fn test_set_password_hash() {
    let mut store = Store::open_in_memory().unwrap();
    let user = store.create_user(&new_user("carol", false)).unwrap();
    store.set_password_hash(user.id, "new-hash").unwrap();
    let user = store.find_user_by_username("carol").unwrap().unwrap();
    assert_eq!(user.password_hash, "new-hash");
    assert!(matches!(
        store.set_password_hash(999, "x"),
        Err(BankError::NotFound(_))
    ));
}
