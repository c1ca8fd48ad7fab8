use time::macros::datetime;

use super::*;
use crate::db::models::Question;
use crate::db::types::UserRole;
use crate::test_support;

fn question(id: &str) -> Question {
    Question {
        id: id.to_string(),
        exam_id: "exam-1".to_string(),
        question_text: format!("question {id}"),
        option_a: "alpha".to_string(),
        option_b: "beta".to_string(),
        option_c: "gamma".to_string(),
        option_d: "delta".to_string(),
        correct_answer: AnswerChoice::A,
        marks: 1,
        position: 0,
        created_at: datetime!(2026-01-10 09:00),
    }
}

fn submission(question_id: &str, tag: &str) -> AnswerSubmission {
    AnswerSubmission { question_id: question_id.to_string(), selected_answer: tag.to_string() }
}

#[test]
fn accepts_a_partial_answer_set() {
    let questions = [question("q1"), question("q2"), question("q3")];
    let selections = validate_submissions(&questions, &[submission("q2", "C")]).expect("valid");

    assert_eq!(selections.len(), 1);
    assert_eq!(selections.get("q2"), Some(&AnswerChoice::C));
}

#[test]
fn rejects_an_unknown_answer_tag() {
    let questions = [question("q1")];
    let err = validate_submissions(&questions, &[submission("q1", "E")]).unwrap_err();
    assert!(matches!(err, AttemptError::InvalidAnswerFormat(_)));
}

#[test]
fn rejects_lowercase_tags() {
    let questions = [question("q1")];
    let err = validate_submissions(&questions, &[submission("q1", "a")]).unwrap_err();
    assert!(matches!(err, AttemptError::InvalidAnswerFormat(_)));
}

#[test]
fn rejects_questions_from_another_exam() {
    let questions = [question("q1")];
    let err = validate_submissions(&questions, &[submission("other-exam-q", "A")]).unwrap_err();
    assert!(matches!(err, AttemptError::InvalidAnswerFormat(_)));
}

#[test]
fn rejects_duplicate_question_references() {
    let questions = [question("q1")];
    let err = validate_submissions(&questions, &[submission("q1", "A"), submission("q1", "B")])
        .unwrap_err();
    assert!(matches!(err, AttemptError::InvalidAnswerFormat(_)));
}

#[test]
fn one_bad_entry_rejects_the_whole_batch() {
    let questions = [question("q1"), question("q2")];
    let err = validate_submissions(&questions, &[submission("q1", "A"), submission("q2", "X")])
        .unwrap_err();
    assert!(matches!(err, AttemptError::InvalidAnswerFormat(_)));
}

#[test]
fn empty_submission_is_valid() {
    let questions = [question("q1")];
    let selections = validate_submissions(&questions, &[]).expect("valid");
    assert!(selections.is_empty());
}

// The tests below run the full lifecycle against a throwaway database. They
// skip when SCHOOLHUB_TEST_DATABASE_URL is unset.

async fn db_state() -> Option<(sqlx::PgPool, AppState)> {
    let pool = test_support::test_db_pool().await?;
    std::env::set_var("SECRET_KEY", "test-secret");
    let settings = crate::core::config::Settings::load().expect("settings");
    Some((pool.clone(), AppState::new(settings, pool)))
}

#[tokio::test]
async fn starting_the_same_exam_twice_is_rejected() {
    let _guard = test_support::env_lock();
    let Some((pool, state)) = db_state().await else { return };

    let teacher = test_support::insert_user(&pool, "teacher-1", UserRole::Teacher).await;
    let student = test_support::insert_user(&pool, "student-1", UserRole::Student).await;
    let (exam, _) = test_support::insert_exam_with_questions(
        &pool,
        &teacher.id,
        &[AnswerChoice::B, AnswerChoice::A, AnswerChoice::C],
        2,
    )
    .await;

    let started = start_attempt(&state, &student.id, &exam.id).await.expect("first start");
    assert_eq!(started.questions.len(), 3);
    assert!(started.attempt.completed_at.is_none());

    let err = start_attempt(&state, &student.id, &exam.id).await.unwrap_err();
    assert!(matches!(err, AttemptError::AlreadyAttempted));
}

#[tokio::test]
async fn submitting_before_starting_is_rejected() {
    let _guard = test_support::env_lock();
    let Some((pool, state)) = db_state().await else { return };

    let teacher = test_support::insert_user(&pool, "teacher-1", UserRole::Teacher).await;
    let student = test_support::insert_user(&pool, "student-1", UserRole::Student).await;
    let (exam, questions) =
        test_support::insert_exam_with_questions(&pool, &teacher.id, &[AnswerChoice::B], 1).await;

    let answers = [submission(&questions[0].id, "B")];
    let err = submit_attempt(&state, &student.id, &exam.id, &answers).await.unwrap_err();
    assert!(matches!(err, AttemptError::NotStarted));
}

#[tokio::test]
async fn resubmitting_keeps_the_stored_score() {
    let _guard = test_support::env_lock();
    let Some((pool, state)) = db_state().await else { return };

    let teacher = test_support::insert_user(&pool, "teacher-1", UserRole::Teacher).await;
    let student = test_support::insert_user(&pool, "student-1", UserRole::Student).await;
    let (exam, questions) = test_support::insert_exam_with_questions(
        &pool,
        &teacher.id,
        &[AnswerChoice::B, AnswerChoice::A, AnswerChoice::C],
        2,
    )
    .await;

    start_attempt(&state, &student.id, &exam.id).await.expect("start");

    let answers = [
        submission(&questions[0].id, "B"),
        submission(&questions[1].id, "A"),
        submission(&questions[2].id, "D"),
    ];
    let (completed, _) =
        submit_attempt(&state, &student.id, &exam.id, &answers).await.expect("submit");
    assert_eq!(completed.score, 2);
    assert_eq!(completed.correct_answers, 2);
    assert!(completed.is_passed);

    let retry = [
        submission(&questions[0].id, "B"),
        submission(&questions[1].id, "A"),
        submission(&questions[2].id, "C"),
    ];
    let err = submit_attempt(&state, &student.id, &exam.id, &retry).await.unwrap_err();
    assert!(matches!(err, AttemptError::AlreadyCompleted));

    let stored = repositories::attempts::find_by_id(&pool, &completed.id)
        .await
        .expect("load attempt")
        .expect("attempt exists");
    assert_eq!(stored.score, 2);
    assert_eq!(stored.correct_answers, 2);
    assert!(stored.is_passed);
}

#[tokio::test]
async fn rejected_submission_leaves_the_attempt_untouched() {
    let _guard = test_support::env_lock();
    let Some((pool, state)) = db_state().await else { return };

    let teacher = test_support::insert_user(&pool, "teacher-1", UserRole::Teacher).await;
    let student = test_support::insert_user(&pool, "student-1", UserRole::Student).await;
    let (exam, questions) = test_support::insert_exam_with_questions(
        &pool,
        &teacher.id,
        &[AnswerChoice::B, AnswerChoice::A],
        1,
    )
    .await;

    let started = start_attempt(&state, &student.id, &exam.id).await.expect("start");

    let bad = [submission(&questions[0].id, "B"), submission(&questions[1].id, "E")];
    let err = submit_attempt(&state, &student.id, &exam.id, &bad).await.unwrap_err();
    assert!(matches!(err, AttemptError::InvalidAnswerFormat(_)));

    let stored = repositories::attempts::find_by_id(&pool, &started.attempt.id)
        .await
        .expect("load attempt")
        .expect("attempt exists");
    assert!(stored.completed_at.is_none());
    assert_eq!(stored.score, 0);

    let answer_rows: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM student_answers WHERE student_exam_id = $1")
            .bind(&started.attempt.id)
            .fetch_one(&pool)
            .await
            .expect("count answers");
    assert_eq!(answer_rows, 0);

    let good = [submission(&questions[0].id, "B")];
    let (completed, _) =
        submit_attempt(&state, &student.id, &exam.id, &good).await.expect("resubmit");
    assert_eq!(completed.score, 1);
    assert!(completed.is_passed);
}
