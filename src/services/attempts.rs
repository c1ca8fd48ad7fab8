//! Attempt lifecycle: start, submit, report.
//!
//! Submission is all-or-nothing. A request that references a foreign question,
//! repeats a question, or carries a malformed answer tag is rejected before any
//! row changes. Grading and persistence run inside one transaction so a crash
//! mid-submit leaves the attempt still open.

use std::collections::HashMap;

use thiserror::Error;
use uuid::Uuid;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Exam, Question, StudentExam};
use crate::db::types::AnswerChoice;
use crate::repositories;
use crate::services::grading;

#[derive(Debug, Error)]
pub(crate) enum AttemptError {
    #[error("exam not found")]
    ExamNotFound,
    #[error("attempt not found")]
    AttemptNotFound,
    #[error("exam has no questions")]
    NoQuestions,
    #[error("exam already attempted")]
    AlreadyAttempted,
    #[error("exam was not started")]
    NotStarted,
    #[error("attempt already completed")]
    AlreadyCompleted,
    #[error("attempt not completed yet")]
    NotCompleted,
    #[error("invalid answer submission: {0}")]
    InvalidAnswerFormat(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub(crate) struct AnswerSubmission {
    pub(crate) question_id: String,
    pub(crate) selected_answer: String,
}

#[derive(Debug)]
pub(crate) struct StartedAttempt {
    pub(crate) attempt: StudentExam,
    pub(crate) exam: Exam,
    pub(crate) questions: Vec<Question>,
}

pub(crate) struct AttemptResult {
    pub(crate) attempt: StudentExam,
    pub(crate) exam: Exam,
    pub(crate) answers: Vec<repositories::attempts::AnswerDetailRow>,
}

/// Opens an attempt for `student_id` on `exam_id`. The unique index on
/// (student_id, exam_id) makes concurrent starts race safely: exactly one
/// caller gets the row, every other caller gets `AlreadyAttempted`.
pub(crate) async fn start_attempt(
    state: &AppState,
    student_id: &str,
    exam_id: &str,
) -> Result<StartedAttempt, AttemptError> {
    let exam = repositories::exams::find_by_id(state.db(), exam_id)
        .await?
        .filter(|exam| exam.is_active)
        .ok_or(AttemptError::ExamNotFound)?;

    let questions = repositories::questions::list_by_exam(state.db(), exam_id).await?;
    if questions.is_empty() {
        return Err(AttemptError::NoQuestions);
    }

    let now = primitive_now_utc();
    let attempt = repositories::attempts::create(
        state.db(),
        repositories::attempts::CreateAttempt {
            id: &Uuid::new_v4().to_string(),
            student_id,
            exam_id,
            started_at: now,
            created_at: now,
            updated_at: now,
        },
    )
    .await?
    .ok_or(AttemptError::AlreadyAttempted)?;

    tracing::info!(student_id, exam_id, attempt_id = %attempt.id, "attempt started");
    Ok(StartedAttempt { attempt, exam, questions })
}

/// Grades and closes the student's open attempt on `exam_id`.
pub(crate) async fn submit_attempt(
    state: &AppState,
    student_id: &str,
    exam_id: &str,
    submissions: &[AnswerSubmission],
) -> Result<(StudentExam, Exam), AttemptError> {
    let exam = repositories::exams::find_by_id(state.db(), exam_id)
        .await?
        .ok_or(AttemptError::ExamNotFound)?;

    let mut tx = state.db().begin().await?;

    let attempt = repositories::attempts::find_for_update(&mut *tx, student_id, exam_id)
        .await?
        .ok_or(AttemptError::NotStarted)?;
    if attempt.completed_at.is_some() {
        return Err(AttemptError::AlreadyCompleted);
    }

    let questions = repositories::questions::list_by_exam(&mut *tx, exam_id).await?;
    let selections = validate_submissions(&questions, submissions)?;

    let outcome = grading::grade(&questions, &selections, exam.passing_marks);

    for graded in &outcome.answers {
        repositories::attempts::insert_answer(
            &mut *tx,
            repositories::attempts::InsertAnswer {
                id: &Uuid::new_v4().to_string(),
                student_exam_id: &attempt.id,
                question_id: &graded.question_id,
                selected_answer: graded.selected,
                is_correct: graded.is_correct,
            },
        )
        .await?;
    }

    let completed = repositories::attempts::complete(
        &mut *tx,
        &attempt.id,
        repositories::attempts::CompleteAttempt {
            score: outcome.score,
            total_questions: outcome.total_questions,
            correct_answers: outcome.correct_answers,
            is_passed: outcome.is_passed,
            completed_at: primitive_now_utc(),
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        student_id,
        exam_id,
        attempt_id = %completed.id,
        score = completed.score,
        is_passed = completed.is_passed,
        "attempt submitted"
    );
    Ok((completed, exam))
}

/// Loads the graded result of a completed attempt, including the per-question
/// breakdown with the correct tags revealed.
pub(crate) async fn attempt_result(
    state: &AppState,
    attempt_id: &str,
) -> Result<AttemptResult, AttemptError> {
    let attempt = repositories::attempts::find_by_id(state.db(), attempt_id)
        .await?
        .ok_or(AttemptError::AttemptNotFound)?;
    if attempt.completed_at.is_none() {
        return Err(AttemptError::NotCompleted);
    }

    let exam = repositories::exams::find_by_id(state.db(), &attempt.exam_id)
        .await?
        .ok_or(AttemptError::ExamNotFound)?;
    let answers = repositories::attempts::list_answer_details(state.db(), attempt_id).await?;

    Ok(AttemptResult { attempt, exam, answers })
}

/// Checks every submitted answer against the exam's question set. The whole
/// submission is rejected on the first malformed tag, unknown question, or
/// duplicate question reference.
fn validate_submissions(
    questions: &[Question],
    submissions: &[AnswerSubmission],
) -> Result<HashMap<String, AnswerChoice>, AttemptError> {
    let mut selections = HashMap::with_capacity(submissions.len());

    for submission in submissions {
        let tag = AnswerChoice::parse(&submission.selected_answer).ok_or_else(|| {
            AttemptError::InvalidAnswerFormat(format!(
                "answer tag must be one of A, B, C, D; got {:?}",
                submission.selected_answer
            ))
        })?;

        if !questions.iter().any(|q| q.id == submission.question_id) {
            return Err(AttemptError::InvalidAnswerFormat(format!(
                "question {} does not belong to this exam",
                submission.question_id
            )));
        }

        if selections.insert(submission.question_id.clone(), tag).is_some() {
            return Err(AttemptError::InvalidAnswerFormat(format!(
                "question {} was answered more than once",
                submission.question_id
            )));
        }
    }

    Ok(selections)
}

#[cfg(test)]
mod tests;
