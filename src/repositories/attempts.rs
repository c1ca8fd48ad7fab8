use sqlx::{PgConnection, PgPool};

use crate::db::models::StudentExam;
use crate::db::types::AnswerChoice;

const COLUMNS: &str = "\
    id, student_id, exam_id, started_at, completed_at, score, total_questions, \
    correct_answers, is_passed, created_at, updated_at";

pub(crate) struct CreateAttempt<'a> {
    pub id: &'a str,
    pub student_id: &'a str,
    pub exam_id: &'a str,
    pub started_at: time::PrimitiveDateTime,
    pub created_at: time::PrimitiveDateTime,
    pub updated_at: time::PrimitiveDateTime,
}

/// Inserts the attempt row. Returns `None` when this student already holds an
/// attempt for the exam; the unique index arbitrates concurrent starts.
pub(crate) async fn create(
    pool: &PgPool,
    params: CreateAttempt<'_>,
) -> Result<Option<StudentExam>, sqlx::Error> {
    sqlx::query_as::<_, StudentExam>(&format!(
        "INSERT INTO student_exams (
            id, student_id, exam_id, started_at, completed_at, score,
            total_questions, correct_answers, is_passed, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,NULL,0,0,0,FALSE,$5,$6)
        ON CONFLICT (student_id, exam_id) DO NOTHING
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.student_id)
    .bind(params.exam_id)
    .bind(params.started_at)
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<StudentExam>, sqlx::Error> {
    sqlx::query_as::<_, StudentExam>(&format!("SELECT {COLUMNS} FROM student_exams WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Row-locks the attempt for the duration of the submit transaction so a
/// concurrent submit of the same attempt waits here and then sees
/// `completed_at` already set.
pub(crate) async fn find_for_update(
    conn: &mut PgConnection,
    student_id: &str,
    exam_id: &str,
) -> Result<Option<StudentExam>, sqlx::Error> {
    sqlx::query_as::<_, StudentExam>(&format!(
        "SELECT {COLUMNS} FROM student_exams WHERE student_id = $1 AND exam_id = $2 FOR UPDATE",
    ))
    .bind(student_id)
    .bind(exam_id)
    .fetch_optional(&mut *conn)
    .await
}

pub(crate) struct CompleteAttempt {
    pub score: i32,
    pub total_questions: i32,
    pub correct_answers: i32,
    pub is_passed: bool,
    pub completed_at: time::PrimitiveDateTime,
}

pub(crate) async fn complete(
    conn: &mut PgConnection,
    id: &str,
    params: CompleteAttempt,
) -> Result<StudentExam, sqlx::Error> {
    sqlx::query_as::<_, StudentExam>(&format!(
        "UPDATE student_exams SET
            score = $1,
            total_questions = $2,
            correct_answers = $3,
            is_passed = $4,
            completed_at = $5,
            updated_at = $5
         WHERE id = $6
         RETURNING {COLUMNS}",
    ))
    .bind(params.score)
    .bind(params.total_questions)
    .bind(params.correct_answers)
    .bind(params.is_passed)
    .bind(params.completed_at)
    .bind(id)
    .fetch_one(&mut *conn)
    .await
}

pub(crate) struct InsertAnswer<'a> {
    pub id: &'a str,
    pub student_exam_id: &'a str,
    pub question_id: &'a str,
    pub selected_answer: Option<AnswerChoice>,
    pub is_correct: bool,
}

pub(crate) async fn insert_answer(
    conn: &mut PgConnection,
    params: InsertAnswer<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO student_answers (id, student_exam_id, question_id, selected_answer, is_correct)
         VALUES ($1,$2,$3,$4,$5)",
    )
    .bind(params.id)
    .bind(params.student_exam_id)
    .bind(params.question_id)
    .bind(params.selected_answer)
    .bind(params.is_correct)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn list_by_student(
    pool: &PgPool,
    student_id: &str,
) -> Result<Vec<StudentExam>, sqlx::Error> {
    sqlx::query_as::<_, StudentExam>(&format!(
        "SELECT {COLUMNS} FROM student_exams WHERE student_id = $1 ORDER BY started_at DESC, id",
    ))
    .bind(student_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_exam(
    pool: &PgPool,
    exam_id: &str,
) -> Result<Vec<StudentExam>, sqlx::Error> {
    sqlx::query_as::<_, StudentExam>(&format!(
        "SELECT {COLUMNS} FROM student_exams WHERE exam_id = $1 ORDER BY started_at DESC, id",
    ))
    .bind(exam_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_by_exam(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM student_exams WHERE exam_id = $1")
        .bind(exam_id)
        .fetch_one(executor)
        .await
}

/// A graded answer joined with the question it belongs to, ordered the way the
/// exam presents its questions.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AnswerDetailRow {
    pub(crate) question_id: String,
    pub(crate) question_text: String,
    pub(crate) option_a: String,
    pub(crate) option_b: String,
    pub(crate) option_c: String,
    pub(crate) option_d: String,
    pub(crate) correct_answer: AnswerChoice,
    pub(crate) marks: i32,
    pub(crate) selected_answer: Option<AnswerChoice>,
    pub(crate) is_correct: bool,
}

pub(crate) async fn list_answer_details(
    pool: &PgPool,
    student_exam_id: &str,
) -> Result<Vec<AnswerDetailRow>, sqlx::Error> {
    sqlx::query_as::<_, AnswerDetailRow>(
        "SELECT q.id AS question_id, q.question_text,
                q.option_a, q.option_b, q.option_c, q.option_d,
                q.correct_answer, q.marks,
                a.selected_answer, a.is_correct
         FROM student_answers a
         JOIN questions q ON q.id = a.question_id
         WHERE a.student_exam_id = $1
         ORDER BY q.position, q.id",
    )
    .bind(student_exam_id)
    .fetch_all(pool)
    .await
}
