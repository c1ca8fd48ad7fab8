use crate::db::models::Question;
use crate::db::types::AnswerChoice;

const COLUMNS: &str = "\
    id, exam_id, question_text, option_a, option_b, option_c, option_d, \
    correct_answer, marks, position, created_at";

pub(crate) async fn list_by_exam(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE exam_id = $1 ORDER BY position, id",
    ))
    .bind(exam_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!("SELECT {COLUMNS} FROM questions WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn count_by_exam(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM questions WHERE exam_id = $1")
        .bind(exam_id)
        .fetch_one(executor)
        .await
}

pub(crate) struct CreateQuestion<'a> {
    pub id: &'a str,
    pub exam_id: &'a str,
    pub question_text: &'a str,
    pub option_a: &'a str,
    pub option_b: &'a str,
    pub option_c: &'a str,
    pub option_d: &'a str,
    pub correct_answer: AnswerChoice,
    pub marks: i32,
    pub position: i32,
    pub created_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateQuestion<'_>,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions (
            id, exam_id, question_text, option_a, option_b, option_c, option_d,
            correct_answer, marks, position, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.exam_id)
    .bind(params.question_text)
    .bind(params.option_a)
    .bind(params.option_b)
    .bind(params.option_c)
    .bind(params.option_d)
    .bind(params.correct_answer)
    .bind(params.marks)
    .bind(params.position)
    .bind(params.created_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn delete(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM questions WHERE id = $1").bind(id).execute(executor).await?;
    Ok(result.rows_affected() > 0)
}
