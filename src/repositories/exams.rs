use sqlx::{PgConnection, PgPool, QueryBuilder};

use crate::db::models::Exam;

const COLUMNS: &str = "\
    id, title, description, subject, duration_minutes, total_marks, passing_marks, \
    is_active, created_by, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Row-locks the exam for the caller's transaction. Inserts into
/// student_exams take a key-share lock on the referenced exam row, so holding
/// this lock keeps the attempt count stable until commit.
pub(crate) async fn lock_for_update(
    conn: &mut PgConnection,
    id: &str,
) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1 FOR UPDATE"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub(crate) struct CreateExam<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub subject: &'a str,
    pub duration_minutes: i32,
    pub total_marks: i32,
    pub passing_marks: i32,
    pub is_active: bool,
    pub created_by: &'a str,
    pub created_at: time::PrimitiveDateTime,
    pub updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateExam<'_>,
) -> Result<Exam, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "INSERT INTO exams (
            id, title, description, subject, duration_minutes, total_marks,
            passing_marks, is_active, created_by, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.title)
    .bind(params.description)
    .bind(params.subject)
    .bind(params.duration_minutes)
    .bind(params.total_marks)
    .bind(params.passing_marks)
    .bind(params.is_active)
    .bind(params.created_by)
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(executor)
    .await
}

pub(crate) struct UpdateExam {
    pub title: Option<String>,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub duration_minutes: Option<i32>,
    pub total_marks: Option<i32>,
    pub passing_marks: Option<i32>,
    pub is_active: Option<bool>,
    pub updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn update(
    conn: &mut PgConnection,
    id: &str,
    params: UpdateExam,
) -> Result<Exam, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "UPDATE exams SET
            title = COALESCE($1, title),
            description = COALESCE($2, description),
            subject = COALESCE($3, subject),
            duration_minutes = COALESCE($4, duration_minutes),
            total_marks = COALESCE($5, total_marks),
            passing_marks = COALESCE($6, passing_marks),
            is_active = COALESCE($7, is_active),
            updated_at = $8
         WHERE id = $9
         RETURNING {COLUMNS}",
    ))
    .bind(params.title)
    .bind(params.description)
    .bind(params.subject)
    .bind(params.duration_minutes)
    .bind(params.total_marks)
    .bind(params.passing_marks)
    .bind(params.is_active)
    .bind(params.updated_at)
    .bind(id)
    .fetch_one(&mut *conn)
    .await
}

pub(crate) async fn delete(conn: &mut PgConnection, id: &str) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM exams WHERE id = $1").bind(id).execute(&mut *conn).await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) struct ExamFilter<'a> {
    pub subject: Option<&'a str>,
    pub is_active: Option<bool>,
    pub created_by: Option<&'a str>,
    pub skip: i64,
    pub limit: i64,
}

pub(crate) async fn list(pool: &PgPool, filter: &ExamFilter<'_>) -> Result<Vec<Exam>, sqlx::Error> {
    let mut builder = QueryBuilder::new(format!("SELECT {COLUMNS} FROM exams WHERE TRUE"));
    push_filters(&mut builder, filter);

    builder
        .push(" ORDER BY created_at DESC, id DESC OFFSET ")
        .push_bind(filter.skip.max(0))
        .push(" LIMIT ")
        .push_bind(filter.limit.clamp(1, 1000));

    builder.build_query_as::<Exam>().fetch_all(pool).await
}

pub(crate) async fn count(pool: &PgPool, filter: &ExamFilter<'_>) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM exams WHERE TRUE");
    push_filters(&mut builder, filter);
    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

fn push_filters<'a>(builder: &mut QueryBuilder<'a, sqlx::Postgres>, filter: &ExamFilter<'a>) {
    if let Some(subject) = filter.subject {
        builder.push(" AND subject = ").push_bind(subject);
    }
    if let Some(is_active) = filter.is_active {
        builder.push(" AND is_active = ").push_bind(is_active);
    }
    if let Some(created_by) = filter.created_by {
        builder.push(" AND created_by = ").push_bind(created_by);
    }
}
