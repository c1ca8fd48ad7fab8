use std::sync::{Mutex, MutexGuard, OnceLock};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::{config::Settings, security, state::AppState, time::primitive_now_utc};
use crate::db::models::{Exam, Question, User};
use crate::db::types::{AnswerChoice, UserRole};
use crate::repositories;

/// Serializes tests that mutate process environment variables.
pub(crate) fn env_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Builds an `AppState` over a lazy pool; no connection is opened until a
/// handler actually touches the database.
pub(crate) fn build_state(settings: Settings) -> AppState {
    let db = sqlx::PgPool::connect_lazy(&settings.database().database_url()).expect("lazy pool");
    AppState::new(settings, db)
}

pub(crate) fn bearer_token(user_id: &str, settings: &Settings) -> String {
    security::create_access_token(user_id, settings, None).expect("token")
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

/// Connects to the database named by SCHOOLHUB_TEST_DATABASE_URL and applies
/// a fresh schema. Returns `None` so database-backed tests skip when the
/// variable is unset. Callers hold `env_lock` for the whole test; every call
/// rebuilds the schema from scratch.
pub(crate) async fn test_db_pool() -> Option<PgPool> {
    let Ok(url) = std::env::var("SCHOOLHUB_TEST_DATABASE_URL") else {
        eprintln!("SCHOOLHUB_TEST_DATABASE_URL is not set; skipping database-backed test");
        return None;
    };

    let pool = PgPool::connect(&url).await.expect("connect test database");
    sqlx::query("DROP SCHEMA IF EXISTS public CASCADE")
        .execute(&pool)
        .await
        .expect("drop schema");
    sqlx::query("CREATE SCHEMA public").execute(&pool).await.expect("create schema");
    sqlx::migrate!("./migrations").run(&pool).await.expect("apply migrations");
    Some(pool)
}

pub(crate) async fn insert_user(pool: &PgPool, username: &str, role: UserRole) -> User {
    let now = primitive_now_utc();
    repositories::users::create(
        pool,
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            username,
            hashed_password: security::hash_password("correct horse").expect("hash password"),
            full_name: "Test User",
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .expect("insert user")
}

/// Inserts an exam owned by `created_by` with one question per entry of
/// `answer_key`, each worth one mark.
pub(crate) async fn insert_exam_with_questions(
    pool: &PgPool,
    created_by: &str,
    answer_key: &[AnswerChoice],
    passing_marks: i32,
) -> (Exam, Vec<Question>) {
    let now = primitive_now_utc();
    let exam = repositories::exams::create(
        pool,
        repositories::exams::CreateExam {
            id: &Uuid::new_v4().to_string(),
            title: "Algebra basics",
            description: "",
            subject: "maths",
            duration_minutes: 30,
            total_marks: answer_key.len() as i32,
            passing_marks,
            is_active: true,
            created_by,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .expect("insert exam");

    let mut questions = Vec::with_capacity(answer_key.len());
    for (index, correct) in answer_key.iter().enumerate() {
        let question = repositories::questions::create(
            pool,
            repositories::questions::CreateQuestion {
                id: &Uuid::new_v4().to_string(),
                exam_id: &exam.id,
                question_text: &format!("question {index}"),
                option_a: "alpha",
                option_b: "beta",
                option_c: "gamma",
                option_d: "delta",
                correct_answer: *correct,
                marks: 1,
                position: index as i32,
                created_at: now,
            },
        )
        .await
        .expect("insert question");
        questions.push(question);
    }

    (exam, questions)
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
