use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::api::router::router;
use crate::core::config::Settings;
use crate::core::state::AppState;
use crate::db::types::{AnswerChoice, UserRole};
use crate::services::attempts::start_attempt;
use crate::test_support;

// Runs against a throwaway database; skips when SCHOOLHUB_TEST_DATABASE_URL
// is unset.
#[tokio::test]
async fn exam_with_attempts_rejects_mutation() {
    let _guard = test_support::env_lock();
    std::env::set_var("SECRET_KEY", "test-secret");
    std::env::remove_var("PROMETHEUS_ENABLED");
    let Some(pool) = test_support::test_db_pool().await else { return };

    let settings = Settings::load().expect("settings");
    let state = AppState::new(settings, pool.clone());
    let app = router(state.clone());

    let teacher = test_support::insert_user(&pool, "teacher-1", UserRole::Teacher).await;
    let student = test_support::insert_user(&pool, "student-1", UserRole::Student).await;
    let (exam, questions) = test_support::insert_exam_with_questions(
        &pool,
        &teacher.id,
        &[AnswerChoice::B, AnswerChoice::A],
        1,
    )
    .await;

    let token = test_support::bearer_token(&teacher.id, state.settings());
    let uri = format!("/api/v1/exams/{}", exam.id);

    // Before any attempt the owner may still edit.
    let request = test_support::json_request(
        Method::PATCH,
        &uri,
        Some(&token),
        Some(json!({"title": "Algebra basics II"})),
    );
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    start_attempt(&state, &student.id, &exam.id).await.expect("start");

    let request = test_support::json_request(
        Method::PATCH,
        &uri,
        Some(&token),
        Some(json!({"title": "Algebra basics III"})),
    );
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let request = test_support::json_request(Method::DELETE, &uri, Some(&token), None);
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let question_uri = format!("/api/v1/exams/{}/questions/{}", exam.id, questions[0].id);
    let request = test_support::json_request(Method::DELETE, &question_uri, Some(&token), None);
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
