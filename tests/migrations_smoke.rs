use sqlx::postgres::PgPoolOptions;

/// Applies the migrations against a disposable database and checks the tables
/// the application expects. Skipped unless SCHOOLHUB_TEST_DATABASE_URL is set.
#[tokio::test]
async fn migrations_apply_cleanly() {
    let Ok(database_url) = std::env::var("SCHOOLHUB_TEST_DATABASE_URL") else {
        eprintln!("SCHOOLHUB_TEST_DATABASE_URL not set; skipping migrations smoke test");
        return;
    };

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("connect to test database");

    sqlx::query("DROP SCHEMA IF EXISTS public CASCADE").execute(&pool).await.expect("drop schema");
    sqlx::query("CREATE SCHEMA public").execute(&pool).await.expect("create schema");

    sqlx::migrate!("./migrations").run(&pool).await.expect("run migrations");

    for table in ["users", "exams", "questions", "student_exams", "student_answers"] {
        let exists: Option<i32> = sqlx::query_scalar(
            "SELECT 1 FROM information_schema.tables \
             WHERE table_schema = 'public' AND table_name = $1",
        )
        .bind(table)
        .fetch_optional(&pool)
        .await
        .expect("table lookup");
        assert!(exists.is_some(), "table {table} missing after migrations");
    }

    let unique_attempt: Option<i32> = sqlx::query_scalar(
        "SELECT 1 FROM pg_constraint WHERE conname = 'student_exams_one_attempt'",
    )
    .fetch_optional(&pool)
    .await
    .expect("constraint lookup");
    assert!(unique_attempt.is_some(), "one-attempt unique constraint missing");
}
