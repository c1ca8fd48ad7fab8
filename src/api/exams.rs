use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::api::attempts::{start_exam, submit_exam};
use crate::api::errors::ApiError;
use crate::api::guards::{CurrentStaff, CurrentUser};
use crate::api::pagination::{default_limit, PaginatedResponse};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Exam, User};
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::exam::{ExamCreate, ExamResponse, ExamUpdate, QuestionCreate, QuestionResponse};
use crate::schemas::StatusResponse;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_exams).post(create_exam))
        .route("/:exam_id", get(get_exam).patch(update_exam).delete(delete_exam))
        .route("/:exam_id/questions", post(add_question))
        .route("/:exam_id/questions/:question_id", delete(delete_question))
        .route("/:exam_id/start", post(start_exam))
        .route("/:exam_id/submit", post(submit_exam))
}

#[derive(Debug, Deserialize)]
struct ExamListQuery {
    subject: Option<String>,
    is_active: Option<bool>,
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

async fn create_exam(
    CurrentStaff(user): CurrentStaff,
    State(state): State<AppState>,
    Json(payload): Json<ExamCreate>,
) -> Result<(StatusCode, Json<ExamResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    if payload.passing_marks > payload.total_marks {
        return Err(ApiError::BadRequest("passing_marks cannot exceed total_marks".to_string()));
    }

    let question_payloads = payload.questions.as_deref().unwrap_or(&[]);
    let correct_tags = resolve_correct_tags(question_payloads)?;

    let now = primitive_now_utc();
    let exam_id = Uuid::new_v4().to_string();

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to open transaction"))?;

    let exam = repositories::exams::create(
        &mut *tx,
        repositories::exams::CreateExam {
            id: &exam_id,
            title: &payload.title,
            description: payload.description.as_deref().unwrap_or(""),
            subject: &payload.subject,
            duration_minutes: payload.duration_minutes,
            total_marks: payload.total_marks,
            passing_marks: payload.passing_marks,
            is_active: payload.is_active.unwrap_or(true),
            created_by: &user.id,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create exam"))?;

    let mut questions = Vec::with_capacity(question_payloads.len());
    for (index, (question, tag)) in question_payloads.iter().zip(correct_tags).enumerate() {
        let created = repositories::questions::create(
            &mut *tx,
            repositories::questions::CreateQuestion {
                id: &Uuid::new_v4().to_string(),
                exam_id: &exam_id,
                question_text: &question.question_text,
                option_a: &question.option_a,
                option_b: &question.option_b,
                option_c: &question.option_c,
                option_d: &question.option_d,
                correct_answer: tag,
                marks: question.marks.unwrap_or(1),
                position: index as i32,
                created_at: now,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create question"))?;
        questions.push(QuestionResponse::from_db(&created, true));
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit exam"))?;

    Ok((StatusCode::CREATED, Json(ExamResponse::from_db(&exam, Some(questions)))))
}

async fn list_exams(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Query(query): Query<ExamListQuery>,
) -> Result<Json<PaginatedResponse<ExamResponse>>, ApiError> {
    let filter = match user.role {
        UserRole::Student => repositories::exams::ExamFilter {
            subject: query.subject.as_deref(),
            is_active: Some(true),
            created_by: None,
            skip: query.skip,
            limit: query.limit,
        },
        UserRole::Teacher => repositories::exams::ExamFilter {
            subject: query.subject.as_deref(),
            is_active: query.is_active,
            created_by: Some(&user.id),
            skip: query.skip,
            limit: query.limit,
        },
        UserRole::Admin => repositories::exams::ExamFilter {
            subject: query.subject.as_deref(),
            is_active: query.is_active,
            created_by: None,
            skip: query.skip,
            limit: query.limit,
        },
    };

    let exams = repositories::exams::list(state.db(), &filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list exams"))?;
    let total_count = repositories::exams::count(state.db(), &filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count exams"))?;

    Ok(Json(PaginatedResponse {
        items: exams.iter().map(|exam| ExamResponse::from_db(exam, None)).collect(),
        total_count,
        skip: query.skip,
        limit: query.limit,
    }))
}

async fn get_exam(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(exam_id): Path<String>,
) -> Result<Json<ExamResponse>, ApiError> {
    let exam = fetch_exam(&state, &exam_id).await?;

    if user.role == UserRole::Student {
        if !exam.is_active {
            return Err(ApiError::NotFound("Exam not found".to_string()));
        }
        // Students receive the question sheet from the start endpoint, not
        // here, so the key never travels with the exam.
        return Ok(Json(ExamResponse::from_db(&exam, None)));
    }

    let questions = repositories::questions::list_by_exam(state.db(), &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load questions"))?;
    let reveal = can_manage(&user, &exam);
    let questions = questions.iter().map(|q| QuestionResponse::from_db(q, reveal)).collect();

    Ok(Json(ExamResponse::from_db(&exam, Some(questions))))
}

async fn update_exam(
    CurrentStaff(user): CurrentStaff,
    State(state): State<AppState>,
    Path(exam_id): Path<String>,
    Json(payload): Json<ExamUpdate>,
) -> Result<Json<ExamResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let (mut tx, exam) = lock_unfrozen_exam(&state, &exam_id, &user).await?;

    let total_marks = payload.total_marks.unwrap_or(exam.total_marks);
    let passing_marks = payload.passing_marks.unwrap_or(exam.passing_marks);
    if passing_marks > total_marks {
        return Err(ApiError::BadRequest("passing_marks cannot exceed total_marks".to_string()));
    }

    let updated = repositories::exams::update(
        &mut *tx,
        &exam.id,
        repositories::exams::UpdateExam {
            title: payload.title,
            description: payload.description,
            subject: payload.subject,
            duration_minutes: payload.duration_minutes,
            total_marks: payload.total_marks,
            passing_marks: payload.passing_marks,
            is_active: payload.is_active,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update exam"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit exam update"))?;

    Ok(Json(ExamResponse::from_db(&updated, None)))
}

async fn delete_exam(
    CurrentStaff(user): CurrentStaff,
    State(state): State<AppState>,
    Path(exam_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let (mut tx, exam) = lock_unfrozen_exam(&state, &exam_id, &user).await?;

    repositories::exams::delete(&mut *tx, &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete exam"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit exam deletion"))?;

    Ok(Json(StatusResponse { status: "deleted" }))
}

async fn add_question(
    CurrentStaff(user): CurrentStaff,
    State(state): State<AppState>,
    Path(exam_id): Path<String>,
    Json(payload): Json<QuestionCreate>,
) -> Result<(StatusCode, Json<QuestionResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let tag = payload.correct_tag().ok_or_else(|| {
        ApiError::BadRequest(format!(
            "correct_answer must be one of A, B, C, D; got {:?}",
            payload.correct_answer
        ))
    })?;

    let (mut tx, exam) = lock_unfrozen_exam(&state, &exam_id, &user).await?;

    let position = repositories::questions::count_by_exam(&mut *tx, &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count questions"))?;

    let question = repositories::questions::create(
        &mut *tx,
        repositories::questions::CreateQuestion {
            id: &Uuid::new_v4().to_string(),
            exam_id: &exam.id,
            question_text: &payload.question_text,
            option_a: &payload.option_a,
            option_b: &payload.option_b,
            option_c: &payload.option_c,
            option_d: &payload.option_d,
            correct_answer: tag,
            marks: payload.marks.unwrap_or(1),
            position: position as i32,
            created_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create question"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit question"))?;

    Ok((StatusCode::CREATED, Json(QuestionResponse::from_db(&question, true))))
}

async fn delete_question(
    CurrentStaff(user): CurrentStaff,
    State(state): State<AppState>,
    Path((exam_id, question_id)): Path<(String, String)>,
) -> Result<Json<StatusResponse>, ApiError> {
    let (mut tx, exam) = lock_unfrozen_exam(&state, &exam_id, &user).await?;

    let question = repositories::questions::find_by_id(&mut *tx, &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load question"))?
        .filter(|question| question.exam_id == exam.id)
        .ok_or_else(|| ApiError::NotFound("Question not found".to_string()))?;

    repositories::questions::delete(&mut *tx, &question.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete question"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit question deletion"))?;

    Ok(Json(StatusResponse { status: "deleted" }))
}

async fn fetch_exam(state: &AppState, exam_id: &str) -> Result<Exam, ApiError> {
    repositories::exams::find_by_id(state.db(), exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))
}

fn can_manage(user: &User, exam: &Exam) -> bool {
    user.role == UserRole::Admin || exam.created_by == user.id
}

fn ensure_can_manage(user: &User, exam: &Exam) -> Result<(), ApiError> {
    if can_manage(user, exam) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Only the exam owner may modify it"))
    }
}

/// An exam with recorded attempts is frozen: its content can no longer change,
/// so every stored result stays explainable by the questions it was graded
/// against.
///
/// Opens the mutation transaction and takes the exam row lock before counting
/// attempts. An attempt insert key-shares the exam row through its foreign
/// key, so a start that races this check blocks until the mutation commits.
async fn lock_unfrozen_exam(
    state: &AppState,
    exam_id: &str,
    user: &User,
) -> Result<(sqlx::Transaction<'static, sqlx::Postgres>, Exam), ApiError> {
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to open transaction"))?;

    let exam = repositories::exams::lock_for_update(&mut *tx, exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;
    ensure_can_manage(user, &exam)?;

    let attempts = repositories::attempts::count_by_exam(&mut *tx, &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count attempts"))?;
    if attempts > 0 {
        return Err(ApiError::Conflict(
            "Exam already has attempts and can no longer be modified".to_string(),
        ));
    }

    Ok((tx, exam))
}

fn resolve_correct_tags(
    questions: &[QuestionCreate],
) -> Result<Vec<crate::db::types::AnswerChoice>, ApiError> {
    questions
        .iter()
        .map(|question| {
            question.correct_tag().ok_or_else(|| {
                ApiError::BadRequest(format!(
                    "correct_answer must be one of A, B, C, D; got {:?}",
                    question.correct_answer
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests;
