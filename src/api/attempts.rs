use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentStudent, CurrentUser};
use crate::core::state::AppState;
use crate::db::models::User;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::attempt::{
    AnswerDetailResponse, AttemptResponse, GradeResponse, ResultDetailResponse, StartExamResponse,
    SubmitExamRequest,
};
use crate::services::attempts::{self as attempt_service, AnswerSubmission};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_attempts))
        .route("/:attempt_id/result", get(get_result))
}

/// POST /exams/:exam_id/start, mounted from the exams router.
pub(crate) async fn start_exam(
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
    Path(exam_id): Path<String>,
) -> Result<(StatusCode, Json<StartExamResponse>), ApiError> {
    let started = attempt_service::start_attempt(&state, &student.id, &exam_id).await?;
    Ok((StatusCode::CREATED, Json(StartExamResponse::from_started(&started))))
}

/// POST /exams/:exam_id/submit, mounted from the exams router.
pub(crate) async fn submit_exam(
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
    Path(exam_id): Path<String>,
    Json(payload): Json<SubmitExamRequest>,
) -> Result<Json<GradeResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let submissions: Vec<AnswerSubmission> = payload
        .answers
        .into_iter()
        .map(|entry| AnswerSubmission {
            question_id: entry.question_id,
            selected_answer: entry.selected_answer,
        })
        .collect();

    let (attempt, exam) =
        attempt_service::submit_attempt(&state, &student.id, &exam_id, &submissions).await?;

    Ok(Json(GradeResponse::from_db(&attempt, exam.total_marks, exam.passing_marks)))
}

#[derive(Debug, Deserialize)]
struct AttemptListQuery {
    exam_id: Option<String>,
}

/// Students list their own attempts. Staff pass `exam_id` and get every
/// attempt on an exam they own.
async fn list_attempts(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Query(query): Query<AttemptListQuery>,
) -> Result<Json<Vec<AttemptResponse>>, ApiError> {
    let attempts = match user.role {
        UserRole::Student => repositories::attempts::list_by_student(state.db(), &user.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list attempts"))?,
        UserRole::Teacher | UserRole::Admin => {
            let Some(exam_id) = query.exam_id else {
                return Err(ApiError::BadRequest(
                    "exam_id query parameter is required".to_string(),
                ));
            };
            let exam = repositories::exams::find_by_id(state.db(), &exam_id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to load exam"))?
                .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;
            if user.role != UserRole::Admin && exam.created_by != user.id {
                return Err(ApiError::Forbidden("Only the exam owner may list its attempts"));
            }
            repositories::attempts::list_by_exam(state.db(), &exam.id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to list attempts"))?
        }
    };

    Ok(Json(attempts.iter().map(AttemptResponse::from_db).collect()))
}

async fn get_result(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
) -> Result<Json<ResultDetailResponse>, ApiError> {
    let result = attempt_service::attempt_result(&state, &attempt_id).await?;
    ensure_can_view(&user, &result.attempt.student_id, &result.exam.created_by)?;

    let student_name = repositories::users::find_name_by_id(state.db(), &result.attempt.student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load student"))?
        .unwrap_or_default();

    let grade =
        GradeResponse::from_db(&result.attempt, result.exam.total_marks, result.exam.passing_marks);
    let answers = result.answers.iter().map(AnswerDetailResponse::from_row).collect();

    Ok(Json(ResultDetailResponse {
        attempt: grade,
        exam_title: result.exam.title.clone(),
        student_name,
        answers,
    }))
}

fn ensure_can_view(user: &User, student_id: &str, exam_owner: &str) -> Result<(), ApiError> {
    let allowed = match user.role {
        UserRole::Admin => true,
        UserRole::Teacher => exam_owner == user.id,
        UserRole::Student => student_id == user.id,
    };
    if allowed {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Not allowed to view this attempt"))
    }
}
