use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::pagination::{default_limit, PaginatedResponse};
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::user::{AdminUserCreate, AdminUserUpdate, UserResponse};
use crate::schemas::StatusResponse;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:user_id", get(get_user).patch(update_user).delete(delete_user))
}

#[derive(Debug, Deserialize)]
struct UserListQuery {
    role: Option<UserRole>,
    is_active: Option<bool>,
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

async fn list_users(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<PaginatedResponse<UserResponse>>, ApiError> {
    let filter = repositories::users::UserFilter {
        role: query.role,
        is_active: query.is_active,
        skip: query.skip,
        limit: query.limit,
    };

    let users = repositories::users::list(state.db(), &filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list users"))?;
    let total_count = repositories::users::count(state.db(), &filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count users"))?;

    Ok(Json(PaginatedResponse {
        items: users.iter().map(UserResponse::from_db).collect(),
        total_count,
        skip: query.skip,
        limit: query.limit,
    }))
}

async fn create_user(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<AdminUserCreate>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let existing = repositories::users::exists_by_username(state.db(), &payload.username)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check existing user"))?;
    if existing.is_some() {
        return Err(ApiError::Conflict("Username already taken".to_string()));
    }

    let hashed_password = security::hash_password(&payload.password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;
    let now = primitive_now_utc();

    let user = repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            username: &payload.username,
            hashed_password,
            full_name: &payload.full_name,
            role: payload.role,
            is_active: payload.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create user"))?;

    Ok((StatusCode::CREATED, Json(UserResponse::from_db(&user))))
}

async fn get_user(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = repositories::users::find_by_id(state.db(), &user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(UserResponse::from_db(&user)))
}

async fn update_user(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<AdminUserUpdate>,
) -> Result<Json<UserResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let user = repositories::users::find_by_id(state.db(), &user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    // An admin may not lock themselves out by demoting or deactivating their
    // own account.
    if user.id == admin.id
        && (payload.role.is_some_and(|role| role != UserRole::Admin)
            || payload.is_active == Some(false))
    {
        return Err(ApiError::BadRequest("Cannot demote or deactivate yourself".to_string()));
    }

    let hashed_password = match &payload.password {
        Some(password) => Some(
            security::hash_password(password)
                .map_err(|e| ApiError::internal(e, "Failed to hash password"))?,
        ),
        None => None,
    };

    repositories::users::update(
        state.db(),
        &user.id,
        repositories::users::UpdateUser {
            full_name: payload.full_name,
            role: payload.role,
            is_active: payload.is_active,
            hashed_password,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update user"))?;

    let updated = repositories::users::fetch_one_by_id(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to reload user"))?;

    Ok(Json(UserResponse::from_db(&updated)))
}

async fn delete_user(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    if user_id == admin.id {
        return Err(ApiError::BadRequest("Cannot delete yourself".to_string()));
    }

    let deleted = repositories::users::delete(state.db(), &user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete user"))?;
    if !deleted {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    Ok(Json(StatusResponse { status: "deleted" }))
}
