/// Admin endpoints
///
/// All routes in this module sit behind both the bearer-token middleware and
/// the admin-role gate:
///
/// - `GET  /api/admin/stats`          - Aggregate user/task statistics
/// - `GET  /api/admin/users`          - List all user accounts
/// - `POST /api/admin/users`          - Create an account with an explicit role
/// - `PUT  /api/admin/users/:id/role` - Change an account's role
/// - `GET  /api/admin/tasks`          - List every task with assignee names

use crate::{
    app::AppState,
    error::{validation_error, ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use taskboard_shared::{
    auth::password,
    models::task::{Task, TaskStatus, TaskWithAssignee},
    models::user::{CreateUser, Role, User},
};
use uuid::Uuid;
use validator::Validate;

/// Aggregate statistics for the admin dashboard
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_users: i64,
    pub total_tasks: i64,

    /// Per-status task counts; every status appears, zero-filled
    pub tasks_by_status: BTreeMap<String, i64>,
}

/// Payload for creating an account with an explicit role
///
/// The role arrives as a raw string so an unknown value maps to 400 rather
/// than a deserialization rejection.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 100, message = "Username must be 1-100 characters"))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    /// "ADMIN" or "USER"
    pub role: String,
}

/// Payload for changing an account's role
#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    /// "ADMIN" or "USER"
    pub role: String,
}

/// Aggregate statistics
///
/// The three counts are fetched concurrently.
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<StatsResponse>> {
    let (total_users, total_tasks, status_counts) = tokio::try_join!(
        User::count(&state.db),
        Task::count(&state.db),
        Task::count_by_status(&state.db),
    )?;

    let mut tasks_by_status: BTreeMap<String, i64> =
        [TaskStatus::Pending, TaskStatus::InProgress, TaskStatus::Completed]
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();

    for (status, count) in status_counts {
        tasks_by_status.insert(status.as_str().to_string(), count);
    }

    Ok(Json(StatsResponse {
        total_users,
        total_tasks,
        tasks_by_status,
    }))
}

/// List all user accounts
///
/// Password hashes never serialize, so the full record is safe to return.
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    let users = User::list(&state.db).await?;
    Ok(Json(users))
}

/// Create an account with an explicit role
///
/// Unlike self-service registration, an admin may mint ADMIN accounts.
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed or unknown role
/// - `409 Conflict`: Email already exists
pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<Json<User>> {
    req.validate().map_err(validation_error)?;

    let role = req.role.parse::<Role>().map_err(ApiError::BadRequest)?;

    if User::find_by_email(&state.db, &req.email).await?.is_some() {
        return Err(ApiError::Conflict(
            "User with this email already exists".to_string(),
        ));
    }

    let password_hash = password::hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            username: req.username,
            email: req.email,
            password_hash,
            role,
        },
    )
    .await?;

    Ok(Json(user))
}

/// Change an account's role
///
/// # Errors
///
/// - `400 Bad Request`: Unknown role value
/// - `404 Not Found`: No such user
pub async fn set_role(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<SetRoleRequest>,
) -> ApiResult<Json<User>> {
    let role = req.role.parse::<Role>().map_err(ApiError::BadRequest)?;

    let user = User::set_role(&state.db, user_id, role)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// List every task with its assignee's name, unpaginated
pub async fn list_tasks(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<TaskWithAssignee>>> {
    let tasks = Task::list_all_with_assignee(&state.db).await?;
    Ok(Json(tasks))
}
