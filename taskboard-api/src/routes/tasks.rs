/// Task endpoints
///
/// Every handler here runs behind the bearer-token middleware and applies
/// the authorization policy per operation:
///
/// - `GET    /api/tasks`     - List tasks (own tasks for USER, all for ADMIN)
/// - `POST   /api/tasks`     - Create a task (ADMIN only, multipart)
/// - `PUT    /api/tasks/:id` - Update a task (policy-gated field set)
/// - `DELETE /api/tasks/:id` - Delete a task (policy-gated)
///
/// A task that exists but is not visible to the actor surfaces as 404, the
/// same as a task that does not exist, so unauthorized callers cannot probe
/// for task IDs. Within a visible task, a disallowed field change is 403.

use crate::{
    app::{AppState, AuthContext},
    error::{ApiError, ApiResult},
    uploads,
};
use axum::{
    extract::{Multipart, Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use taskboard_shared::{
    auth::policy,
    models::task::{
        CreateTask, ListScope, PageRequest, Pagination, Task, TaskFilter, TaskStatus,
        TaskWithAssignee, UpdateTask,
    },
    models::user::User,
};
use uuid::Uuid;

/// Query parameters for task listing
///
/// `page` and `limit` are taken as raw strings so that non-numeric values
/// produce a clean 400 instead of a framework rejection.
#[derive(Debug, Default, Deserialize)]
pub struct ListTasksQuery {
    /// Exact status filter
    pub status: Option<String>,

    /// Case-insensitive title substring filter
    pub search: Option<String>,

    /// 1-indexed page number (default 1)
    pub page: Option<String>,

    /// Page size (default 10)
    pub limit: Option<String>,
}

/// Task listing response
#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskWithAssignee>,
    pub pagination: Pagination,
}

/// Confirmation returned by delete
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
}

/// List tasks with filters and pagination
///
/// Non-admin actors only ever see tasks assigned to them; admins see all
/// tasks through the same filters.
///
/// # Errors
///
/// - `400 Bad Request`: Non-numeric or non-positive page/limit, unknown status
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<ListTasksQuery>,
) -> ApiResult<Json<TaskListResponse>> {
    let page = PageRequest::from_params(params.page.as_deref(), params.limit.as_deref())?;

    let status = params
        .status
        .as_deref()
        .map(|s| s.parse::<TaskStatus>().map_err(ApiError::BadRequest))
        .transpose()?;

    let filter = TaskFilter {
        status,
        search: params.search,
    };

    let scope = if auth.is_admin() {
        ListScope::All
    } else {
        ListScope::Assignee(auth.user_id)
    };

    let (tasks, pagination) = Task::list(&state.db, scope, &filter, &page).await?;

    Ok(Json(TaskListResponse { tasks, pagination }))
}

/// Create a task (ADMIN only)
///
/// Accepts a multipart form with fields `title`, `description`, `status`,
/// `due_date`, `assignee_id`, and an optional `file`. The attachment is
/// stored under a collision-resistant name and is immutable afterwards; the
/// due date string is persisted verbatim.
///
/// # Errors
///
/// - `400 Bad Request`: Missing title/assignee, unknown status, assignee
///   does not resolve to an existing user
/// - `403 Forbidden`: Actor is not an admin
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    mut multipart: Multipart,
) -> ApiResult<Json<Task>> {
    if !auth.is_admin() {
        return Err(ApiError::Forbidden("Admin role required".to_string()));
    }

    let mut title: Option<String> = None;
    let mut description: Option<String> = None;
    let mut status = TaskStatus::Pending;
    let mut due_date: Option<String> = None;
    let mut assignee_id: Option<Uuid> = None;
    let mut attachment: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => title = Some(read_text(field).await?),
            "description" => {
                let value = read_text(field).await?;
                if !value.is_empty() {
                    description = Some(value);
                }
            }
            "status" => {
                status = read_text(field)
                    .await?
                    .parse::<TaskStatus>()
                    .map_err(ApiError::BadRequest)?;
            }
            "due_date" => {
                // Stored verbatim; no date parsing
                let value = read_text(field).await?;
                if !value.is_empty() {
                    due_date = Some(value);
                }
            }
            "assignee_id" => {
                let value = read_text(field).await?;
                let id = value
                    .parse::<Uuid>()
                    .map_err(|_| ApiError::BadRequest(format!("Invalid assignee_id: '{}'", value)))?;
                assignee_id = Some(id);
            }
            "file" => {
                let file_name = field.file_name().unwrap_or("file").to_string();
                let data = field.bytes().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read attachment: {}", e))
                })?;
                if !data.is_empty() {
                    attachment = Some((file_name, data.to_vec()));
                }
            }
            // Unknown parts are ignored
            _ => {}
        }
    }

    let title = title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Title is required".to_string()))?;

    let assignee_id =
        assignee_id.ok_or_else(|| ApiError::BadRequest("assignee_id is required".to_string()))?;

    // The assignee must resolve to an existing user (server-side, not just
    // in the client's select box)
    if User::find_by_id(&state.db, assignee_id).await?.is_none() {
        return Err(ApiError::BadRequest(
            "assignee_id does not reference an existing user".to_string(),
        ));
    }

    let file_path = match attachment {
        Some((original_name, data)) => Some(
            uploads::store_attachment(&state.config.uploads.dir, &original_name, &data)
                .await
                .map_err(|e| ApiError::InternalError(format!("Failed to store attachment: {}", e)))?,
        ),
        None => None,
    };

    let task = Task::create(
        &state.db,
        CreateTask {
            title,
            description,
            status,
            due_date,
            assignee_id,
            file_path,
        },
    )
    .await?;

    Ok(Json(task))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart field: {}", e)))
}

/// Update a task
///
/// Looks the task up, resolves the actor's allowed field set through the
/// authorization policy, rejects any disallowed field whose value would
/// change, then applies the allowed fields in a single statement and
/// returns the canonical updated row.
///
/// # Errors
///
/// - `403 Forbidden`: Payload changes a field outside the actor's set
/// - `404 Not Found`: Task absent, or not assigned to a USER actor
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<UpdateTask>,
) -> ApiResult<Json<Task>> {
    let task = Task::find_by_id(&state.db, task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    // Visibility: for a USER, someone else's task is indistinguishable from
    // a missing one
    if !policy::can_mutate(auth.role, auth.user_id, task.assignee_id) {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }

    // An empty payload changes nothing; return the current row as-is
    if payload.is_empty() {
        return Ok(Json(task));
    }

    let allowed = policy::mutable_fields(auth.role);

    let violations = payload.disallowed_changes(&task, allowed);
    if !violations.is_empty() {
        let names: Vec<&str> = violations.iter().map(|f| f.as_str()).collect();
        return Err(ApiError::Forbidden(format!(
            "Role may not change: {}",
            names.join(", ")
        )));
    }

    // If the payload reassigns the task, the new assignee must exist
    if let Some(new_assignee) = payload.assignee_id {
        if new_assignee != task.assignee_id
            && User::find_by_id(&state.db, new_assignee).await?.is_none()
        {
            return Err(ApiError::BadRequest(
                "assignee_id does not reference an existing user".to_string(),
            ));
        }
    }

    let updated = Task::apply_update(&state.db, task_id, &payload, allowed)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    Ok(Json(updated))
}

/// Delete a task
///
/// Admins delete anything; an assignee may delete their own task once it is
/// Completed.
///
/// # Errors
///
/// - `403 Forbidden`: Own task but not Completed
/// - `404 Not Found`: Task absent, or not assigned to a USER actor
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<DeleteResponse>> {
    let task = Task::find_by_id(&state.db, task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    if !policy::can_mutate(auth.role, auth.user_id, task.assignee_id) {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }

    policy::ensure_can_delete(auth.role, auth.user_id, task.assignee_id, task.status)?;

    Task::delete(&state.db, task_id).await?;

    Ok(Json(DeleteResponse {
        message: "Task deleted successfully.".to_string(),
    }))
}
