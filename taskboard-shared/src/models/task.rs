/// Task model, query engine, and mutation operations
///
/// Tasks are the core entity of Taskboard. Every task is assigned to exactly
/// one user; "my tasks" means an exact match on `assignee_id`.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('Pending', 'In Progress', 'Completed');
///
/// CREATE TABLE tasks (
///     task_id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     title VARCHAR(255) NOT NULL,
///     description TEXT,
///     status task_status NOT NULL DEFAULT 'Pending',
///     due_date TEXT,
///     assignee_id UUID NOT NULL REFERENCES users(user_id),
///     file_path TEXT,
///     request_message TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Due dates
///
/// `due_date` is a plain `YYYY-MM-DD` calendar string stored in a TEXT
/// column and round-tripped verbatim. It is never parsed into a date type
/// anywhere on the read or write path; converting it through a timestamp
/// shifts the day depending on the server timezone. Lexicographic ordering
/// of `YYYY-MM-DD` strings is chronological, so sorting works unchanged.
///
/// # Query composition
///
/// List and count queries share one predicate builder ([`TaskFilter::push_predicates`])
/// so the pagination totals always agree with the rows returned. The filters
/// are an explicit ordered list of typed `push_bind` calls; there is no
/// manual `$n` parameter-index bookkeeping to drift between the two queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::str::FromStr;
use uuid::Uuid;

use crate::auth::policy::TaskField;

/// Task status, an ordered progression (reverse transitions are not
/// restricted)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status")]
pub enum TaskStatus {
    /// Not started
    Pending,

    /// Being worked on
    #[sqlx(rename = "In Progress")]
    #[serde(rename = "In Progress")]
    InProgress,

    /// Done; the only state in which an assignee may delete the task
    Completed,
}

impl TaskStatus {
    /// Converts status to its stored string form
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Completed => "Completed",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(TaskStatus::Pending),
            "In Progress" => Ok(TaskStatus::InProgress),
            "Completed" => Ok(TaskStatus::Completed),
            other => Err(format!("Invalid status: '{}'", other)),
        }
    }
}

/// Task model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    /// Unique task ID
    pub task_id: Uuid,

    /// Title
    pub title: String,

    /// Optional free-text description
    pub description: Option<String>,

    /// Current status
    pub status: TaskStatus,

    /// Due date as a plain `YYYY-MM-DD` string (see module docs)
    pub due_date: Option<String>,

    /// The user this task is assigned to (required)
    pub assignee_id: Uuid,

    /// Attachment path relative to the uploads root; set at creation only
    pub file_path: Option<String>,

    /// Free-text message from the assignee to the admins; cleared only by
    /// being overwritten
    pub request_message: Option<String>,

    /// When the task was created
    pub created_at: DateTime<Utc>,
}

/// Task row joined with its assignee's username, as returned by listings
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskWithAssignee {
    pub task_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub due_date: Option<String>,
    pub assignee_id: Uuid,
    pub file_path: Option<String>,
    pub request_message: Option<String>,
    pub created_at: DateTime<Utc>,

    /// Username of the assignee
    pub assignee_name: String,
}

/// Input for creating a new task
#[derive(Debug, Clone)]
pub struct CreateTask {
    /// Title (required)
    pub title: String,

    /// Optional description
    pub description: Option<String>,

    /// Initial status (defaults to Pending)
    pub status: TaskStatus,

    /// Optional due date, passed through verbatim
    pub due_date: Option<String>,

    /// Assignee (must reference an existing user)
    pub assignee_id: Uuid,

    /// Optional attachment path; immutable after creation
    pub file_path: Option<String>,
}

/// Partial update payload for a task
///
/// Absent fields are left unchanged. The API layer decides which of the
/// present fields the actor may apply via the authorization policy;
/// [`UpdateTask::disallowed_changes`] reports any present-but-forbidden
/// field whose value differs from what is stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<String>,
    pub assignee_id: Option<Uuid>,
    pub request_message: Option<String>,
}

impl UpdateTask {
    /// Returns true when no field is present
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.due_date.is_none()
            && self.assignee_id.is_none()
            && self.request_message.is_none()
    }

    /// Fields present in this payload that are outside `allowed` and whose
    /// value differs from the stored task
    ///
    /// A forbidden field submitted with its current value is tolerated
    /// (clients commonly echo the whole form back); a forbidden field with a
    /// *changed* value is a policy violation the caller rejects with
    /// `Forbidden`.
    pub fn disallowed_changes(&self, current: &Task, allowed: &[TaskField]) -> Vec<TaskField> {
        let mut violations = Vec::new();

        let mut check = |field: TaskField, changed: bool| {
            if changed && !allowed.contains(&field) {
                violations.push(field);
            }
        };

        if let Some(title) = &self.title {
            check(TaskField::Title, *title != current.title);
        }
        if let Some(description) = &self.description {
            check(
                TaskField::Description,
                Some(description) != current.description.as_ref(),
            );
        }
        if let Some(status) = self.status {
            check(TaskField::Status, status != current.status);
        }
        if let Some(due_date) = &self.due_date {
            check(TaskField::DueDate, Some(due_date) != current.due_date.as_ref());
        }
        if let Some(assignee_id) = self.assignee_id {
            check(TaskField::AssigneeId, assignee_id != current.assignee_id);
        }
        if let Some(message) = &self.request_message {
            check(
                TaskField::RequestMessage,
                Some(message) != current.request_message.as_ref(),
            );
        }

        violations
    }
}

/// Which tasks a listing covers
#[derive(Debug, Clone, Copy)]
pub enum ListScope {
    /// Every task (admin listings)
    All,

    /// Only tasks assigned to this user
    Assignee(Uuid),
}

/// Optional filters composed with AND on top of the scope
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Exact status match
    pub status: Option<TaskStatus>,

    /// Case-insensitive substring match on the title
    pub search: Option<String>,
}

impl TaskFilter {
    /// Pushes the WHERE clause for this filter and scope onto a query
    ///
    /// Used by both the data query and the count query so the two can never
    /// disagree. Predicates are appended in a fixed order: scope, status,
    /// search.
    fn push_predicates(&self, qb: &mut QueryBuilder<'_, Postgres>, scope: ListScope) {
        qb.push(" WHERE 1 = 1");

        if let ListScope::Assignee(user_id) = scope {
            qb.push(" AND t.assignee_id = ").push_bind(user_id);
        }

        if let Some(status) = self.status {
            qb.push(" AND t.status = ").push_bind(status);
        }

        if let Some(search) = &self.search {
            qb.push(" AND t.title ILIKE ")
                .push_bind(format!("%{}%", search));
        }
    }
}

/// A validated, 1-indexed page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-indexed page number
    pub page: i64,

    /// Items per page
    pub limit: i64,
}

/// Error for malformed pagination parameters
#[derive(Debug, thiserror::Error)]
#[error("Invalid pagination parameter '{name}': {value}")]
pub struct PageParamError {
    pub name: &'static str,
    pub value: String,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

impl PageRequest {
    /// Parses `page` and `limit` query parameters
    ///
    /// Missing parameters default to `page=1, limit=10`. Non-numeric or
    /// non-positive values are rejected.
    pub fn from_params(
        page: Option<&str>,
        limit: Option<&str>,
    ) -> Result<Self, PageParamError> {
        let parse = |name: &'static str, value: Option<&str>, default: i64| match value {
            None => Ok(default),
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(PageParamError {
                    name,
                    value: raw.to_string(),
                }),
            },
        };

        Ok(Self {
            page: parse("page", page, 1)?,
            limit: parse("limit", limit, 10)?,
        })
    }

    /// Row offset for this page
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// Pagination metadata returned alongside a page of tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Total rows matching the filter, across all pages
    pub total_items: i64,

    /// ceil(total_items / items_per_page)
    pub total_pages: i64,

    /// The 1-indexed page returned
    pub current_page: i64,

    /// Page size used
    pub items_per_page: i64,
}

impl Pagination {
    /// Builds pagination metadata for a page request
    pub fn new(total_items: i64, page: &PageRequest) -> Self {
        Self {
            total_items,
            total_pages: (total_items + page.limit - 1) / page.limit,
            current_page: page.page,
            items_per_page: page.limit,
        }
    }
}

const TASK_COLUMNS: &str = "task_id, title, description, status, due_date, \
                            assignee_id, file_path, request_message, created_at";

impl Task {
    /// Creates a new task
    ///
    /// The assignee reference is enforced by the foreign key; callers
    /// resolve the assignee first to produce a friendlier error.
    pub async fn create(pool: &PgPool, data: CreateTask) -> Result<Self, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (title, description, status, due_date, assignee_id, file_path)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING task_id, title, description, status, due_date,
                      assignee_id, file_path, request_message, created_at
            "#,
        )
        .bind(data.title)
        .bind(data.description)
        .bind(data.status)
        .bind(data.due_date)
        .bind(data.assignee_id)
        .bind(data.file_path)
        .fetch_one(pool)
        .await?;

        Ok(task)
    }

    /// Finds a task by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE task_id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(task)
    }

    /// Lists tasks matching a scope and filter, with pagination
    ///
    /// Ordering is canonical: ascending due date with nulls last, ties
    /// broken by descending creation time. The count query reuses the exact
    /// predicate set of the data query and carries no LIMIT/OFFSET binds.
    pub async fn list(
        pool: &PgPool,
        scope: ListScope,
        filter: &TaskFilter,
        page: &PageRequest,
    ) -> Result<(Vec<TaskWithAssignee>, Pagination), sqlx::Error> {
        let mut count_query: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM tasks t");
        filter.push_predicates(&mut count_query, scope);

        let mut data_query: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "SELECT t.task_id, t.title, t.description, t.status, t.due_date, \
             t.assignee_id, t.file_path, t.request_message, t.created_at, \
             u.username AS assignee_name \
             FROM tasks t JOIN users u ON t.assignee_id = u.user_id",
        );
        filter.push_predicates(&mut data_query, scope);
        data_query
            .push(" ORDER BY t.due_date ASC NULLS LAST, t.created_at DESC")
            .push(" LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let (total_items, tasks) = tokio::try_join!(
            count_query.build_query_scalar::<i64>().fetch_one(pool),
            data_query
                .build_query_as::<TaskWithAssignee>()
                .fetch_all(pool),
        )?;

        Ok((tasks, Pagination::new(total_items, page)))
    }

    /// Lists every task with its assignee name, newest first (admin view)
    pub async fn list_all_with_assignee(
        pool: &PgPool,
    ) -> Result<Vec<TaskWithAssignee>, sqlx::Error> {
        let tasks = sqlx::query_as::<_, TaskWithAssignee>(
            r#"
            SELECT t.task_id, t.title, t.description, t.status, t.due_date,
                   t.assignee_id, t.file_path, t.request_message, t.created_at,
                   u.username AS assignee_name
            FROM tasks t
            JOIN users u ON t.assignee_id = u.user_id
            ORDER BY t.created_at DESC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(tasks)
    }

    /// Applies the allowed subset of an update payload in a single statement
    ///
    /// Only fields that are both present in the payload and listed in
    /// `allowed` are written; everything else stays as stored. Returns the
    /// canonical updated row, or `None` if the task disappeared between the
    /// caller's lookup and this write (the documented read-then-write race).
    ///
    /// An update that ends up touching nothing re-reads and returns the
    /// current row, keeping the operation idempotent.
    pub async fn apply_update(
        pool: &PgPool,
        id: Uuid,
        payload: &UpdateTask,
        allowed: &[TaskField],
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("UPDATE tasks SET ");
        let mut fields = qb.separated(", ");
        let mut touched = false;

        let permitted = |field: TaskField| allowed.contains(&field);

        if let (Some(title), true) = (&payload.title, permitted(TaskField::Title)) {
            fields.push("title = ").push_bind_unseparated(title);
            touched = true;
        }
        if let (Some(description), true) =
            (&payload.description, permitted(TaskField::Description))
        {
            fields
                .push("description = ")
                .push_bind_unseparated(description);
            touched = true;
        }
        if let (Some(status), true) = (payload.status, permitted(TaskField::Status)) {
            fields.push("status = ").push_bind_unseparated(status);
            touched = true;
        }
        if let (Some(due_date), true) = (&payload.due_date, permitted(TaskField::DueDate)) {
            // Verbatim pass-through; no date parsing (see module docs)
            fields.push("due_date = ").push_bind_unseparated(due_date);
            touched = true;
        }
        if let (Some(assignee_id), true) =
            (payload.assignee_id, permitted(TaskField::AssigneeId))
        {
            fields
                .push("assignee_id = ")
                .push_bind_unseparated(assignee_id);
            touched = true;
        }
        if let (Some(message), true) = (
            &payload.request_message,
            permitted(TaskField::RequestMessage),
        ) {
            fields
                .push("request_message = ")
                .push_bind_unseparated(message);
            touched = true;
        }

        if !touched {
            return Self::find_by_id(pool, id).await;
        }

        qb.push(" WHERE task_id = ")
            .push_bind(id)
            .push(" RETURNING ")
            .push(TASK_COLUMNS);

        let task = qb.build_query_as::<Task>().fetch_optional(pool).await?;

        Ok(task)
    }

    /// Permanently deletes a task
    ///
    /// Returns whether a row was removed.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE task_id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Counts all tasks
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Counts tasks grouped by status
    ///
    /// Statuses with no tasks are absent from the result; callers fill in
    /// zeroes.
    pub async fn count_by_status(
        pool: &PgPool,
    ) -> Result<Vec<(TaskStatus, i64)>, sqlx::Error> {
        let counts: Vec<(TaskStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM tasks GROUP BY status")
                .fetch_all(pool)
                .await?;

        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::policy::{mutable_fields, TaskField};
    use crate::models::user::Role;

    fn sample_task() -> Task {
        Task {
            task_id: Uuid::new_v4(),
            title: "Write report".to_string(),
            description: Some("Quarterly numbers".to_string()),
            status: TaskStatus::Pending,
            due_date: Some("2024-03-15".to_string()),
            assignee_id: Uuid::new_v4(),
            file_path: None,
            request_message: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_as_str() {
        assert_eq!(TaskStatus::Pending.as_str(), "Pending");
        assert_eq!(TaskStatus::InProgress.as_str(), "In Progress");
        assert_eq!(TaskStatus::Completed.as_str(), "Completed");
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("Pending".parse::<TaskStatus>().unwrap(), TaskStatus::Pending);
        assert_eq!(
            "In Progress".parse::<TaskStatus>().unwrap(),
            TaskStatus::InProgress
        );
        assert_eq!(
            "Completed".parse::<TaskStatus>().unwrap(),
            TaskStatus::Completed
        );
        assert!("in progress".parse::<TaskStatus>().is_err());
        assert!("Done".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_status_serde_uses_display_form() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"In Progress\"");
        let status: TaskStatus = serde_json::from_str("\"In Progress\"").unwrap();
        assert_eq!(status, TaskStatus::InProgress);
    }

    #[test]
    fn test_page_request_defaults() {
        let page = PageRequest::from_params(None, None).unwrap();
        assert_eq!(page, PageRequest { page: 1, limit: 10 });
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn test_page_request_parses_values() {
        let page = PageRequest::from_params(Some("3"), Some("25")).unwrap();
        assert_eq!(page.page, 3);
        assert_eq!(page.limit, 25);
        assert_eq!(page.offset(), 50);
    }

    #[test]
    fn test_page_request_rejects_bad_input() {
        assert!(PageRequest::from_params(Some("abc"), None).is_err());
        assert!(PageRequest::from_params(Some("0"), None).is_err());
        assert!(PageRequest::from_params(Some("-1"), None).is_err());
        assert!(PageRequest::from_params(None, Some("0")).is_err());
        assert!(PageRequest::from_params(None, Some("ten")).is_err());

        let err = PageRequest::from_params(Some("x"), None).unwrap_err();
        assert_eq!(err.name, "page");
        assert_eq!(err.value, "x");
    }

    #[test]
    fn test_pagination_total_pages() {
        let page = PageRequest { page: 1, limit: 10 };

        // 25 items at limit 10 -> 3 pages
        let p = Pagination::new(25, &page);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.total_items, 25);
        assert_eq!(p.items_per_page, 10);

        // Exact multiple
        assert_eq!(Pagination::new(30, &page).total_pages, 3);

        // Empty result
        assert_eq!(Pagination::new(0, &page).total_pages, 0);
    }

    #[test]
    fn test_pagination_serializes_camel_case() {
        let p = Pagination::new(25, &PageRequest { page: 2, limit: 10 });
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["totalItems"], 25);
        assert_eq!(json["totalPages"], 3);
        assert_eq!(json["currentPage"], 2);
        assert_eq!(json["itemsPerPage"], 10);
    }

    #[test]
    fn test_disallowed_changes_flags_changed_title_for_user() {
        let task = sample_task();
        let payload = UpdateTask {
            title: Some("New title".to_string()),
            status: Some(TaskStatus::InProgress),
            ..Default::default()
        };

        let violations = payload.disallowed_changes(&task, mutable_fields(Role::User));
        assert_eq!(violations, vec![TaskField::Title]);
    }

    #[test]
    fn test_disallowed_changes_tolerates_echoed_values() {
        let task = sample_task();
        // Client echoes the whole form back with only status changed
        let payload = UpdateTask {
            title: Some(task.title.clone()),
            description: task.description.clone(),
            due_date: task.due_date.clone(),
            assignee_id: Some(task.assignee_id),
            status: Some(TaskStatus::Completed),
            request_message: Some("Need two more days".to_string()),
        };

        let violations = payload.disallowed_changes(&task, mutable_fields(Role::User));
        assert!(violations.is_empty());
    }

    #[test]
    fn test_disallowed_changes_admin_has_none() {
        let task = sample_task();
        let payload = UpdateTask {
            title: Some("Retitled".to_string()),
            assignee_id: Some(Uuid::new_v4()),
            due_date: Some("2024-12-31".to_string()),
            ..Default::default()
        };

        let violations = payload.disallowed_changes(&task, mutable_fields(Role::Admin));
        assert!(violations.is_empty());
    }

    #[test]
    fn test_disallowed_changes_due_date_for_user() {
        let task = sample_task();
        let payload = UpdateTask {
            due_date: Some("2024-04-01".to_string()),
            ..Default::default()
        };

        let violations = payload.disallowed_changes(&task, mutable_fields(Role::User));
        assert_eq!(violations, vec![TaskField::DueDate]);
    }

    #[test]
    fn test_update_task_is_empty() {
        assert!(UpdateTask::default().is_empty());
        assert!(!UpdateTask {
            status: Some(TaskStatus::Completed),
            ..Default::default()
        }
        .is_empty());
    }
}
