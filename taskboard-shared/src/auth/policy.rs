/// Authorization policy for tasks and accounts
///
/// This module is the single decision point for role-based access control.
/// Every route that mutates a task goes through these functions instead of
/// branching on the role inline, so the rules live in exactly one place:
///
/// - ADMIN may mutate and delete any task, any field, regardless of status.
/// - USER may mutate only a task assigned to them, and only the fields
///   `status` and `request_message`.
/// - USER may delete only a task assigned to them, and only when its status
///   is `Completed`.
///
/// All functions here are pure: they take the actor's identity and role plus
/// the resource's owner (the task assignee) and return a decision. No I/O.
///
/// # Example
///
/// ```
/// use taskboard_shared::auth::policy::{can_mutate, mutable_fields, TaskField};
/// use taskboard_shared::models::user::Role;
/// use uuid::Uuid;
///
/// let me = Uuid::new_v4();
/// assert!(can_mutate(Role::User, me, me));
/// assert!(!can_mutate(Role::User, me, Uuid::new_v4()));
/// assert!(mutable_fields(Role::User).contains(&TaskField::Status));
/// assert!(!mutable_fields(Role::User).contains(&TaskField::Title));
/// ```

use uuid::Uuid;

use crate::models::task::TaskStatus;
use crate::models::user::Role;

/// Error type for policy denials
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// Actor may not mutate this task at all
    #[error("Not authorized to modify this task")]
    NotOwner,

    /// Actor may only delete the task once it is completed
    #[error("Only completed tasks may be deleted by their assignee")]
    StatusNotDeletable,
}

/// Mutable fields of a task, as named in update payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskField {
    Title,
    Description,
    Status,
    DueDate,
    AssigneeId,
    RequestMessage,
}

impl TaskField {
    /// Payload field name, as it appears in JSON bodies
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskField::Title => "title",
            TaskField::Description => "description",
            TaskField::Status => "status",
            TaskField::DueDate => "due_date",
            TaskField::AssigneeId => "assignee_id",
            TaskField::RequestMessage => "request_message",
        }
    }
}

impl std::fmt::Display for TaskField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every updatable field (the admin set)
const ADMIN_FIELDS: &[TaskField] = &[
    TaskField::Title,
    TaskField::Description,
    TaskField::Status,
    TaskField::DueDate,
    TaskField::AssigneeId,
    TaskField::RequestMessage,
];

/// Fields an assignee may change on their own task
const USER_FIELDS: &[TaskField] = &[TaskField::Status, TaskField::RequestMessage];

/// Returns the set of task fields the given role is allowed to change
pub fn mutable_fields(role: Role) -> &'static [TaskField] {
    match role {
        Role::Admin => ADMIN_FIELDS,
        Role::User => USER_FIELDS,
    }
}

/// Whether the actor may mutate a task owned by `assignee_id`
///
/// Admins may mutate any task; users only their own.
pub fn can_mutate(actor_role: Role, actor_id: Uuid, assignee_id: Uuid) -> bool {
    match actor_role {
        Role::Admin => true,
        Role::User => actor_id == assignee_id,
    }
}

/// Whether the actor may delete a task owned by `assignee_id` in `status`
///
/// Admins may delete any task regardless of status. Users may delete only
/// their own task, and only once it is `Completed`. This rule is enforced
/// here on the server, not just surfaced in a client.
pub fn can_delete(
    actor_role: Role,
    actor_id: Uuid,
    assignee_id: Uuid,
    status: TaskStatus,
) -> bool {
    match actor_role {
        Role::Admin => true,
        Role::User => actor_id == assignee_id && status == TaskStatus::Completed,
    }
}

/// Checks `can_delete` and maps the denial to a specific error
///
/// Callers must have already established that the actor may see the task;
/// this distinguishes "yours but not completed" from "not yours".
pub fn ensure_can_delete(
    actor_role: Role,
    actor_id: Uuid,
    assignee_id: Uuid,
    status: TaskStatus,
) -> Result<(), PolicyError> {
    if can_delete(actor_role, actor_id, assignee_id, status) {
        return Ok(());
    }

    if actor_id == assignee_id {
        Err(PolicyError::StatusNotDeletable)
    } else {
        Err(PolicyError::NotOwner)
    }
}
