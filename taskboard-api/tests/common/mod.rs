/// Common test utilities for integration tests
///
/// Provides shared infrastructure:
/// - Test database setup and per-context cleanup
/// - A seeded admin and regular user with valid bearer tokens
/// - Request helpers that drive the router in-process via `tower::Service`

use axum::body::Body;
use axum::http::{Request, StatusCode};
use sqlx::PgPool;
use taskboard_api::app::{build_router, AppState};
use taskboard_api::config::Config;
use taskboard_shared::auth::jwt::{create_token, Claims};
use taskboard_shared::auth::password;
use taskboard_shared::db::migrations::run_migrations;
use taskboard_shared::models::task::{CreateTask, Task, TaskStatus};
use taskboard_shared::models::user::{CreateUser, Role, User};
use tower::Service as _;
use uuid::Uuid;

/// Password used for every seeded account
pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Test context containing the app, the pool, and two seeded actors
pub struct TestContext {
    pub db: PgPool,
    pub app: axum::Router,
    pub admin: User,
    pub admin_token: String,
    pub user: User,
    pub user_token: String,
}

impl TestContext {
    /// Creates a new test context against the configured database
    pub async fn new() -> anyhow::Result<Self> {
        let config = Config::from_env()?;

        let db = PgPool::connect(&config.database.url).await?;
        run_migrations(&db).await?;

        let password_hash = password::hash_password(TEST_PASSWORD)?;

        let admin = User::create(
            &db,
            CreateUser {
                username: "Test Admin".to_string(),
                email: format!("admin-{}@example.com", Uuid::new_v4()),
                password_hash: password_hash.clone(),
                role: Role::Admin,
            },
        )
        .await?;

        let user = User::create(
            &db,
            CreateUser {
                username: "Test User".to_string(),
                email: format!("user-{}@example.com", Uuid::new_v4()),
                password_hash,
                role: Role::User,
            },
        )
        .await?;

        let admin_token = create_token(&Claims::new(admin.user_id, admin.role), &config.jwt.secret)?;
        let user_token = create_token(&Claims::new(user.user_id, user.role), &config.jwt.secret)?;

        let state = AppState::new(db.clone(), config);
        let app = build_router(state);

        Ok(TestContext {
            db,
            app,
            admin,
            admin_token,
            user,
            user_token,
        })
    }

    /// Authorization header value for the seeded admin
    pub fn admin_auth(&self) -> String {
        format!("Bearer {}", self.admin_token)
    }

    /// Authorization header value for the seeded regular user
    pub fn user_auth(&self) -> String {
        format!("Bearer {}", self.user_token)
    }

    /// Sends a request with no body
    pub async fn request(
        &mut self,
        method: &str,
        uri: &str,
        auth: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            builder = builder.header("authorization", auth);
        }
        let request = builder.body(Body::empty()).unwrap();

        self.send(request).await
    }

    /// Sends a request with a JSON body
    pub async fn request_json(
        &mut self,
        method: &str,
        uri: &str,
        auth: Option<&str>,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(auth) = auth {
            builder = builder.header("authorization", auth);
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();

        self.send(request).await
    }

    /// Sends a multipart task-creation request
    pub async fn request_multipart(
        &mut self,
        uri: &str,
        auth: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &[u8])>,
    ) -> (StatusCode, serde_json::Value) {
        let boundary = "----taskboard-test-boundary";
        let mut body: Vec<u8> = Vec::new();

        for (name, value) in fields {
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            );
            body.extend_from_slice(value.as_bytes());
            body.extend_from_slice(b"\r\n");
        }

        if let Some((file_name, data)) = file {
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                    file_name
                )
                .as_bytes(),
            );
            body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }

        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("authorization", auth)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();

        self.send(request).await
    }

    async fn send(&mut self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.app.call(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };

        (status, json)
    }

    /// Removes everything this context created
    ///
    /// Tasks first (the assignee FK has no cascade), then the two users.
    /// Extra accounts minted by a test must be removed by that test before
    /// calling this.
    pub async fn cleanup(&self) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM tasks WHERE assignee_id = ANY($1)")
            .bind(vec![self.admin.user_id, self.user.user_id])
            .execute(&self.db)
            .await?;

        sqlx::query("DELETE FROM users WHERE user_id = ANY($1)")
            .bind(vec![self.admin.user_id, self.user.user_id])
            .execute(&self.db)
            .await?;

        Ok(())
    }
}

/// Seeds a task directly through the model layer
pub async fn seed_task(
    ctx: &TestContext,
    title: &str,
    assignee_id: Uuid,
    status: TaskStatus,
    due_date: Option<&str>,
) -> anyhow::Result<Task> {
    let task = Task::create(
        &ctx.db,
        CreateTask {
            title: title.to_string(),
            description: None,
            status,
            due_date: due_date.map(|d| d.to_string()),
            assignee_id,
            file_path: None,
        },
    )
    .await?;

    Ok(task)
}
