//! Database utilities
//!
//! - `pool`: connection pool creation and lifecycle
//! - `migrations`: sqlx migration runner

pub mod migrations;
pub mod pool;

pub use migrations::run_migrations;
pub use pool::{close_pool, create_pool, DatabaseConfig};
