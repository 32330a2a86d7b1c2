//! # Taskboard Shared Library
//!
//! This crate contains shared types, utilities, and business logic used by
//! the Taskboard API server.
//!
//! ## Module Organization
//!
//! - `models`: Database models and query/mutation operations
//! - `auth`: Authentication (JWT, passwords) and the authorization policy
//! - `db`: Connection pool and migration runner

pub mod auth;
pub mod db;
pub mod models;

/// Current version of the Taskboard shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
