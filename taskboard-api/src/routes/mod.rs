//! API route handlers
//!
//! Routes are organized by resource:
//! - `auth`: Registration and login (public)
//! - `tasks`: Task CRUD with per-operation authorization
//! - `admin`: Account management, aggregate listings, statistics
//! - `health`: Health check

pub mod admin;
pub mod auth;
pub mod health;
pub mod tasks;
