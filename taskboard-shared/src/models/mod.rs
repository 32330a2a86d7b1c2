//! Database models
//!
//! Each model owns its table's queries. Handlers call these methods with the
//! injected pool; no module-level connection state exists.

pub mod task;
pub mod user;
