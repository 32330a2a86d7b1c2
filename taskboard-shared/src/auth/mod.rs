//! Authentication and authorization utilities
//!
//! - `jwt`: bearer token creation and verification (the credential verifier)
//! - `password`: Argon2id password hashing
//! - `policy`: pure role/ownership decision functions applied by every
//!   task mutation and admin endpoint

pub mod jwt;
pub mod password;
pub mod policy;
