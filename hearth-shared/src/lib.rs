//! # Hearth shared library
//!
//! Types and logic shared by the Hearth API server and the background worker.
//!
//! ## Modules
//!
//! - `models`: database models and queries
//! - `auth`: passwords, tokens, API key guard, authorization checks
//! - `crypto`: field-level encryption of personal data
//! - `db`: connection pool and migrations
//! - `search`: pagination and ordering for list endpoints
//! - `period`: calendar windows for task filters

pub mod auth;
pub mod crypto;
pub mod db;
pub mod models;
pub mod period;
pub mod search;

/// Current version of the Hearth shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
