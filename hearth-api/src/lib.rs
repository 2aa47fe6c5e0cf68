//! # Hearth API Server Library
//!
//! HTTP surface of Hearth, the household pet and chore tracker.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `bootstrap`: Startup tasks (administrator account)
//! - `config`: Configuration from the environment
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Request timing
//! - `routes`: Route handlers

pub mod app;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
