//! # Hearth Worker Library
//!
//! Background jobs of Hearth, run on a fixed interval against the shared
//! database.
//!
//! ## Modules
//!
//! - `config`: Worker configuration from the environment
//! - `jobs`: The `ScheduledJob` contract and its error type
//! - `orchestrator`: Tick loop with graceful shutdown
//! - `recurrence`: Regeneration of recurring tasks
//! - `sweeper`: Archiving of overdue tasks
//! - `purge`: Deletion of expired join codes

pub mod config;
pub mod jobs;
pub mod orchestrator;
pub mod purge;
pub mod recurrence;
pub mod sweeper;
