/// Database access: connection pool and embedded migrations
///
/// Models live in [`crate::models`].

pub mod migrations;
pub mod pool;
