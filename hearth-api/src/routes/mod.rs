/// API route handlers, one module per resource
///
/// Handlers take `State<AppState>` and, behind the bearer layer,
/// `Extension<AuthContext>`. Rows are turned into client-facing bodies by
/// [`views`], which opens sealed fields.

pub mod admin;
pub mod affiliates;
pub mod animals;
pub mod auth;
pub mod billing_plans;
pub mod health;
pub mod house;
pub mod join_code;
pub mod media;
pub mod recurrences;
pub mod tasks;
pub mod users;
pub mod views;
