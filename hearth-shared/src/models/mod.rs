/// Database models and their queries
///
/// Each model owns its SQL. Functions that must take part in a caller's
/// transaction accept `&mut PgConnection`; the rest take the pool.
///
/// Columns documented as "sealed" hold [`crate::crypto::FieldCipher`] output.
/// Models never encrypt or decrypt; they store what they are given.
///
/// # Models
///
/// - `house`: households
/// - `user`: parents and children
/// - `animal`: pets and their mood
/// - `task`: chores with assignees and animals
/// - `recurrence`: daily/weekly/monthly regeneration rules
/// - `join_code`: short-lived invites
/// - `billing_plan`: subscription plans
/// - `affiliate`: partner offers per animal type
/// - `media`: uploaded files

pub mod affiliate;
pub mod animal;
pub mod billing_plan;
pub mod house;
pub mod join_code;
pub mod media;
pub mod recurrence;
pub mod task;
pub mod user;
