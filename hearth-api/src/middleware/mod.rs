/// Middleware for the API server
///
/// Authentication lives in `hearth_shared::auth::middleware` and
/// [`crate::app`]; this module holds the HTTP-only layers.

pub mod timing;
