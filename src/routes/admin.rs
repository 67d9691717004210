use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// The approval queue. The whole router sits behind the `AdminUser` route layer:
/// no token is 401, a student token is 403. `/admin/login` is public and is
/// mounted by the public router instead.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/pending
        // Unapproved students in registration order.
        .route("/admin/pending", get(handlers::list_pending))
        // POST /admin/approve
        // Latches approval on a student account.
        .route("/admin/approve", post(handlers::approve_student))
}
