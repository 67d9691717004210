use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session token. Everything that creates or
/// proves an identity lives here, plus the read-only content listings.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers.
        .route("/health", get(handlers::health))
        // POST /student/register
        // Creates an unapproved student account.
        .route("/student/register", post(handlers::register_student))
        // POST /student/login
        // Issues a session token to any approved account.
        .route("/student/login", post(handlers::student_login))
        // POST /admin/login
        // Issues a session token to admin accounts only.
        .route("/admin/login", post(handlers::admin_login))
        // POST /forgot-password/send-otp
        // Issues (or replaces) the recovery code for an email.
        .route("/forgot-password/send-otp", post(handlers::send_otp))
        // POST /forgot-password/reset
        // Redeems a recovery code and replaces the password.
        .route("/forgot-password/reset", post(handlers::reset_password))
        // GET /events/all, GET /items/all
        // Newest first.
        .route("/events/all", get(handlers::list_events))
        .route("/items/all", get(handlers::list_items))
}
