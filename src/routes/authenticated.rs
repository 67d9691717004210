use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Authenticated Router Module
///
/// Routes behind the `AuthUser` route layer. Handlers still apply their own
/// predicates on the resolved principal (`require_approved`, or the `AdminUser`
/// extractor for event uploads).
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /upload/presigned
        // Short-lived (10-minute) signed URL for a direct photo upload to S3/MinIO.
        .route("/upload/presigned", post(handlers::get_presigned_url))
        // POST /upload/lost, POST /upload/found
        // Any approved principal may post lost and found items.
        .route("/upload/lost", post(handlers::upload_lost))
        .route("/upload/found", post(handlers::upload_found))
        // POST /event/upload
        // Authenticated here; the handler additionally requires the admin role.
        .route("/event/upload", post(handlers::upload_event))
}
