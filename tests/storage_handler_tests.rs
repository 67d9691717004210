mod common;

use axum::http::StatusCode;
use campus_hub::{MockStorageService, create_router, models::Role};
use common::{TestContext, body_json, json_request};
use serde_json::json;
use tower::util::ServiceExt;

async fn student_context(storage: MockStorageService) -> (TestContext, String) {
    let ctx = TestContext::with_storage(storage);
    let student = ctx
        .insert_account("s@x.edu", "pw", Role::Student, true)
        .await;
    let token = ctx.token_for(&student);
    (ctx, token)
}

#[tokio::test]
async fn test_presigned_url_success() {
    let (ctx, token) = student_context(MockStorageService::new()).await;
    let app = create_router(ctx.state.clone());

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/upload/presigned",
            json!({ "filename": "Wallet.JPG", "file_type": "image/jpeg" }),
            Some(&token),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    let key = body["resource_key"].as_str().unwrap();
    assert!(key.starts_with("uploads/"));
    assert!(key.ends_with(".jpg"));
    assert!(body["upload_url"].as_str().unwrap().contains(key));
}

#[tokio::test]
async fn test_presigned_url_storage_failure_is_500() {
    let (ctx, token) = student_context(MockStorageService::new_failing()).await;
    let app = create_router(ctx.state.clone());

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/upload/presigned",
            json!({ "filename": "a.png", "file_type": "image/png" }),
            Some(&token),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    // The storage detail stays in the logs.
    assert_eq!(body["message"], "Internal server error");
}

#[tokio::test]
async fn test_presigned_url_requires_file_type() {
    let (ctx, token) = student_context(MockStorageService::new()).await;
    let app = create_router(ctx.state.clone());

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/upload/presigned",
            json!({ "filename": "a.png" }),
            Some(&token),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "File type is required");
}

#[tokio::test]
async fn test_presigned_url_requires_token() {
    let app = create_router(TestContext::new().state);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/upload/presigned",
            json!({ "filename": "a.png", "file_type": "image/png" }),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
