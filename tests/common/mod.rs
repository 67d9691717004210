#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, Response, header},
};
use campus_hub::{
    AppConfig, AppState, InMemoryRepository, LogNotifier, MockStorageService,
    models::{Account, NewAccount, Role},
    password::{self, PasswordCost},
    repository::{Repository, RepositoryState},
    storage::StorageState,
};
use serde_json::Value;
use std::sync::Arc;

pub const ADMIN_EMAIL: &str = "admin@campus.local";
pub const ADMIN_PASSWORD: &str = "12345678";

/// TestContext
///
/// A fully wired `AppState` over the in-memory repository, plus a handle on that
/// repository for direct inspection.
pub struct TestContext {
    pub repo: Arc<InMemoryRepository>,
    pub state: AppState,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_storage(MockStorageService::new())
    }

    pub fn with_storage(storage: MockStorageService) -> Self {
        Self::with_config(storage, AppConfig::default())
    }

    pub fn with_config(storage: MockStorageService, config: AppConfig) -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let state = AppState::new(
            repo.clone() as RepositoryState,
            Arc::new(storage) as StorageState,
            Arc::new(LogNotifier),
            config,
        );
        Self { repo, state }
    }

    /// Seeds the default admin through the credential store, like startup does.
    pub async fn with_admin() -> Self {
        let ctx = Self::new();
        ctx.state
            .credentials
            .seed_admin(ADMIN_EMAIL, ADMIN_PASSWORD)
            .await
            .expect("admin seed failed");
        ctx
    }

    /// Inserts an account directly, bypassing registration.
    pub async fn insert_account(&self, email: &str, pw: &str, role: Role, approved: bool) -> Account {
        let password_hash = password::hash_password(pw.to_string(), PasswordCost::testing())
            .await
            .expect("hash failed");
        self.repo
            .insert_account(NewAccount {
                email: email.to_string(),
                password_hash,
                role,
                approved,
            })
            .await
            .expect("insert failed")
    }

    /// Issues a session token for an account without going through login.
    pub fn token_for(&self, account: &Account) -> String {
        self.state.sessions.issue(account).expect("issue failed")
    }
}

pub fn json_request(method: &str, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
