use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Identity and access control.
pub mod approval;
pub mod auth;
pub mod credentials;
pub mod password;
pub mod recovery;
pub mod session;

// Persistence, storage and shared types.
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod storage;

// HTTP surface.
pub mod handlers;
pub mod routes;

use auth::{AdminUser, AuthUser};
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use approval::ApprovalWorkflow;
pub use config::AppConfig;
pub use credentials::{CredentialStore, SeedOutcome};
pub use error::{ApiError, ApiJson, StoreError};
pub use recovery::{CodeNotifier, LogNotifier, NotifierState, RecoveryService};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use session::SessionIssuer;
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// Generated OpenAPI document, served at `/api-docs/openapi.json` and browsable
/// through the Swagger UI at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health, handlers::register_student, handlers::student_login,
        handlers::admin_login, handlers::list_pending, handlers::approve_student,
        handlers::send_otp, handlers::reset_password, handlers::upload_event,
        handlers::list_events, handlers::upload_lost, handlers::upload_found,
        handlers::list_items, handlers::get_presigned_url,
    ),
    components(
        schemas(
            models::Role, models::CredentialsRequest, models::ApproveRequest,
            models::SendOtpRequest, models::ResetPasswordRequest, models::CreateEventRequest,
            models::CreateItemRequest, models::PresignedUrlRequest, models::MessageResponse,
            models::UserSummary, models::LoginResponse, models::PendingAccount,
            models::PendingResponse, models::OtpResponse, models::Event, models::Item,
            models::EventsResponse, models::ItemsResponse, models::PresignedUrlResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "campus-hub", description = "Campus Hub identity, approval and content API")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// AppState
///
/// Unified State Pattern: one cloneable container for every service, shared by
/// all requests. Services hold `Arc`s internally, so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub storage: StorageState,
    pub config: AppConfig,
    pub sessions: SessionIssuer,
    pub credentials: CredentialStore,
    pub approvals: ApprovalWorkflow,
    pub recovery: RecoveryService,
}

impl AppState {
    /// Wires the identity services on top of a repository, a storage backend and
    /// a code notifier, all parameterised by `config`.
    pub fn new(
        repo: RepositoryState,
        storage: StorageState,
        notifier: NotifierState,
        config: AppConfig,
    ) -> Self {
        let sessions = SessionIssuer::new(&config.jwt_secret);
        let credentials = CredentialStore::new(repo.clone(), config.password_cost);
        let approvals = ApprovalWorkflow::new(repo.clone(), credentials.clone());
        let recovery = RecoveryService::new(
            repo.clone(),
            credentials.clone(),
            notifier,
            config.otp_ttl_secs,
        );

        Self {
            repo,
            storage,
            config,
            sessions,
            credentials,
            approvals,
            recovery,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for SessionIssuer {
    fn from_ref(app_state: &AppState) -> SessionIssuer {
        app_state.sessions.clone()
    }
}

/// auth_middleware
///
/// Rejects the request with 401 unless `AuthUser` resolves. The resolved principal
/// is cached in the request extensions for the handler.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// admin_middleware
///
/// 401 without a valid session, 403 for a valid non-admin session.
async fn admin_middleware(_admin: AdminUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the API under `/api`, the Swagger UI, and the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let api = Router::new()
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .merge(
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                admin_middleware,
            )),
        );

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for `TraceLayer` carrying the request id so every log line of a request
/// can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
