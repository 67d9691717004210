use crate::{
    AppState,
    auth::{AdminUser, AuthUser},
    credentials::require_field,
    error::{ApiError, ApiJson},
    models::{
        ApproveRequest, CreateEventRequest, CreateItemRequest, CredentialsRequest, EventsResponse,
        ItemKind, ItemsResponse, LoginResponse, MessageResponse, OtpResponse, PendingResponse,
        PresignedUrlRequest, PresignedUrlResponse, ResetPasswordRequest, Role, SendOtpRequest,
        UserSummary,
    },
    storage,
};
use axum::{Json, extract::State};

// --- Health ---

/// health
///
/// [Public Route] Liveness check.
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service is up", body = MessageResponse))
)]
pub async fn health() -> Json<MessageResponse> {
    Json(MessageResponse::ok("Campus Hub Backend Running"))
}

// --- Identity ---

/// register_student
///
/// [Public Route] Creates an unapproved student account. The account cannot log in
/// until an admin approves it.
#[utoipa::path(
    post,
    path = "/api/student/register",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Registered", body = MessageResponse),
        (status = 400, description = "Email already exists or missing field", body = MessageResponse)
    )
)]
pub async fn register_student(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CredentialsRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .credentials
        .register(&payload.email, &payload.password)
        .await?;
    Ok(Json(MessageResponse::ok(
        "Registered successfully. Wait for admin approval.",
    )))
}

/// student_login
///
/// [Public Route] Issues a session token to an approved account. Any role may use
/// this endpoint; unapproved students are rejected like bad passwords.
#[utoipa::path(
    post,
    path = "/api/student/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid credentials or account not approved", body = MessageResponse)
    )
)]
pub async fn student_login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CredentialsRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    login(&state, payload, None).await
}

/// admin_login
///
/// [Public Route] Issues a session token to an admin account only.
#[utoipa::path(
    post,
    path = "/api/admin/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid admin credentials", body = MessageResponse)
    )
)]
pub async fn admin_login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CredentialsRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    login(&state, payload, Some(Role::Admin)).await
}

async fn login(
    state: &AppState,
    payload: CredentialsRequest,
    required_role: Option<Role>,
) -> Result<Json<LoginResponse>, ApiError> {
    let account = state
        .credentials
        .verify_credential(&payload.email, &payload.password, required_role)
        .await?;
    let token = state.sessions.issue(&account)?;

    tracing::info!(email = %account.email, role = %account.role, "session issued");
    Ok(Json(LoginResponse {
        success: true,
        token,
        user: UserSummary {
            email: account.email,
            role: account.role,
        },
    }))
}

// --- Approval ---

/// list_pending
///
/// [Admin Route] The approval queue: unapproved students in registration order.
#[utoipa::path(
    get,
    path = "/api/admin/pending",
    responses(
        (status = 200, description = "Pending students", body = PendingResponse),
        (status = 401, description = "Missing or invalid token", body = MessageResponse),
        (status = 403, description = "Not an admin", body = MessageResponse)
    ),
    security(("bearer" = []))
)]
pub async fn list_pending(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<PendingResponse>, ApiError> {
    let pending = state.approvals.list_pending().await?;
    Ok(Json(PendingResponse {
        success: true,
        pending,
    }))
}

/// approve_student
///
/// [Admin Route] Latches approval on a student account. Idempotent.
#[utoipa::path(
    post,
    path = "/api/admin/approve",
    request_body = ApproveRequest,
    responses(
        (status = 200, description = "Approved", body = MessageResponse),
        (status = 403, description = "Not an admin", body = MessageResponse),
        (status = 404, description = "No such account", body = MessageResponse)
    ),
    security(("bearer" = []))
)]
pub async fn approve_student(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ApproveRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.approvals.approve(&payload.email).await?;
    tracing::info!(admin = %admin.email, student = %payload.email, "approval recorded");
    Ok(Json(MessageResponse::ok("Student approved successfully")))
}

// --- Recovery ---

/// send_otp
///
/// [Public Route] Issues a recovery code. Unknown emails get a 404, which does
/// disclose whether an account exists. The code is echoed back only when
/// `expose_otp` is configured.
#[utoipa::path(
    post,
    path = "/api/forgot-password/send-otp",
    request_body = SendOtpRequest,
    responses(
        (status = 200, description = "Code issued", body = OtpResponse),
        (status = 404, description = "Email not registered", body = MessageResponse)
    )
)]
pub async fn send_otp(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SendOtpRequest>,
) -> Result<Json<OtpResponse>, ApiError> {
    let record = state.recovery.request_code(&payload.email).await?;

    let (message, otp) = if state.config.expose_otp {
        ("OTP sent successfully (check console)", Some(record.code))
    } else {
        ("OTP sent successfully", None)
    };

    Ok(Json(OtpResponse {
        success: true,
        message: message.to_string(),
        otp,
    }))
}

/// reset_password
///
/// [Public Route] Redeems a recovery code and replaces the password.
#[utoipa::path(
    post,
    path = "/api/forgot-password/reset",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid or expired OTP", body = MessageResponse)
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .recovery
        .redeem_code(&payload.email, &payload.otp, &payload.new_password)
        .await?;
    Ok(Json(MessageResponse::ok("Password reset successfully")))
}

// --- Content ---

/// upload_event
///
/// [Admin Route] Posts a campus event attributed to the admin's email.
#[utoipa::path(
    post,
    path = "/api/event/upload",
    request_body = CreateEventRequest,
    responses(
        (status = 200, description = "Event stored", body = MessageResponse),
        (status = 403, description = "Not an admin", body = MessageResponse)
    ),
    security(("bearer" = []))
)]
pub async fn upload_event(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateEventRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    require_field(&payload.title, "Title is required")?;
    let photo = payload.photo.as_deref().map(storage::sanitize_key).unwrap_or_default();

    state
        .repo
        .insert_event(&payload.title, &payload.description, &photo, &admin.email)
        .await?;
    Ok(Json(MessageResponse::ok("Event uploaded successfully")))
}

/// list_events
///
/// [Public Route] All events, newest first.
#[utoipa::path(
    get,
    path = "/api/events/all",
    responses((status = 200, description = "Events", body = EventsResponse))
)]
pub async fn list_events(State(state): State<AppState>) -> Result<Json<EventsResponse>, ApiError> {
    let events = state.repo.list_events().await?;
    Ok(Json(EventsResponse {
        success: true,
        events,
    }))
}

/// upload_lost
///
/// [Authenticated Route] Posts a lost item. Any role, approved principal.
#[utoipa::path(
    post,
    path = "/api/upload/lost",
    request_body = CreateItemRequest,
    responses((status = 200, description = "Item stored", body = MessageResponse)),
    security(("bearer" = []))
)]
pub async fn upload_lost(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateItemRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    post_item(&state, &user, ItemKind::Lost, payload).await?;
    Ok(Json(MessageResponse::ok("Lost item posted successfully")))
}

/// upload_found
///
/// [Authenticated Route] Posts a found item. Any role, approved principal.
#[utoipa::path(
    post,
    path = "/api/upload/found",
    request_body = CreateItemRequest,
    responses((status = 200, description = "Item stored", body = MessageResponse)),
    security(("bearer" = []))
)]
pub async fn upload_found(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateItemRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    post_item(&state, &user, ItemKind::Found, payload).await?;
    Ok(Json(MessageResponse::ok("Found item posted successfully")))
}

async fn post_item(
    state: &AppState,
    user: &AuthUser,
    kind: ItemKind,
    payload: CreateItemRequest,
) -> Result<(), ApiError> {
    user.require_approved()?;
    require_field(&payload.name, "Name is required")?;
    let photo = payload.photo.as_deref().map(storage::sanitize_key).unwrap_or_default();

    state
        .repo
        .insert_item(kind, &payload.name, &payload.description, &photo, &user.email)
        .await?;
    Ok(())
}

/// list_items
///
/// [Public Route] All lost and found items, newest first.
#[utoipa::path(
    get,
    path = "/api/items/all",
    responses((status = 200, description = "Items", body = ItemsResponse))
)]
pub async fn list_items(State(state): State<AppState>) -> Result<Json<ItemsResponse>, ApiError> {
    let items = state.repo.list_items().await?;
    Ok(Json(ItemsResponse {
        success: true,
        items,
    }))
}

/// get_presigned_url
///
/// [Authenticated Route] Generates a short-lived URL for a direct photo upload.
/// The returned `resource_key` is what the client sends as `photo` afterwards.
#[utoipa::path(
    post,
    path = "/api/upload/presigned",
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "URL", body = PresignedUrlResponse),
        (status = 500, description = "Storage unavailable", body = MessageResponse)
    ),
    security(("bearer" = []))
)]
pub async fn get_presigned_url(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<PresignedUrlRequest>,
) -> Result<Json<PresignedUrlResponse>, ApiError> {
    user.require_approved()?;
    require_field(&payload.file_type, "File type is required")?;

    let object_key = storage::photo_key(&payload.filename);
    let upload_url = state
        .storage
        .get_presigned_upload_url(&object_key, &payload.file_type)
        .await
        .map_err(ApiError::Unexpected)?;

    Ok(Json(PresignedUrlResponse {
        success: true,
        upload_url,
        resource_key: object_key,
    }))
}
