use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::StoreError;

// --- Identity Schemas ---

/// Role
///
/// The RBAC field of an account. Stored as lowercase text and carried in session claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Account
///
/// The canonical identity record from the `accounts` table. The password is only
/// ever held as an Argon2 PHC string.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: Uuid,
    // Unique, case-sensitive as stored.
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    // Approval latch. Meaningless for admins.
    pub approved: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Admins are always effectively approved; students only once the latch is set.
    pub fn is_approved(&self) -> bool {
        self.role == Role::Admin || self.approved
    }
}

/// Raw `accounts` row. The role column is text and is validated on conversion.
#[derive(Debug, FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = String;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Account {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            role: row.role.parse()?,
            approved: row.approved,
            created_at: row.created_at,
        })
    }
}

/// NewAccount
///
/// Insert payload handed to the repository. The hash is computed before this is built.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub approved: bool,
}

/// PendingAccount
///
/// One entry of the admin approval queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct PendingAccount {
    pub email: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// RecoveryCode
///
/// A one-time password-reset secret. At most one exists per email.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct RecoveryCode {
    pub email: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl RecoveryCode {
    /// Expired strictly after `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

// --- Content Schemas ---

/// Event
///
/// A campus event posted by an admin.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    // Storage key of the photo, empty when none was attached.
    pub photo: String,
    pub posted_by: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ItemKind {
    Lost,
    Found,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Lost => "lost",
            ItemKind::Found => "found",
        }
    }
}

impl TryFrom<String> for ItemKind {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "lost" => Ok(ItemKind::Lost),
            "found" => Ok(ItemKind::Found),
            other => Err(StoreError::Backend(format!("unknown item kind: {other}"))),
        }
    }
}

/// Item
///
/// A lost or found item posted by any approved account.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Item {
    pub id: Uuid,
    // 'type' is a reserved keyword in Rust; exposed as "type" in JSON.
    #[serde(rename = "type")]
    #[sqlx(try_from = "String")]
    pub kind: ItemKind,
    pub name: String,
    pub description: String,
    pub photo: String,
    pub posted_by: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads ---
//
// Fields default to empty so that a missing field surfaces as a validation error
// with the usual `{success:false, message}` body.

/// CredentialsRequest
///
/// Body of register, student login and admin login.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CredentialsRequest {
    #[serde(default)]
    #[schema(example = "a@x.edu")]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ApproveRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SendOtpRequest {
    #[serde(default)]
    pub email: String,
}

/// ResetPasswordRequest
///
/// Body of the code redemption endpoint. `newPassword` keeps the frontend's casing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    #[schema(example = "482913")]
    pub otp: String,
    #[serde(default, rename = "newPassword")]
    pub new_password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateEventRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    // Storage key returned by the presigned upload flow.
    #[serde(default)]
    pub photo: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateItemRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub photo: Option<String>,
}

/// PresignedUrlRequest
///
/// Input payload for requesting a short-lived photo upload URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PresignedUrlRequest {
    /// The original filename, used to derive the file extension.
    #[serde(default)]
    #[schema(example = "lost_wallet.jpg")]
    pub filename: String,
    /// The MIME type the upload is constrained to.
    #[serde(default)]
    #[schema(example = "image/jpeg")]
    pub file_type: String,
}

// --- Response Payloads ---

/// MessageResponse
///
/// Generic envelope used for every plain success and for every failure.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserSummary {
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PendingResponse {
    pub success: bool,
    pub pending: Vec<PendingAccount>,
}

/// OtpResponse
///
/// `otp` is only present when the server is configured to echo codes in-band.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct OtpResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub otp: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct EventsResponse {
    pub success: bool,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ItemsResponse {
    pub success: bool,
    pub items: Vec<Item>,
}

/// PresignedUrlResponse
///
/// The time-limited URL for the PUT request and the key to reference afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PresignedUrlResponse {
    pub success: bool,
    pub upload_url: String,
    pub resource_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admins_are_always_approved() {
        let admin = Account {
            id: Uuid::new_v4(),
            email: "root@campus.edu".into(),
            password_hash: String::new(),
            role: Role::Admin,
            approved: false,
            created_at: Utc::now(),
        };
        assert!(admin.is_approved());

        let student = Account {
            role: Role::Student,
            ..admin
        };
        assert!(!student.is_approved());
    }

    #[test]
    fn account_rows_reject_unknown_roles() {
        let row = AccountRow {
            id: Uuid::new_v4(),
            email: "a@x.edu".into(),
            password_hash: "h".into(),
            role: "janitor".into(),
            approved: true,
            created_at: Utc::now(),
        };
        assert!(Account::try_from(row).is_err());
    }

    #[test]
    fn recovery_codes_expire_strictly_after_deadline() {
        let deadline = Utc::now();
        let code = RecoveryCode {
            email: "a@x.edu".into(),
            code: "123456".into(),
            expires_at: deadline,
        };
        assert!(!code.is_expired(deadline));
        assert!(code.is_expired(deadline + chrono::Duration::milliseconds(1)));
    }

    #[test]
    fn reset_request_uses_camel_case_new_password() {
        let req: ResetPasswordRequest =
            serde_json::from_str(r#"{"email":"a@x.edu","otp":"123456","newPassword":"pw2"}"#)
                .unwrap();
        assert_eq!(req.new_password, "pw2");
    }

    #[test]
    fn otp_is_omitted_when_not_exposed() {
        let json = serde_json::to_value(OtpResponse {
            success: true,
            message: "sent".into(),
            otp: None,
        })
        .unwrap();
        assert!(json.get("otp").is_none());
    }

    #[test]
    fn item_kind_is_serialized_as_type() {
        let item = Item {
            id: Uuid::new_v4(),
            kind: ItemKind::Found,
            name: "Keys".into(),
            description: "Blue lanyard".into(),
            photo: String::new(),
            posted_by: "a@x.edu".into(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(item).unwrap();
        assert_eq!(json["type"], "found");
    }
}
