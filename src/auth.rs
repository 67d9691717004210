use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use uuid::Uuid;

use crate::{error::ApiError, models::Role, repository::RepositoryState, session::SessionIssuer};

const INVALID_TOKEN: &str = "Invalid token";

/// AuthUser
///
/// The principal resolved for an authenticated request. `approved` comes from the
/// store as of this request, never from the token.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub approved: bool,
}

impl AuthUser {
    /// Role predicate. Fails with `Forbidden` on mismatch.
    pub fn require_role(&self, role: Role) -> Result<&Self, ApiError> {
        if self.role == role {
            Ok(self)
        } else {
            Err(ApiError::Forbidden(match role {
                Role::Admin => "Admin only",
                Role::Student => "Students only",
            }))
        }
    }

    /// Approval predicate for posting content. Admins are always approved.
    pub fn require_approved(&self) -> Result<&Self, ApiError> {
        if self.role == Role::Admin || self.approved {
            Ok(self)
        } else {
            Err(ApiError::Forbidden("Account not approved"))
        }
    }
}

/// AuthUser Extractor Implementation
///
/// 1. Reuses a principal already resolved earlier in the same request (the route
///    layer and the handler both extract it).
/// 2. Requires `Authorization: Bearer <token>`.
/// 3. Verifies signature and expiry through the `SessionIssuer`.
/// 4. Re-reads the account by the `sub` claim so deleted accounts and approval
///    changes take effect immediately.
///
/// Every authentication failure is the same `401 Invalid token`.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    SessionIssuer: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let sessions = SessionIssuer::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::Unauthenticated(INVALID_TOKEN))?;

        let claims = sessions.verify(token)?;

        let account = repo
            .find_account_by_id(claims.sub)
            .await?
            .ok_or_else(|| {
                tracing::warn!(sub = %claims.sub, "token subject no longer exists");
                ApiError::Unauthenticated(INVALID_TOKEN)
            })?;

        let user = AuthUser {
            id: account.id,
            email: account.email,
            role: account.role,
            approved: account.approved,
        };
        parts.extensions.insert(user.clone());

        Ok(user)
    }
}

/// AdminUser
///
/// An `AuthUser` that passed `require_role(Role::Admin)`. Missing or bad tokens
/// reject with 401, valid non-admin sessions with 403.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    SessionIssuer: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        user.require_role(Role::Admin)?;
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role, approved: bool) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            email: "a@x.edu".into(),
            role,
            approved,
        }
    }

    #[test]
    fn require_role_rejects_mismatch_with_forbidden() {
        let student = user(Role::Student, true);
        assert_eq!(
            student.require_role(Role::Admin).unwrap_err(),
            ApiError::Forbidden("Admin only")
        );
        assert!(user(Role::Admin, false).require_role(Role::Admin).is_ok());
    }

    #[test]
    fn require_approved_lets_admins_through() {
        assert!(user(Role::Admin, false).require_approved().is_ok());
        assert!(user(Role::Student, true).require_approved().is_ok());
        assert!(user(Role::Student, false).require_approved().is_err());
    }
}
