use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::{
    error::{ApiError, StoreError},
    models::{Account, NewAccount, Role},
    password::{self, PasswordCost},
    repository::RepositoryState,
};

const BAD_CREDENTIALS: &str = "Invalid credentials or account not approved";
const BAD_ADMIN_CREDENTIALS: &str = "Invalid admin credentials";
const DUMMY_PASSWORD: &str = "campus-hub-unknown-account";

/// Outcome of first-boot admin seeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Created,
    AlreadyPresent,
}

/// CredentialStore
///
/// Registration, credential verification and the two account mutations
/// (approval latch, password replacement).
#[derive(Clone)]
pub struct CredentialStore {
    repo: RepositoryState,
    cost: PasswordCost,
    /// Verified against when the email is unknown, so that path costs one hash
    /// verification like every other rejection.
    dummy_hash: Arc<OnceCell<String>>,
}

impl CredentialStore {
    pub fn new(repo: RepositoryState, cost: PasswordCost) -> Self {
        Self {
            repo,
            cost,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    async fn dummy_hash(&self) -> Result<String, ApiError> {
        let hash = self
            .dummy_hash
            .get_or_try_init(|| password::hash_password(DUMMY_PASSWORD.to_string(), self.cost))
            .await?;
        Ok(hash.clone())
    }

    /// register
    ///
    /// Creates an unapproved student. Uniqueness is decided by the store's insert,
    /// so concurrent registrations of one email yield exactly one success.
    pub async fn register(&self, email: &str, password: &str) -> Result<Account, ApiError> {
        require_field(email, "Email is required")?;
        require_field(password, "Password is required")?;

        let password_hash = password::hash_password(password.to_string(), self.cost).await?;
        let account = self
            .repo
            .insert_account(NewAccount {
                email: email.to_string(),
                password_hash,
                role: Role::Student,
                approved: false,
            })
            .await?;

        tracing::info!(email = %account.email, "student registered, pending approval");
        Ok(account)
    }

    /// verify_credential
    ///
    /// Fails with `Unauthenticated` when the account is absent, the role does not
    /// match `required_role`, the account is an unapproved student, or the password
    /// is wrong. The caller cannot tell which check failed, neither from the error
    /// nor from the time taken: every path verifies one password hash first.
    pub async fn verify_credential(
        &self,
        email: &str,
        password: &str,
        required_role: Option<Role>,
    ) -> Result<Account, ApiError> {
        let rejection = ApiError::Unauthenticated(match required_role {
            Some(Role::Admin) => BAD_ADMIN_CREDENTIALS,
            _ => BAD_CREDENTIALS,
        });

        let Some(account) = self.repo.find_account_by_email(email).await? else {
            let dummy = self.dummy_hash().await?;
            password::verify_password(password.to_string(), dummy).await?;
            tracing::warn!(email = %email, "login for unknown account");
            return Err(rejection);
        };

        if !password::verify_password(password.to_string(), account.password_hash.clone()).await? {
            tracing::warn!(email = %email, "login with wrong password");
            return Err(rejection);
        }

        if required_role.is_some_and(|role| role != account.role) {
            tracing::warn!(email = %email, role = %account.role, "login with wrong role");
            return Err(rejection);
        }

        if !account.is_approved() {
            tracing::warn!(email = %email, "login before approval");
            return Err(rejection);
        }

        Ok(account)
    }

    /// set_approved
    ///
    /// Idempotent latch. Fails with `NotFound` if no account has this email.
    pub async fn set_approved(&self, email: &str) -> Result<(), ApiError> {
        if self.repo.mark_approved(email).await? {
            Ok(())
        } else {
            Err(ApiError::NotFound("Student not found"))
        }
    }

    /// set_password
    ///
    /// Replaces the stored hash. Fails with `NotFound` if no account has this email.
    pub async fn set_password(&self, email: &str, new_password: &str) -> Result<(), ApiError> {
        require_field(new_password, "New password is required")?;

        let hash = password::hash_password(new_password.to_string(), self.cost).await?;
        if self.repo.update_password_hash(email, &hash).await? {
            Ok(())
        } else {
            Err(ApiError::NotFound("Email not registered"))
        }
    }

    /// set_password_with_code
    ///
    /// Password replacement gated by a recovery code: the (email, code) record is
    /// deleted and the hash replaced in one transaction. Returns false, changing
    /// nothing, if the record was already consumed, superseded, or expired by `now`.
    pub async fn set_password_with_code(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, ApiError> {
        require_field(new_password, "New password is required")?;

        let hash = password::hash_password(new_password.to_string(), self.cost).await?;
        Ok(self.repo.consume_recovery_code(email, code, &hash, now).await?)
    }

    /// seed_admin
    ///
    /// Creates the approved admin account at first boot. An existing account with
    /// the same email is left untouched, whatever its role or password.
    pub async fn seed_admin(&self, email: &str, password: &str) -> Result<SeedOutcome, ApiError> {
        if self.repo.find_account_by_email(email).await?.is_some() {
            return Ok(SeedOutcome::AlreadyPresent);
        }

        let password_hash = password::hash_password(password.to_string(), self.cost).await?;
        let inserted = self
            .repo
            .insert_account(NewAccount {
                email: email.to_string(),
                password_hash,
                role: Role::Admin,
                approved: true,
            })
            .await;

        match inserted {
            Ok(_) => Ok(SeedOutcome::Created),
            // Another instance seeded it between our lookup and insert.
            Err(StoreError::Duplicate) => Ok(SeedOutcome::AlreadyPresent),
            Err(e) => Err(e.into()),
        }
    }
}

pub(crate) fn require_field(value: &str, message: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        Err(ApiError::Validation(message.to_string()))
    } else {
        Ok(())
    }
}
