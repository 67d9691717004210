//! One-time-code password recovery.
//!
//! A code is a uniform draw from `100000..=999999`, stored per email with an
//! absolute expiry. Issuing a new code replaces the previous one; redeeming a
//! code consumes it together with the password change.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::{Rng, rngs::OsRng};
use std::sync::Arc;

use crate::{
    credentials::{CredentialStore, require_field},
    error::ApiError,
    models::RecoveryCode,
    repository::RepositoryState,
};

pub const CODE_MIN: u32 = 100_000;
pub const CODE_MAX: u32 = 999_999;

/// CodeNotifier
///
/// Out-of-band delivery channel for recovery codes (email in practice).
/// Delivery is detached from issuance: the request that asked for the code
/// does not wait for it.
#[async_trait]
pub trait CodeNotifier: Send + Sync {
    async fn deliver(&self, email: &str, code: &str) -> Result<(), String>;
}

pub type NotifierState = Arc<dyn CodeNotifier>;

/// LogNotifier
///
/// Writes the code to the application log. Stand-in for a real mail transport.
pub struct LogNotifier;

#[async_trait]
impl CodeNotifier for LogNotifier {
    async fn deliver(&self, email: &str, code: &str) -> Result<(), String> {
        tracing::info!(email = %email, otp = %code, "recovery code issued");
        Ok(())
    }
}

/// Draws a fixed-width six digit code.
pub fn generate_code<R: Rng>(rng: &mut R) -> String {
    rng.gen_range(CODE_MIN..=CODE_MAX).to_string()
}

#[derive(Clone)]
pub struct RecoveryService {
    repo: RepositoryState,
    credentials: CredentialStore,
    notifier: NotifierState,
    ttl: Duration,
}

impl RecoveryService {
    pub fn new(
        repo: RepositoryState,
        credentials: CredentialStore,
        notifier: NotifierState,
        ttl_secs: i64,
    ) -> Self {
        Self {
            repo,
            credentials,
            notifier,
            ttl: Duration::seconds(ttl_secs),
        }
    }

    pub async fn request_code(&self, email: &str) -> Result<RecoveryCode, ApiError> {
        self.request_code_at(email, Utc::now()).await
    }

    /// request_code_at
    ///
    /// Fails with `NotFound` for unknown emails, leaving no record behind.
    /// Otherwise upserts a fresh code (superseding any live one) and hands it to
    /// the notifier on a detached task.
    pub async fn request_code_at(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<RecoveryCode, ApiError> {
        require_field(email, "Email is required")?;

        if self.repo.find_account_by_email(email).await?.is_none() {
            return Err(ApiError::NotFound("Email not registered"));
        }

        let record = RecoveryCode {
            email: email.to_string(),
            code: generate_code(&mut OsRng),
            expires_at: now + self.ttl,
        };
        self.repo.upsert_recovery_code(&record).await?;

        let notifier = Arc::clone(&self.notifier);
        let (to, code) = (record.email.clone(), record.code.clone());
        tokio::spawn(async move {
            if let Err(e) = notifier.deliver(&to, &code).await {
                tracing::error!(email = %to, error = %e, "recovery code delivery failed");
            }
        });

        Ok(record)
    }

    pub async fn redeem_code(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        self.redeem_code_at(email, code, new_password, Utc::now())
            .await
    }

    /// redeem_code_at
    ///
    /// `InvalidCode` when no record matches (email, code) exactly, `ExpiredCode`
    /// when `now` is past the stored expiry (even though the record still exists).
    /// On success the password changes and the code is gone, atomically.
    pub async fn redeem_code_at(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        require_field(email, "Email is required")?;
        require_field(code, "OTP is required")?;
        require_field(new_password, "New password is required")?;

        let record = self
            .repo
            .find_recovery_code(email, code)
            .await?
            .ok_or(ApiError::InvalidCode)?;

        if record.is_expired(now) {
            return Err(ApiError::ExpiredCode);
        }

        // Lost a race with a concurrent redemption or supersession.
        if !self
            .credentials
            .set_password_with_code(email, code, new_password, now)
            .await?
        {
            return Err(ApiError::InvalidCode);
        }

        tracing::info!(email = %email, "password reset via recovery code");
        Ok(())
    }

    /// Deletes codes that expired before `now`. Not needed for correctness.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, ApiError> {
        Ok(self.repo.purge_expired_codes(now).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn codes_are_six_digits_within_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let code = generate_code(&mut rng);
            assert_eq!(code.len(), 6);
            let value: u32 = code.parse().unwrap();
            assert!((CODE_MIN..=CODE_MAX).contains(&value));
        }
    }
}
