//! Password hashing helpers.
//!
//! Passwords are Argon2id-hashed with a per-password random salt and stored in
//! PHC string format, so the salt and work factors travel with the hash.
//! Hashing is CPU-bound and always runs on the blocking pool.

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{SaltString, rand_core::OsRng},
};

use crate::error::ApiError;

/// PasswordCost
///
/// Argon2 work factors used for new hashes. Verification always uses the factors
/// embedded in the stored hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PasswordCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordCost {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl PasswordCost {
    /// Minimal factors for test suites.
    pub fn testing() -> Self {
        Self {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn hasher(&self) -> Result<Argon2<'static>, ApiError> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| ApiError::Unexpected(format!("invalid argon2 params: {e}")))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Hash a plaintext password into a PHC string.
pub async fn hash_password(password: String, cost: PasswordCost) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || {
        let argon2 = cost.hasher()?;
        let salt = SaltString::generate(&mut OsRng);
        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ApiError::Unexpected(format!("failed to hash password: {e}")))
    })
    .await
    .map_err(|e| ApiError::Unexpected(format!("hashing task failed: {e}")))?
}

/// Verify a plaintext password against a stored PHC string.
///
/// The final digest comparison is constant-time. An unparsable stored hash is an
/// `Unexpected` failure, not a mismatch.
pub async fn verify_password(password: String, stored_hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&stored_hash)
            .map_err(|e| ApiError::Unexpected(format!("corrupt password hash: {e}")))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|e| ApiError::Unexpected(format!("verification task failed: {e}")))?
}
