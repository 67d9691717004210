//! Student approval workflow.
//!
//! Approval is a one-way latch, `pending -> approved`. Only an admin principal
//! drives it; there is no revoke transition.

use crate::{
    credentials::{CredentialStore, require_field},
    error::ApiError,
    models::PendingAccount,
    repository::RepositoryState,
};

#[derive(Clone)]
pub struct ApprovalWorkflow {
    repo: RepositoryState,
    credentials: CredentialStore,
}

impl ApprovalWorkflow {
    pub fn new(repo: RepositoryState, credentials: CredentialStore) -> Self {
        Self { repo, credentials }
    }

    /// Unapproved students, oldest registration first.
    pub async fn list_pending(&self) -> Result<Vec<PendingAccount>, ApiError> {
        Ok(self.repo.list_pending_students().await?)
    }

    /// Latches approval for `email`. Approving twice is a success.
    pub async fn approve(&self, email: &str) -> Result<(), ApiError> {
        require_field(email, "Email is required")?;
        self.credentials.set_approved(email).await?;
        tracing::info!(email = %email, "student approved");
        Ok(())
    }
}
