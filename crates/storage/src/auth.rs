use async_trait::async_trait;
use tutor_core::model::UserId;

use crate::repository::StorageError;

/// Source of the signed-in learner, if any.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Returns `Ok(None)` when nobody is signed in.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the auth backend cannot be reached.
    async fn current_user(&self) -> Result<Option<UserId>, StorageError>;
}

/// Auth provider with a fixed answer. Used by local backends and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticAuth {
    user: Option<UserId>,
}

impl StaticAuth {
    #[must_use]
    pub fn signed_in(user: UserId) -> Self {
        Self { user: Some(user) }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self { user: None }
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn current_user(&self) -> Result<Option<UserId>, StorageError> {
        Ok(self.user)
    }
}
