//! Persistence seam for access tokens
//!
//! The callback saves the token it obtained under the user's id. Where tokens
//! actually live (database, vault, cache) is up to the host application.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;

use crate::oauth2::types::AccessToken;

/// Token storage failure
#[derive(Debug, Error)]
pub enum TokenStoreError {
    /// The backing store could not be reached or refused the write
    #[error("Token store unavailable: {0}")]
    Unavailable(String),
}

/// Storage for access tokens, keyed by user id
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Save `token` for `user_id`, replacing any previous one
    async fn save(&self, user_id: i64, token: AccessToken) -> Result<(), TokenStoreError>;

    /// Load the token saved for `user_id`
    async fn load(&self, user_id: i64) -> Result<Option<AccessToken>, TokenStoreError>;
}

/// Process-local [`TokenStore`]
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    tokens: RwLock<HashMap<i64, AccessToken>>,
}

impl InMemoryTokenStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn save(&self, user_id: i64, token: AccessToken) -> Result<(), TokenStoreError> {
        self.tokens.write().insert(user_id, token);
        Ok(())
    }

    async fn load(&self, user_id: i64) -> Result<Option<AccessToken>, TokenStoreError> {
        Ok(self.tokens.read().get(&user_id).cloned())
    }
}
