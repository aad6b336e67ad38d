//! Access token cache
//!
//! Tokens are cached per (credential id, token name) and reused across
//! calls until they report themselves invalid or are removed.

use std::collections::HashMap;
use std::sync::Arc;

use sealpost_domain::BoxError;
use tokio::sync::RwLock;
use tracing::debug;

use crate::ports::{AccessToken, Credential, SigningPrimitive};

type TokenKey = (String, String);

/// Thread-safe cache of access tokens.
#[derive(Default)]
pub struct TokenStore {
    tokens: RwLock<HashMap<TokenKey, Arc<dyn AccessToken>>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str, credential: &dyn Credential) -> TokenKey {
        (credential.id().to_string(), name.to_string())
    }

    /// Returns the cached token, or fetches it through `primitive` and caches
    /// the result.
    ///
    /// # Errors
    /// Propagates the primitive's fetch error unchanged.
    pub async fn get_or_fetch(
        &self,
        name: &str,
        credential: &dyn Credential,
        primitive: &dyn SigningPrimitive,
    ) -> Result<Option<Arc<dyn AccessToken>>, BoxError> {
        let key = Self::key(name, credential);
        {
            let tokens = self.tokens.read().await;
            if let Some(token) = tokens.get(&key).filter(|token| token.is_valid()) {
                debug!(token = name, credential = credential.id(), "Using cached access token");
                return Ok(Some(Arc::clone(token)));
            }
        }

        let fetched = primitive.fetch_token(name, credential).await?;
        if let Some(token) = &fetched {
            self.tokens.write().await.insert(key, Arc::clone(token));
            debug!(token = name, credential = credential.id(), "Cached access token");
        }
        Ok(fetched)
    }

    /// Drops a cached token. Returns whether one was cached.
    pub async fn remove(&self, name: &str, credential: &dyn Credential) -> bool {
        self.tokens.write().await.remove(&Self::key(name, credential)).is_some()
    }

    pub async fn clear(&self) {
        self.tokens.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }
}
