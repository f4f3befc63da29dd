use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::expiry;
use super::refresh::RefreshClient;
use super::store::TokenStore;
use super::types::{CredentialSet, TokenResponse};
use crate::config::AuthConfig;
use crate::error::{AuthError, Result, StoreError};

/// Outcome of one renewal, shared by every caller that joined it
type Renewal = Shared<BoxFuture<'static, Result<String>>>;

/// Token coordinator
/// Owns the credential cache and serializes renewals: at most one refresh
/// exchange is in flight, and every caller waiting on it gets its outcome.
///
/// Construct once per process and share it (e.g. behind an `Arc`).
pub struct TokenCoordinator {
    store: TokenStore,
    refresher: RefreshClient,
    test_mode: bool,
    pending: Arc<Mutex<Option<Renewal>>>,
}

impl TokenCoordinator {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let store = TokenStore::new(config.token_store_path.clone());
        let refresher = RefreshClient::new(config)?;
        Ok(Self::with_parts(store, refresher, config.test_mode))
    }

    pub fn with_parts(store: TokenStore, refresher: RefreshClient, test_mode: bool) -> Self {
        Self {
            store,
            refresher,
            test_mode,
            pending: Arc::new(Mutex::new(None)),
        }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Get a currently valid access token, renewing it if necessary.
    ///
    /// `Ok(None)` means not authenticated: no record, no access token, or an
    /// expired token with nothing to refresh it with.
    pub async fn get_access_token(&self) -> Result<Option<String>> {
        let Some(set) = self.current().await else {
            tracing::debug!("No stored credentials");
            return Ok(None);
        };

        if !set.has_access_token() {
            return Ok(None);
        }

        if !expiry::needs_renewal(Some(&set)) {
            tracing::debug!("Using cached access token");
            return Ok(Some(set.access_token));
        }

        self.renew().await
    }

    /// Best known access token, with no expiry check and no renewal.
    /// Only for callers that explicitly do not need a fresh token.
    pub async fn peek_access_token(&self) -> Option<String> {
        self.current()
            .await
            .filter(CredentialSet::has_access_token)
            .map(|set| set.access_token)
    }

    /// Mint and persist a synthetic one-hour credential set, bypassing the provider
    pub async fn create_test_tokens(&self) -> std::result::Result<CredentialSet, StoreError> {
        let set = CredentialSet::synthetic(Utc::now().timestamp_millis());
        tracing::info!("Created test tokens (expires_at={:?})", set.expires_at);
        self.save_after_renewal(&set).await?;
        Ok(set)
    }

    /// Exchange an authorization code and persist the resulting credential set
    pub async fn complete_authorization(&self, code: &str, redirect_uri: &str) -> Result<String> {
        if self.test_mode {
            let set = self.create_test_tokens().await?;
            return Ok(set.access_token);
        }

        let response = self.refresher.exchange_code(code, redirect_uri).await?;
        let set = CredentialSet::issued(response, Utc::now().timestamp_millis());
        self.save_after_renewal(&set).await?;

        tracing::info!("Authorization complete, credentials stored");
        Ok(set.access_token)
    }

    /// Raw read of the persisted record, bypassing the cache and renewal
    pub async fn load_token_cache(&self) -> std::result::Result<Option<CredentialSet>, StoreError> {
        self.store.load().await
    }

    /// Raw write of a credential set through the store
    pub async fn save_token_cache(&self, set: &CredentialSet) -> std::result::Result<(), StoreError> {
        self.save_after_renewal(set).await
    }

    /// Persist a replacement credential set once no renewal is in flight, so a
    /// renewal of the previous set cannot land on top of it afterwards.
    async fn save_after_renewal(&self, set: &CredentialSet) -> std::result::Result<(), StoreError> {
        loop {
            let inflight = {
                let pending = self.pending.lock().await;
                match pending.as_ref() {
                    Some(inflight) => inflight.clone(),
                    None => return self.store.save(set).await,
                }
            };

            tracing::debug!("Waiting for in-flight renewal before replacing credentials");
            let _ = inflight.await;
        }
    }

    /// Cache first, then the store. Store read errors count as absence here.
    async fn current(&self) -> Option<CredentialSet> {
        if let Some(set) = self.store.cached().await {
            return Some(set);
        }

        match self.store.load().await {
            Ok(set) => set,
            Err(e) => {
                tracing::warn!("Treating token store failure as unauthenticated: {}", e);
                None
            }
        }
    }

    /// Join the in-flight renewal, or start one
    async fn renew(&self) -> Result<Option<String>> {
        let renewal = {
            let mut pending = self.pending.lock().await;

            match pending.as_ref() {
                Some(inflight) => {
                    tracing::debug!("Joining in-flight token renewal");
                    inflight.clone()
                }
                None => {
                    // A renewal may have finished between the expiry check and the lock
                    let Some(set) = self.current().await else {
                        return Ok(None);
                    };
                    if !expiry::needs_renewal(Some(&set)) {
                        return Ok(Some(set.access_token));
                    }
                    if !self.test_mode && set.usable_refresh_token().is_none() {
                        tracing::warn!("Access token expired and no refresh token is stored");
                        return Ok(None);
                    }

                    let renewal = self.start_renewal(set);
                    *pending = Some(renewal.clone());
                    renewal
                }
            }
        };

        renewal.await.map(Some)
    }

    /// Spawn the exchange so it runs to completion even if every caller goes away.
    /// The task clears the pending slot itself once the outcome is persisted,
    /// whether or not anyone is still waiting on it.
    fn start_renewal(&self, current: CredentialSet) -> Renewal {
        let store = self.store.clone();
        let refresher = self.refresher.clone();
        let test_mode = self.test_mode;
        let slot = Arc::clone(&self.pending);

        let task = tokio::spawn(async move {
            let outcome = AssertUnwindSafe(run_renewal(store, refresher, test_mode, current))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(AuthError::Internal("Token renewal panicked".to_string())));
            // Only one renewal exists at a time, and it was registered before this lock could be taken
            slot.lock().await.take();
            outcome
        });

        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => Err(AuthError::Internal(format!("Token renewal task failed: {}", e))),
            }
        }
        .boxed()
        .shared()
    }
}

async fn run_renewal(
    store: TokenStore,
    refresher: RefreshClient,
    test_mode: bool,
    current: CredentialSet,
) -> Result<String> {
    let response = if test_mode {
        TokenResponse::synthetic(Utc::now().timestamp_millis())
    } else {
        let refresh_token = current.usable_refresh_token().unwrap_or_default();
        match refresher.refresh(refresh_token).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Token refresh failed: {}", e);
                return Err(e);
            }
        }
    };

    let renewed = current.renewed(response, Utc::now().timestamp_millis());

    // Cache stays updated even if the write fails; the next successful save converges the record
    if let Err(e) = store.save(&renewed).await {
        tracing::error!("Renewed token could not be persisted: {}", e);
    }

    tracing::info!(
        "Access token renewed (expires_at={:?})",
        renewed.expires_at
    );
    Ok(renewed.access_token)
}
