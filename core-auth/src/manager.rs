//! # Credential Provider
//!
//! High-level orchestration of credential acquisition: load persisted
//! tokens, silently refresh them, or fall back to the interactive browser
//! consent flow; alternatively run entirely from a service-account key.
//!
//! ## Usage
//!
//! ```no_run
//! use core_auth::{ClientCredentials, CredentialProvider, TokenStore};
//! use bridge_http::ReqwestHttpClient;
//! use std::sync::Arc;
//!
//! # async fn example() -> core_auth::Result<()> {
//! let credentials = ClientCredentials::from_env()?;
//! let token_store = TokenStore::new("token.json");
//! let http_client = Arc::new(ReqwestHttpClient::new());
//!
//! let provider = CredentialProvider::interactive(credentials, token_store, http_client);
//! provider.authorize().await?;
//!
//! let bearer = provider.get_valid_token().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::oauth::{OAuthConfig, OAuthFlowManager};
use crate::redirect::RedirectListener;
use crate::service_account::{ServiceAccountFlow, ServiceAccountKey};
use crate::token_store::TokenStore;
use crate::types::{ClientCredentials, OAuthTokens};
use bridge_http::HttpClient;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, instrument, warn};

/// Default timeout waiting for the browser consent redirect (2 minutes)
const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(120);

/// Buffer time before token expiration that triggers a refresh (5 minutes)
const TOKEN_REFRESH_BUFFER_SECS: i64 = 300;

/// Placeholder redirect URI for refresh-only flows; the token endpoint
/// ignores it for refresh grants.
const REFRESH_REDIRECT_URI: &str = "http://127.0.0.1";

enum AuthMode {
    Interactive {
        credentials: ClientCredentials,
        token_store: TokenStore,
    },
    ServiceAccount {
        flow: ServiceAccountFlow,
    },
}

/// Credential provider orchestrating token acquisition and refresh.
///
/// Obtain one via [`CredentialProvider::interactive`] or
/// [`CredentialProvider::service_account`], call
/// [`authorize`](CredentialProvider::authorize) once at startup, then call
/// [`get_valid_token`](CredentialProvider::get_valid_token) whenever a
/// bearer token is needed; refresh near expiry is transparent.
pub struct CredentialProvider {
    mode: AuthMode,
    http_client: Arc<dyn HttpClient>,
    tokens: RwLock<Option<OAuthTokens>>,
}

impl CredentialProvider {
    /// Create a provider using the interactive installed-app flow with
    /// on-disk token persistence.
    pub fn interactive(
        credentials: ClientCredentials,
        token_store: TokenStore,
        http_client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            mode: AuthMode::Interactive {
                credentials,
                token_store,
            },
            http_client,
            tokens: RwLock::new(None),
        }
    }

    /// Create a provider backed by a service-account key.
    pub fn service_account(key: ServiceAccountKey, http_client: Arc<dyn HttpClient>) -> Self {
        let flow = ServiceAccountFlow::new(key, Arc::clone(&http_client));
        Self {
            mode: AuthMode::ServiceAccount { flow },
            http_client,
            tokens: RwLock::new(None),
        }
    }

    /// Establish an authenticated session.
    ///
    /// Interactive mode: loads the persisted token set, refreshes it when
    /// expired, and only opens the browser when no usable tokens exist.
    /// Service-account mode: mints and exchanges a JWT assertion.
    #[instrument(skip(self))]
    pub async fn authorize(&self) -> Result<()> {
        let tokens = match &self.mode {
            AuthMode::ServiceAccount { flow } => flow.fetch_token().await?,
            AuthMode::Interactive {
                credentials,
                token_store,
            } => {
                self.authorize_interactive(credentials, token_store)
                    .await?
            }
        };

        *self.tokens.write().await = Some(tokens);
        Ok(())
    }

    async fn authorize_interactive(
        &self,
        credentials: &ClientCredentials,
        token_store: &TokenStore,
    ) -> Result<OAuthTokens> {
        let stored = match token_store.retrieve_tokens().await {
            Ok(stored) => stored,
            Err(AuthError::TokenCorrupted(reason)) => {
                warn!(reason = %reason, "Stored tokens were corrupted, re-authenticating");
                None
            }
            Err(e) => return Err(e),
        };

        if let Some(tokens) = stored {
            if !tokens.is_expired_with_buffer(TOKEN_REFRESH_BUFFER_SECS) {
                debug!("Using stored access token");
                return Ok(tokens);
            }

            if let Some(refresh_token) = tokens.refresh_token() {
                info!("Refreshing expired access token");

                let flow = self.flow_manager(credentials, REFRESH_REDIRECT_URI);
                match flow.refresh_access_token(refresh_token).await {
                    Ok(refreshed) => {
                        token_store.store_tokens(&refreshed).await?;
                        return Ok(refreshed);
                    }
                    Err(e) => {
                        warn!(error = %e, "Token refresh failed, launching browser consent");
                    }
                }
            }
        }

        let tokens = self.run_consent_flow(credentials).await?;
        token_store.store_tokens(&tokens).await?;
        Ok(tokens)
    }

    /// Run the browser consent flow: loopback listener, browser launch,
    /// code exchange.
    async fn run_consent_flow(&self, credentials: &ClientCredentials) -> Result<OAuthTokens> {
        let listener = RedirectListener::bind().await?;
        let flow = self.flow_manager(credentials, listener.redirect_uri());

        let (auth_url, verifier) = flow.build_auth_url()?;

        info!(url = %auth_url, "Opening browser for consent (first run or invalid token)");
        open_in_browser(&auth_url);

        let callback = timeout(DEFAULT_AUTH_TIMEOUT, listener.accept())
            .await
            .map_err(|_| AuthError::AuthorizationTimeout)??;

        let tokens = flow
            .exchange_code(&callback.code, &callback.state, &verifier)
            .await?;

        info!("Authorization succeeded");
        Ok(tokens)
    }

    /// Get a currently valid bearer token, refreshing transparently when
    /// the cached one is within the expiry buffer.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotAuthenticated`] before
    /// [`authorize`](CredentialProvider::authorize) has succeeded, and
    /// [`AuthError::TokenRefreshFailed`] when the cached token cannot be
    /// renewed without user interaction.
    pub async fn get_valid_token(&self) -> Result<String> {
        {
            let tokens = self.tokens.read().await;
            match tokens.as_ref() {
                None => return Err(AuthError::NotAuthenticated),
                Some(tokens) if !tokens.is_expired_with_buffer(TOKEN_REFRESH_BUFFER_SECS) => {
                    return Ok(tokens.access_token().to_string());
                }
                Some(_) => {}
            }
        }

        let mut guard = self.tokens.write().await;

        // Another task may have refreshed while we waited for the lock
        if let Some(tokens) = guard.as_ref() {
            if !tokens.is_expired_with_buffer(TOKEN_REFRESH_BUFFER_SECS) {
                return Ok(tokens.access_token().to_string());
            }
        }

        let current = guard.as_ref().ok_or(AuthError::NotAuthenticated)?;

        let refreshed = match &self.mode {
            AuthMode::ServiceAccount { flow } => flow.fetch_token().await?,
            AuthMode::Interactive {
                credentials,
                token_store,
            } => {
                let refresh_token = current.refresh_token().ok_or_else(|| {
                    AuthError::TokenRefreshFailed(
                        "No refresh token available; delete the token file and re-run to consent"
                            .to_string(),
                    )
                })?;

                let flow = self.flow_manager(credentials, REFRESH_REDIRECT_URI);
                let refreshed = flow.refresh_access_token(refresh_token).await?;
                token_store.store_tokens(&refreshed).await?;
                refreshed
            }
        };

        let access_token = refreshed.access_token().to_string();
        *guard = Some(refreshed);

        Ok(access_token)
    }

    /// Forget the current session and delete persisted tokens.
    pub async fn sign_out(&self) -> Result<()> {
        *self.tokens.write().await = None;

        if let AuthMode::Interactive { token_store, .. } = &self.mode {
            token_store.delete_tokens().await?;
        }

        info!("Signed out");
        Ok(())
    }

    /// Expiration timestamp of the current token set, if authenticated.
    pub async fn expires_at(&self) -> Option<i64> {
        self.tokens.read().await.as_ref().map(|t| t.expires_at())
    }

    fn flow_manager(
        &self,
        credentials: &ClientCredentials,
        redirect_uri: impl Into<String>,
    ) -> OAuthFlowManager {
        OAuthFlowManager::new(
            OAuthConfig::google(credentials, redirect_uri),
            Arc::clone(&self.http_client),
        )
    }
}

/// Best-effort launch of the system browser; the consent URL is also
/// logged so the user can open it manually.
fn open_in_browser(url: &str) {
    #[cfg(target_os = "macos")]
    let result = tokio::process::Command::new("open").arg(url).spawn();

    #[cfg(target_os = "windows")]
    let result = tokio::process::Command::new("cmd")
        .args(["/C", "start", "", url])
        .spawn();

    #[cfg(all(unix, not(target_os = "macos")))]
    let result = tokio::process::Command::new("xdg-open").arg(url).spawn();

    if let Err(e) = result {
        warn!(error = %e, "Could not launch browser; open the logged URL manually");
    }
}
