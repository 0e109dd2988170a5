//! Getting an authorized YouTube client, either from the token cache or by asking the user.
//!
//! ```text
//! cached token ──────────────────────────────────────────────► Authorized
//! no token ─► awaiting consent ─► exchanging code ─► (save) ─► Authorized
//! ```
//!
//! The consent step starts a [`CallbackListener`] on the configured loopback address, sends the
//! user to the provider's consent page, and blocks (bounded by the consent timeout) until the
//! redirect delivers an authorization code. The listener is always stopped before the code is
//! exchanged.

use crate::browser::Browser;
use crate::callback::CallbackListener;
use crate::oauth::OAuthManager;
use crate::token_store::{StoredToken, TokenStore, TokenStoreError};
use crate::youtube_api::YouTubeClient;
use eyre::Context;
use oauth2::{CsrfToken, PkceCodeChallenge};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

pub use crate::callback::AuthError;

/// How long the listener gets to finish in-flight responses once a code has arrived.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const OAUTH_DONE: &str = include_str!("../oauth_success.html");

/// One authorization attempt.
///
/// Owns everything it needs (credentials, token cache, browser capability); two flows share no
/// state.
pub struct AuthorizationFlow<B> {
    oauth: Arc<OAuthManager>,
    store: TokenStore,
    browser: B,
    callback_addr: SocketAddr,
    callback_path: String,
    consent_timeout: Duration,
    shutdown_grace: Duration,
}

impl<B: Browser> AuthorizationFlow<B> {
    pub fn new(
        oauth: Arc<OAuthManager>,
        store: TokenStore,
        browser: B,
        callback_addr: SocketAddr,
        callback_path: impl Into<String>,
        consent_timeout: Duration,
    ) -> Self {
        Self {
            oauth,
            store,
            browser,
            callback_addr,
            callback_path: callback_path.into(),
            consent_timeout,
            shutdown_grace: SHUTDOWN_GRACE,
        }
    }

    /// Produces a client that refreshes and persists its token on its own.
    pub async fn client(&self) -> eyre::Result<YouTubeClient> {
        let token = self.authorize().await?;
        Ok(YouTubeClient::new(token, Arc::clone(&self.oauth)).with_token_store(self.store.clone()))
    }

    /// Returns a usable token, going through user consent only if the cache has none.
    pub async fn authorize(&self) -> eyre::Result<StoredToken> {
        match self.store.load() {
            Ok(token) if token.is_usable() => {
                tracing::debug!(path = %self.store.path().display(), "using cached OAuth token");
                return Ok(token);
            }
            Ok(_) => {
                tracing::info!("cached OAuth token expired and cannot be refreshed");
            }
            Err(TokenStoreError::NotFound { .. }) => {
                tracing::info!("no cached OAuth token, user authorization required");
            }
            Err(e) => {
                tracing::warn!("discarding unusable cached OAuth token: {e}");
            }
        }

        let token = self.obtain_consent().await?;
        self.store
            .save(&token)
            .context("save OAuth token to the token cache")?;
        Ok(token)
    }

    async fn obtain_consent(&self) -> eyre::Result<StoredToken> {
        let csrf = CsrfToken::new_random();
        let mut listener = CallbackListener::bind(
            self.callback_addr,
            &self.callback_path,
            csrf.clone(),
            OAUTH_DONE,
        )
        .await
        .with_context(|| format!("bind OAuth callback listener on {}", self.callback_addr))?;
        let redirect_url = listener.redirect_url().clone();

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let auth_url = self
            .oauth
            .authorize_url(redirect_url.clone(), csrf, pkce_challenge)
            .context("build consent URL")?;

        tracing::info!(url = %auth_url, "asking user to follow OAuth flow");
        println!("Authorize this application by visiting:\n\n    {auth_url}\n");
        if let Err(e) = self.browser.open(auth_url.as_str()) {
            tracing::warn!("could not open a browser ({e}); open the URL above manually");
        }

        let outcome = listener.wait_for_code(self.consent_timeout).await;
        listener.shutdown(self.shutdown_grace).await;
        let code = outcome?;

        let response = self
            .oauth
            .exchange_code(redirect_url, code, pkce_verifier)
            .await?;
        tracing::info!("user authorization complete");
        Ok(StoredToken::from_response(&response))
    }
}
