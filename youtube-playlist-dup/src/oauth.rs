//! OAuth 2.0 client operations against Google's authorization server.
//!
//! [`OAuthManager`] knows the client credentials and the provider endpoints. It builds the
//! consent URL, exchanges authorization codes, and refreshes access tokens. It does not talk to
//! the user or listen for redirects; see [`crate::auth`] for that.

use eyre::Context;
use oauth2::basic::{BasicClient, BasicErrorResponseType, BasicTokenResponse};
use oauth2::url::Url;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, RefreshToken, Scope, TokenUrl, reqwest,
};

pub const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Google OAuth2 token endpoint used for both the code exchange and token refresh.
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Full read/write access to the user's YouTube account; playlist creation needs it.
pub const YOUTUBE_SCOPE: &str = "https://www.googleapis.com/auth/youtube";

/// Holds OAuth client configuration and performs the token endpoint round-trips.
#[derive(Debug, Clone)]
pub struct OAuthManager {
    client_id: String,
    client_secret: String,
    auth_url: String,
    token_url: String,
    http: reqwest::Client,
}

impl OAuthManager {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        let http = reqwest::ClientBuilder::new()
            // SSRF no thank you.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("building reqwest client should not fail");
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_url: AUTH_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            http,
        }
    }

    /// Points the manager at different provider endpoints.
    pub fn with_endpoints(
        mut self,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        self.auth_url = auth_url.into();
        self.token_url = token_url.into();
        self
    }

    /// Builds the URL of the provider's consent page.
    ///
    /// Requests offline access so that the token response carries a refresh token.
    pub fn authorize_url(
        &self,
        redirect_url: RedirectUrl,
        csrf: CsrfToken,
        pkce_challenge: PkceCodeChallenge,
    ) -> eyre::Result<Url> {
        let auth_url = AuthUrl::new(self.auth_url.clone()).context("parse authorization URL")?;
        let client = BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_auth_uri(auth_url)
            .set_redirect_uri(redirect_url);

        let (url, _csrf) = client
            // We never re-use the CSRF since we only go through the flow exactly once.
            .authorize_url(move || csrf)
            .add_scope(Scope::new(YOUTUBE_SCOPE.to_string()))
            .add_extra_param("access_type", "offline")
            .set_pkce_challenge(pkce_challenge)
            .url();
        Ok(url)
    }

    /// Trades an authorization code for an access (and refresh) token.
    ///
    /// `redirect_url` must be the same one the consent URL was built with.
    #[tracing::instrument(skip_all)]
    pub async fn exchange_code(
        &self,
        redirect_url: RedirectUrl,
        code: AuthorizationCode,
        pkce_verifier: PkceCodeVerifier,
    ) -> eyre::Result<BasicTokenResponse> {
        let token_url = TokenUrl::new(self.token_url.clone()).context("parse token URL")?;
        let client = BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        let token = client
            .exchange_code(code)
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http)
            .await
            .context("exchange authorization code with access token")?;
        tracing::debug!("obtained OAuth token from authorization code");
        Ok(token)
    }

    /// Attempts to obtain a new access token from a refresh token.
    ///
    /// Returns `Ok(None)` if the provider rejects the refresh token as an invalid grant (revoked
    /// or expired), meaning the user has to go through consent again.
    #[tracing::instrument(skip_all)]
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> eyre::Result<Option<BasicTokenResponse>> {
        tracing::debug!("attempting to refresh OAuth token");

        // no redirect URL needed for refresh
        let token_url = TokenUrl::new(self.token_url.clone()).context("parse token URL")?;
        let client = BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_token_uri(token_url);

        let refresh_token = RefreshToken::new(refresh_token.to_string());
        match client
            .exchange_refresh_token(&refresh_token)
            .request_async(&self.http)
            .await
        {
            Ok(new_token) => {
                tracing::debug!("successfully refreshed OAuth token");
                Ok(Some(new_token))
            }
            Err(ref e @ oauth2::RequestTokenError::ServerResponse(ref sr))
                if matches!(sr.error(), BasicErrorResponseType::InvalidGrant) =>
            {
                tracing::warn!("OAuth refresh token considered invalid grant: {}", e);
                Ok(None)
            }
            Err(e) => Err(e).context("exchange refresh token"),
        }
    }
}
