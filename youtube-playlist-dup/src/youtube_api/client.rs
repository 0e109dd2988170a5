//! Core YouTube API client functionality and authentication management.

use crate::oauth::OAuthManager;
use crate::service::{NewPlaylist, Page, PlaylistItemRef, PlaylistRef, PlaylistService};
use crate::token_store::{REFRESH_MARGIN, StoredToken, TokenStore};
use crate::youtube_api::{
    channels::ChannelListResponse,
    playlist_items::{PlaylistItem, PlaylistItemInsertRequest, PlaylistItemListResponse},
    playlists::{
        Playlist, PlaylistInsertRequest, PlaylistInsertSnippet, PlaylistInsertStatus,
        PlaylistListResponse,
    },
};
use eyre::Context;
use http::Method;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::instrument;

pub const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Largest page size the list endpoints accept.
const MAX_RESULTS: &str = "50";

/// An access token that knows when it needs renewing.
#[derive(Debug, Clone)]
pub struct TimeBoundAccessToken {
    token: StoredToken,
}

impl TimeBoundAccessToken {
    pub fn new(token: StoredToken) -> Self {
        Self { token }
    }

    pub fn stored(&self) -> &StoredToken {
        &self.token
    }

    pub fn needs_refresh(&self) -> bool {
        self.token.expires_within(REFRESH_MARGIN)
    }

    /// Refreshes this token, preserving the refresh token if the provider does not send a new
    /// one.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Token was successfully refreshed
    /// * `Ok(false)` - Refresh failed (invalid grant, no refresh token)
    /// * `Err(_)` - Network or other error occurred
    pub async fn refresh(&mut self, oauth_manager: &OAuthManager) -> eyre::Result<bool> {
        let Some(refresh_token) = self.token.refresh_token.clone() else {
            tracing::warn!("no refresh token available, cannot refresh");
            return Ok(false);
        };

        match oauth_manager
            .refresh_token(&refresh_token)
            .await
            .context("refresh OAuth token")?
        {
            Some(response) => {
                let mut fresh = StoredToken::from_response(&response);
                if fresh.refresh_token.is_none() {
                    tracing::trace!("new token lacks refresh token, preserving original");
                    fresh.refresh_token = Some(refresh_token);
                }
                self.token = fresh;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Client for the YouTube Data API v3.
///
/// Expired access tokens are refreshed automatically before a request is sent, and every
/// refreshed token is written back to the [`TokenStore`] (if one is attached) so the cache on
/// disk always holds the latest credentials.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    token: Arc<Mutex<TimeBoundAccessToken>>,
    oauth_manager: Arc<OAuthManager>,
    store: Option<TokenStore>,
    client: reqwest::Client,
    api_base: String,
}

impl YouTubeClient {
    pub fn new(token: StoredToken, oauth_manager: Arc<OAuthManager>) -> Self {
        Self {
            token: Arc::new(Mutex::new(TimeBoundAccessToken::new(token))),
            oauth_manager,
            store: None,
            client: reqwest::Client::new(),
            api_base: API_BASE.to_string(),
        }
    }

    /// Persist refreshed tokens to `store`.
    pub fn with_token_store(mut self, store: TokenStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Returns a copy of the current token.
    pub async fn token(&self) -> StoredToken {
        self.token.lock().await.stored().clone()
    }

    /// Gets a guaranteed-fresh access token, refreshing if necessary.
    #[instrument(skip(self), level = tracing::Level::TRACE)]
    async fn fresh_access_token(&self) -> eyre::Result<String> {
        let mut token = self.token.lock().await;

        if token.needs_refresh() {
            tracing::debug!("access token expired, attempting refresh");

            if token.refresh(&self.oauth_manager).await? {
                tracing::debug!("access token successfully refreshed");
                if let Some(store) = &self.store {
                    if let Err(e) = store.save(token.stored()) {
                        tracing::warn!("could not persist refreshed token: {e}");
                    }
                }
            } else {
                tracing::error!("access token refresh failed, client is unusable");
                eyre::bail!(
                    "unable to refresh expired access token; delete the cached token and \
                     authorize again"
                );
            }
        }

        Ok(token.stored().access_token.clone())
    }

    /// Makes an authenticated request to the YouTube API.
    ///
    /// Non-2xx responses are turned into errors that carry the response body verbatim, so
    /// quota and permission problems reach the user as YouTube reported them.
    #[instrument(skip(self, json_body), level = tracing::Level::TRACE)]
    async fn make_authenticated_request(
        &self,
        method: Method,
        endpoint: &str,
        query_params: &[(&str, &str)],
        json_body: Option<&impl Serialize>,
    ) -> eyre::Result<reqwest::Response> {
        let access_token = self.fresh_access_token().await?;
        let url = format!("{}/{}", self.api_base, endpoint);

        let mut request = self
            .client
            .request(method.clone(), &url)
            .bearer_auth(access_token)
            .query(query_params);

        if let Some(body) = json_body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("send {method} request to YouTube API: {url}"))?;

        let status_code = response.status();
        if !status_code.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            eyre::bail!(
                "YouTube API {method} {endpoint} failed with status {status_code}: {error_text}"
            );
        }

        Ok(response)
    }

    async fn list_playlists_page(
        &self,
        page_token: Option<&str>,
    ) -> eyre::Result<PlaylistListResponse> {
        let mut query = vec![
            ("part", "snippet"),
            ("mine", "true"),
            ("maxResults", MAX_RESULTS),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }
        self.make_authenticated_request(Method::GET, "playlists", &query, None::<&()>)
            .await?
            .json()
            .await
            .context("parse playlists.list response")
    }

    async fn list_playlist_items_page(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
    ) -> eyre::Result<PlaylistItemListResponse> {
        let mut query = vec![
            ("part", "snippet"),
            ("playlistId", playlist_id),
            ("maxResults", MAX_RESULTS),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }
        self.make_authenticated_request(Method::GET, "playlistItems", &query, None::<&()>)
            .await?
            .json()
            .await
            .context("parse playlistItems.list response")
    }
}

impl PlaylistService for YouTubeClient {
    /// Looks up the liked-videos playlist via `channels.list` with `mine=true`.
    #[instrument(skip(self))]
    async fn liked_videos_playlist_id(&self) -> eyre::Result<String> {
        let response: ChannelListResponse = self
            .make_authenticated_request(
                Method::GET,
                "channels",
                &[("part", "contentDetails"), ("mine", "true")],
                None::<&()>,
            )
            .await?
            .json()
            .await
            .context("parse channels.list response")?;

        let channel = response
            .items
            .into_iter()
            .next()
            .ok_or_else(|| eyre::eyre!("the authenticated account has no YouTube channel"))?;
        channel
            .content_details
            .related_playlists
            .likes
            .filter(|id| !id.is_empty())
            .ok_or_else(|| eyre::eyre!("channel {} exposes no liked-videos playlist", channel.id))
    }

    #[instrument(skip(self))]
    async fn list_my_playlists(
        &self,
        page_token: Option<String>,
    ) -> eyre::Result<Page<PlaylistRef>> {
        let response = self.list_playlists_page(page_token.as_deref()).await?;
        Ok(Page {
            items: response.items.into_iter().map(PlaylistRef::from).collect(),
            next_page_token: response.next_page_token,
        })
    }

    #[instrument(skip(self), ret)]
    async fn create_playlist(&self, playlist: &NewPlaylist) -> eyre::Result<PlaylistRef> {
        let body = PlaylistInsertRequest {
            snippet: PlaylistInsertSnippet {
                title: &playlist.title,
                description: &playlist.description,
            },
            status: PlaylistInsertStatus {
                privacy_status: playlist.privacy,
            },
        };
        let created: Playlist = self
            .make_authenticated_request(
                Method::POST,
                "playlists",
                &[("part", "snippet,status")],
                Some(&body),
            )
            .await?
            .json()
            .await
            .context("parse playlists.insert response")?;

        tracing::debug!(playlist_id = %created.id, "created playlist");
        Ok(created.into())
    }

    #[instrument(skip(self))]
    async fn list_playlist_items(
        &self,
        playlist_id: &str,
        page_token: Option<String>,
    ) -> eyre::Result<Page<PlaylistItemRef>> {
        let response = self
            .list_playlist_items_page(playlist_id, page_token.as_deref())
            .await?;
        let mut items = std::collections::VecDeque::with_capacity(response.items.len());
        for item in response.items {
            let item_id = item.id.clone();
            match PlaylistItem::into_video_ref(item) {
                Some(video) => items.push_back(video),
                None => tracing::warn!(%item_id, "skipping playlist entry that is not a video"),
            }
        }
        Ok(Page {
            items,
            next_page_token: response.next_page_token,
        })
    }

    #[instrument(skip(self))]
    async fn insert_playlist_item(&self, playlist_id: &str, video_id: &str) -> eyre::Result<()> {
        let body = PlaylistItemInsertRequest::video(playlist_id, video_id);
        self.make_authenticated_request(
            Method::POST,
            "playlistItems",
            &[("part", "snippet")],
            Some(&body),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::PrivacyStatus;
    use jiff::{SignedDuration, Timestamp};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio_stream::StreamExt;
    use wiremock::matchers::{
        body_json, body_string_contains, header, method, path, query_param, query_param_is_missing,
    };
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token(access: &str, valid_for_secs: i64) -> StoredToken {
        StoredToken {
            access_token: access.to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: Some("rt".to_string()),
            expiry: Timestamp::now()
                .checked_add(SignedDuration::from_secs(valid_for_secs))
                .unwrap(),
        }
    }

    fn client(server: &MockServer, token: StoredToken) -> YouTubeClient {
        let oauth = OAuthManager::new("id", "secret").with_endpoints(
            crate::oauth::AUTH_URL,
            format!("{}/token", server.uri()),
        );
        YouTubeClient::new(token, Arc::new(oauth)).with_api_base(server.uri())
    }

    #[tokio::test]
    async fn liked_videos_comes_from_related_playlists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/channels"))
            .and(query_param("mine", "true"))
            .and(query_param("part", "contentDetails"))
            .and(header("authorization", "Bearer at"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{
                    "id": "UC123",
                    "contentDetails": {"relatedPlaylists": {"likes": "LL", "uploads": "UU123"}}
                }]
            })))
            .mount(&server)
            .await;

        let yt = client(&server, token("at", 3600));
        assert_eq!(yt.liked_videos_playlist_id().await.unwrap(), "LL");
    }

    #[tokio::test]
    async fn account_without_channel_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/channels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;

        let yt = client(&server, token("at", 3600));
        let err = yt.liked_videos_playlist_id().await.unwrap_err();
        assert!(err.to_string().contains("no YouTube channel"));
    }

    #[tokio::test]
    async fn lists_playlist_items_with_page_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlistItems"))
            .and(query_param("playlistId", "PLsrc"))
            .and(query_param("pageToken", "CAIQAA"))
            .and(query_param("maxResults", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"id": "a", "snippet": {"title": "One", "resourceId": {"kind": "youtube#video", "videoId": "v1"}}},
                    {"id": "b", "snippet": {"title": "Two", "resourceId": {"kind": "youtube#video", "videoId": "v2"}}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let yt = client(&server, token("at", 3600));
        let page = yt
            .list_playlist_items("PLsrc", Some("CAIQAA".to_string()))
            .await
            .unwrap();
        let ids: Vec<_> = page.items.iter().map(|i| i.video_id.as_str()).collect();
        assert_eq!(ids, vec!["v1", "v2"]);
        assert_eq!(page.next_cursor(), None);
    }

    #[tokio::test]
    async fn streams_all_playlists_across_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlists"))
            .and(query_param("pageToken", "P2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"id": "PL3", "snippet": {"title": "Three"}}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/playlists"))
            .and(query_param("mine", "true"))
            .and(query_param_is_missing("pageToken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "nextPageToken": "P2",
                "items": [
                    {"id": "PL1", "snippet": {"title": "One"}},
                    {"id": "PL2", "snippet": {"title": "Two"}}
                ]
            })))
            .mount(&server)
            .await;

        let yt = client(&server, token("at", 3600));
        let all: Vec<PlaylistRef> = crate::service::all_my_playlists(&yt)
            .map(|r| r.unwrap())
            .collect()
            .await;
        let ids: Vec<_> = all.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["PL1", "PL2", "PL3"]);
    }

    #[tokio::test]
    async fn creates_private_playlist() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/playlists"))
            .and(query_param("part", "snippet,status"))
            .and(body_json(json!({
                "snippet": {"title": "Copy", "description": "Duplicate of \"Src\""},
                "status": {"privacyStatus": "private"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "PLnew",
                "snippet": {"title": "Copy"},
                "status": {"privacyStatus": "private"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let yt = client(&server, token("at", 3600));
        let created = yt
            .create_playlist(&NewPlaylist {
                title: "Copy".to_string(),
                description: "Duplicate of \"Src\"".to_string(),
                privacy: PrivacyStatus::Private,
            })
            .await
            .unwrap();
        assert_eq!(created.id, "PLnew");
    }

    #[tokio::test]
    async fn insert_error_surfaces_api_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/playlistItems"))
            .and(body_string_contains("\"videoId\":\"gone\""))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_string(r#"{"error":{"message":"Video not found."}}"#),
            )
            .mount(&server)
            .await;

        let yt = client(&server, token("at", 3600));
        let err = yt.insert_playlist_item("PLdest", "gone").await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("404"), "{msg}");
        assert!(msg.contains("Video not found."), "{msg}");
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_persisted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("refresh_token=rt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/playlistItems"))
            .and(header("authorization", "Bearer fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "x"})))
            .expect(2)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        let yt = client(&server, token("stale", -60)).with_token_store(store.clone());

        yt.insert_playlist_item("PL", "v1").await.unwrap();
        // second call reuses the refreshed token
        yt.insert_playlist_item("PL", "v2").await.unwrap();

        let saved = store.load().unwrap();
        assert_eq!(saved.access_token, "fresh");
        // provider did not send a new refresh token, so the old one is kept
        assert_eq!(saved.refresh_token.as_deref(), Some("rt"));
        assert_eq!(yt.token().await, saved);
    }

    #[tokio::test]
    async fn revoked_refresh_token_fails_the_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})),
            )
            .mount(&server)
            .await;

        let yt = client(&server, token("stale", -60));
        let err = yt.list_my_playlists(None).await.unwrap_err();
        assert!(err.to_string().contains("unable to refresh"));
    }
}
