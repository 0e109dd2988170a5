//! YouTube Playlists API types.

use crate::service::{PlaylistRef, PrivacyStatus};
use crate::youtube_api::types::PageInfo;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Response structure for the `playlists.list` API call.
///
/// See: <https://developers.google.com/youtube/v3/docs/playlists/list>
#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistListResponse {
    #[serde(default)]
    pub items: VecDeque<Playlist>,
    #[serde(rename = "pageInfo", default, skip_serializing_if = "Option::is_none")]
    pub page_info: Option<PageInfo>,
    /// Token for the next page; absent on the last one.
    #[serde(rename = "nextPageToken", default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// A `playlist` resource.
///
/// See: <https://developers.google.com/youtube/v3/docs/playlists#resource>
#[derive(Debug, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub snippet: PlaylistSnippet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PlaylistStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistSnippet {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistStatus {
    #[serde(rename = "privacyStatus")]
    pub privacy_status: PrivacyStatus,
}

impl From<Playlist> for PlaylistRef {
    fn from(playlist: Playlist) -> Self {
        Self {
            title: playlist.snippet.title,
            id: playlist.id,
        }
    }
}

/// Request body for `playlists.insert` with `part=snippet,status`.
///
/// See: <https://developers.google.com/youtube/v3/docs/playlists/insert>
#[derive(Debug, Serialize)]
pub struct PlaylistInsertRequest<'a> {
    pub snippet: PlaylistInsertSnippet<'a>,
    pub status: PlaylistInsertStatus,
}

#[derive(Debug, Serialize)]
pub struct PlaylistInsertSnippet<'a> {
    pub title: &'a str,
    pub description: &'a str,
}

#[derive(Debug, Serialize)]
pub struct PlaylistInsertStatus {
    #[serde(rename = "privacyStatus")]
    pub privacy_status: PrivacyStatus,
}
