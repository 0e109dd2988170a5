//! YouTube PlaylistItems API types.

use crate::service::PlaylistItemRef;
use crate::youtube_api::types::{PageInfo, ResourceId, VIDEO_KIND};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Response structure for the `playlistItems.list` API call.
///
/// See: <https://developers.google.com/youtube/v3/docs/playlistItems/list>
#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistItemListResponse {
    #[serde(default)]
    pub items: VecDeque<PlaylistItem>,
    #[serde(rename = "pageInfo", default, skip_serializing_if = "Option::is_none")]
    pub page_info: Option<PageInfo>,
    #[serde(rename = "nextPageToken", default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// A `playlistItem` resource: one entry of a playlist.
///
/// See: <https://developers.google.com/youtube/v3/docs/playlistItems#resource>
#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub id: String,
    pub snippet: PlaylistItemSnippet,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistItemSnippet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "resourceId")]
    pub resource_id: ResourceId,
}

impl PlaylistItem {
    /// The video this entry refers to, or `None` for entries that are not videos.
    pub fn into_video_ref(self) -> Option<PlaylistItemRef> {
        let PlaylistItemSnippet { title, resource_id } = self.snippet;
        if resource_id.kind != VIDEO_KIND {
            return None;
        }
        Some(PlaylistItemRef {
            video_id: resource_id.video_id?,
            title,
        })
    }
}

/// Request body for `playlistItems.insert` with `part=snippet`.
///
/// See: <https://developers.google.com/youtube/v3/docs/playlistItems/insert>
#[derive(Debug, Serialize)]
pub struct PlaylistItemInsertRequest<'a> {
    pub snippet: PlaylistItemInsertSnippet<'a>,
}

#[derive(Debug, Serialize)]
pub struct PlaylistItemInsertSnippet<'a> {
    #[serde(rename = "playlistId")]
    pub playlist_id: &'a str,
    #[serde(rename = "resourceId")]
    pub resource_id: ResourceId,
}

impl<'a> PlaylistItemInsertRequest<'a> {
    pub fn video(playlist_id: &'a str, video_id: &str) -> Self {
        Self {
            snippet: PlaylistItemInsertSnippet {
                playlist_id,
                resource_id: ResourceId {
                    kind: VIDEO_KIND.to_string(),
                    video_id: Some(video_id.to_string()),
                },
            },
        }
    }
}
