//! YouTube Channels API types.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Response structure for the `channels.list` API call.
///
/// See: <https://developers.google.com/youtube/v3/docs/channels/list>
#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelListResponse {
    /// A list of channels that match the request criteria.
    ///
    /// Omitted entirely by the API when nothing matches.
    #[serde(default)]
    pub items: VecDeque<Channel>,
}

/// A `channel` resource, restricted to the parts this crate requests.
///
/// See: <https://developers.google.com/youtube/v3/docs/channels#resource>
#[derive(Debug, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(rename = "contentDetails")]
    pub content_details: ChannelContentDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelContentDetails {
    #[serde(rename = "relatedPlaylists")]
    pub related_playlists: RelatedPlaylists,
}

/// Playlists YouTube maintains automatically for a channel.
///
/// See: <https://developers.google.com/youtube/v3/docs/channels#contentDetails.relatedPlaylists>
#[derive(Debug, Serialize, Deserialize)]
pub struct RelatedPlaylists {
    /// The videos the channel owner has liked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likes: Option<String>,
    /// The videos uploaded to the channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploads: Option<String>,
}
