//! The remote operations playlist duplication needs, independent of how they are performed.

use crate::youtube_api::PagedStream;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use tokio_stream::Stream;

/// A playlist as shown in the selection menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistRef {
    pub title: String,
    pub id: String,
}

/// One video entry of a source playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistItemRef {
    pub video_id: String,
    /// Only used for diagnostics.
    pub title: Option<String>,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: VecDeque<T>,
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    /// The cursor for the following page, if there is one.
    ///
    /// An empty token means the same as an absent one.
    pub fn next_cursor(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn into_parts(self) -> (VecDeque<T>, Option<String>) {
        let next = self.next_page_token.filter(|t| !t.is_empty());
        (self.items, next)
    }
}

/// Who can see a playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrivacyStatus {
    Private,
    Public,
    Unlisted,
}

/// Parameters for a playlist to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlaylist {
    pub title: String,
    pub description: String,
    pub privacy: PrivacyStatus,
}

/// The video service operations used by the selector and the duplicator.
///
/// Page tokens are opaque; `None` requests the first page.
pub trait PlaylistService {
    /// Id of the authenticated user's "liked videos" playlist.
    fn liked_videos_playlist_id(&self) -> impl Future<Output = eyre::Result<String>> + Send;

    fn list_my_playlists(
        &self,
        page_token: Option<String>,
    ) -> impl Future<Output = eyre::Result<Page<PlaylistRef>>> + Send;

    fn create_playlist(
        &self,
        playlist: &NewPlaylist,
    ) -> impl Future<Output = eyre::Result<PlaylistRef>> + Send;

    fn list_playlist_items(
        &self,
        playlist_id: &str,
        page_token: Option<String>,
    ) -> impl Future<Output = eyre::Result<Page<PlaylistItemRef>>> + Send;

    fn insert_playlist_item(
        &self,
        playlist_id: &str,
        video_id: &str,
    ) -> impl Future<Output = eyre::Result<()>> + Send;
}

/// Every playlist owned by the authenticated user, fetched page by page as the stream is polled.
pub fn all_my_playlists<S>(service: &S) -> impl Stream<Item = eyre::Result<PlaylistRef>>
where
    S: PlaylistService + Sync,
{
    PagedStream::new(move |page_token| async move {
        service.list_my_playlists(page_token).await.map(Page::into_parts)
    })
}
