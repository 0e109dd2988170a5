//! YouTube Data API v3 client.
//!
//! Only the endpoints needed to copy playlists are covered:
//!
//! - `channels.list` (`mine=true`) to find the liked-videos playlist
//! - `playlists.list` (`mine=true`) and `playlists.insert`
//! - `playlistItems.list` and `playlistItems.insert`
//!
//! [`YouTubeClient`] implements [`crate::service::PlaylistService`] on top of these.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio_stream::StreamExt;
//! use youtube_playlist_dup::oauth::OAuthManager;
//! use youtube_playlist_dup::service::all_my_playlists;
//! use youtube_playlist_dup::token_store::TokenStore;
//! use youtube_playlist_dup::youtube_api::YouTubeClient;
//!
//! # async fn example() -> eyre::Result<()> {
//! let oauth_manager = Arc::new(OAuthManager::new("client-id", "client-secret"));
//! let store = TokenStore::new("/home/me/.youtube_token.json");
//! let client = YouTubeClient::new(store.load()?, oauth_manager).with_token_store(store);
//!
//! let mut playlists = std::pin::pin!(all_my_playlists(&client));
//! while let Some(playlist) = playlists.next().await {
//!     let playlist = playlist?;
//!     println!("{} ({})", playlist.title, playlist.id);
//! }
//! # Ok(())
//! # }
//! ```

pub mod channels;
pub mod client;
pub mod playlist_items;
pub mod playlists;
pub mod types;

pub use client::{TimeBoundAccessToken, YouTubeClient};
pub use types::{PageInfo, PagedStream};
