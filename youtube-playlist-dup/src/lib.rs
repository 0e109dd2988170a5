//! Duplicate a YouTube playlist, including the implicit "liked videos" playlist, into a new
//! playlist owned by the authenticated user.
//!
//! The pieces, from the bottom up:
//!
//! - [`token_store`] caches the OAuth token on disk.
//! - [`auth`] turns a cached token, or the user's consent in the browser, into an authorized
//!   [`youtube_api::YouTubeClient`].
//! - [`service::PlaylistService`] is what the rest of the crate needs from YouTube.
//! - [`selector`] lets the user pick the source playlist.
//! - [`duplicator`] copies the source's videos into the destination.

pub mod auth;
pub mod browser;
pub mod callback;
pub mod config;
pub mod console;
pub mod duplicator;
pub mod oauth;
pub mod selector;
pub mod service;
pub mod token_store;
pub mod youtube_api;
