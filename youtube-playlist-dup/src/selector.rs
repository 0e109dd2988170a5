//! Interactive choice of the playlist to duplicate.

use crate::service::{PlaylistRef, PlaylistService, all_my_playlists};
use eyre::Context;
use std::io::{BufRead, Write};
use tokio_stream::StreamExt;

/// Menu label of the liked-videos playlist, which has no title of its own.
pub const LIKED_VIDEOS_LABEL: &str = "Liked videos";

#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("selection {choice} is out of range (expected 1 to {len})")]
    OutOfRange { choice: i64, len: usize },
    #[error("{input:?} is not a number")]
    InvalidNumber {
        input: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("console I/O failed while selecting a playlist")]
    Io(#[source] std::io::Error),
    #[error("no selection entered")]
    NoInput,
}

/// Every playlist the user can copy from, in menu order.
///
/// The liked-videos playlist always comes first, followed by the user's own playlists in the
/// order the service returned them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistMenu {
    entries: Vec<PlaylistRef>,
}

impl PlaylistMenu {
    /// Fetches the liked-videos playlist and every page of the user's playlists.
    pub async fn fetch<S>(service: &S) -> eyre::Result<Self>
    where
        S: PlaylistService + Sync,
    {
        let liked = service
            .liked_videos_playlist_id()
            .await
            .context("look up liked videos playlist")?;
        let mut entries = vec![PlaylistRef {
            title: LIKED_VIDEOS_LABEL.to_string(),
            id: liked,
        }];

        let mut playlists = std::pin::pin!(all_my_playlists(service));
        while let Some(playlist) = playlists.next().await {
            entries.push(playlist.context("list playlists")?);
        }
        tracing::debug!(count = entries.len(), "built playlist menu");

        Ok(Self { entries })
    }

    pub fn from_entries(entries: Vec<PlaylistRef>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PlaylistRef] {
        &self.entries
    }

    /// Writes the numbered menu, one line per entry, numbering from 1.
    pub fn render(&self, out: &mut impl Write) -> std::io::Result<()> {
        writeln!(out, "\nSelect the playlist to duplicate:")?;
        for (i, entry) in self.entries.iter().enumerate() {
            writeln!(out, "{:2}) {}", i + 1, entry.title)?;
        }
        Ok(())
    }

    /// Maps a 1-based menu number to its entry.
    pub fn resolve(&self, choice: i64) -> Result<&PlaylistRef, SelectionError> {
        let out_of_range = || SelectionError::OutOfRange {
            choice,
            len: self.entries.len(),
        };
        let index = usize::try_from(choice)
            .ok()
            .and_then(|n| n.checked_sub(1))
            .ok_or_else(out_of_range)?;
        self.entries.get(index).ok_or_else(out_of_range)
    }

    /// Shows the menu on `out` and reads a single number from `input`.
    ///
    /// There is no second chance: unparseable or out-of-range input is an error.
    pub fn prompt(
        &self,
        input: &mut impl BufRead,
        out: &mut impl Write,
    ) -> Result<&PlaylistRef, SelectionError> {
        self.render(out).map_err(SelectionError::Io)?;
        write!(out, "Number: ").map_err(SelectionError::Io)?;
        out.flush().map_err(SelectionError::Io)?;

        let mut line = String::new();
        if input.read_line(&mut line).map_err(SelectionError::Io)? == 0 {
            return Err(SelectionError::NoInput);
        }
        let line = line.trim();
        if line.is_empty() {
            return Err(SelectionError::NoInput);
        }
        let choice: i64 = line.parse().map_err(|source| SelectionError::InvalidNumber {
            input: line.to_string(),
            source,
        })?;

        let selected = self.resolve(choice)?;
        writeln!(out, "Selected {:?} (ID: {})\n", selected.title, selected.id)
            .map_err(SelectionError::Io)?;
        Ok(selected)
    }
}

/// Builds the menu, asks the user, and returns the chosen playlist.
pub async fn select<S>(
    service: &S,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> eyre::Result<PlaylistRef>
where
    S: PlaylistService + Sync,
{
    let menu = PlaylistMenu::fetch(service).await?;
    let selected = menu.prompt(input, out)?;
    Ok(selected.clone())
}
