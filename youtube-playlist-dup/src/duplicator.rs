//! Copying every video of one playlist into another.

use crate::service::PlaylistService;
use eyre::Context;

/// A video that could not be added to the destination playlist.
#[derive(Debug)]
pub struct FailedInsert {
    pub video_id: String,
    pub error: eyre::Report,
}

/// The result of a copy that ran through every page of the source.
#[derive(Debug, Default)]
pub struct DuplicationReport {
    /// Source pages fetched.
    pub pages: usize,
    /// Videos successfully inserted into the destination.
    pub copied: usize,
    pub failures: Vec<FailedInsert>,
}

impl DuplicationReport {
    /// Number of source videos visited.
    pub fn attempted(&self) -> usize {
        self.copied + self.failures.len()
    }
}

/// Copies all videos of `source_id` into `destination_id`, page by page, in source order.
///
/// A failed insert is logged, recorded in the report, and skipped; the copy carries on with
/// the next video. A failed page fetch aborts the whole copy. Inserts are strictly sequential
/// so the destination ends up in the same order as the source.
///
/// Nothing about progress is persisted: running this again after a failure starts from the
/// first page and may add videos to the destination a second time.
#[tracing::instrument(skip(service))]
pub async fn duplicate<S>(
    service: &S,
    source_id: &str,
    destination_id: &str,
) -> eyre::Result<DuplicationReport>
where
    S: PlaylistService,
{
    let mut report = DuplicationReport::default();
    let mut cursor: Option<String> = None;

    loop {
        let page = service
            .list_playlist_items(source_id, cursor.take())
            .await
            .with_context(|| {
                format!(
                    "fetch page {} of playlist {source_id}",
                    report.pages + 1
                )
            })?;
        report.pages += 1;
        tracing::debug!(page = report.pages, items = page.items.len(), "copying page");

        let next = page.next_cursor().map(str::to_string);
        for item in page.items {
            match service
                .insert_playlist_item(destination_id, &item.video_id)
                .await
            {
                Ok(()) => {
                    report.copied += 1;
                    tracing::trace!(video_id = %item.video_id, "copied video");
                }
                Err(error) => {
                    tracing::warn!(
                        video_id = %item.video_id,
                        title = item.title.as_deref().unwrap_or(""),
                        "failed to copy video: {error}"
                    );
                    report.failures.push(FailedInsert {
                        video_id: item.video_id,
                        error,
                    });
                }
            }
        }

        match next {
            Some(token) => cursor = Some(token),
            None => break,
        }
    }

    tracing::info!(
        copied = report.copied,
        failed = report.failures.len(),
        pages = report.pages,
        "playlist duplication finished"
    );
    Ok(report)
}
