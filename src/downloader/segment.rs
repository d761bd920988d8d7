//! Segment retrieval and existence checks

use crate::error::{NntpError, Result};
use crate::nntp::{Session, codes};
use crate::types::{Event, Segment, SegmentStatus};
use crate::utils::{partial_path, remove_if_exists, staging_path};
use std::path::Path;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Smallest body buffer allocated up front
const MIN_BODY_BUFFER: usize = 4 * 1024;

/// Fetches single segments over a session
///
/// Borrowed per file from the downloader; holds only references.
pub struct SegmentFetcher<'a> {
    output_dir: &'a Path,
    cancel: &'a CancellationToken,
    events: &'a broadcast::Sender<Event>,
}

impl<'a> SegmentFetcher<'a> {
    /// Create a fetcher staging into `output_dir`
    #[must_use]
    pub fn new(
        output_dir: &'a Path,
        cancel: &'a CancellationToken,
        events: &'a broadcast::Sender<Event>,
    ) -> Self {
        Self {
            output_dir,
            cancel,
            events,
        }
    }

    /// Existence check with STAT; touches no files
    pub async fn exists<S>(
        &self,
        session: &mut Session<S>,
        segment: &Segment,
    ) -> std::result::Result<bool, NntpError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        session.stat(&segment.message_id).await
    }

    /// Retrieve `segment` of the file named `file_name` into its staging file
    ///
    /// An existing staging file short-circuits to [`SegmentStatus::AlreadyStaged`].
    /// 430 and other unexpected replies are reported as statuses, not errors; an `Err`
    /// means the connection is no longer usable or the staging file could not be
    /// written. `segment.done` reflects whether a staging file exists afterwards.
    pub async fn fetch<S>(
        &self,
        session: &mut Session<S>,
        file_name: &str,
        segment: &mut Segment,
    ) -> Result<SegmentStatus>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let staging = staging_path(self.output_dir, file_name, segment.number);
        if tokio::fs::try_exists(&staging).await? {
            tracing::debug!(file = file_name, number = segment.number, "Segment already staged");
            segment.done = true;
            return Ok(SegmentStatus::AlreadyStaged);
        }
        segment.done = false;

        let response = session.request_body(&segment.message_id).await?;
        match response.code() {
            Some(codes::BODY_OK) => {}
            Some(codes::NO_SUCH_ARTICLE) => {
                tracing::warn!(
                    file = file_name,
                    number = segment.number,
                    message_id = %segment.message_id,
                    "Article not found on server"
                );
                return Ok(SegmentStatus::Missing);
            }
            _ => {
                tracing::warn!(
                    file = file_name,
                    number = segment.number,
                    response = %response,
                    "Unexpected BODY response"
                );
                return Ok(SegmentStatus::Rejected {
                    response: response.line().to_string(),
                });
            }
        }

        // Wire text normally stays under twice the declared size; grow past it if not
        let hint = usize::try_from(segment.bytes)
            .unwrap_or(usize::MAX)
            .saturating_mul(2)
            .max(MIN_BODY_BUFFER);
        let mut body = Vec::with_capacity(hint);

        let stats = session.stats().clone();
        let expected = segment.bytes;
        let number = segment.number;
        let events = self.events;
        let mut last_percent = None;

        let streamed = session
            .stream_mut()?
            .read_until_terminator(&mut body, self.cancel, |received| {
                let percent = progress_percent(received, expected);
                if last_percent != Some(percent) {
                    last_percent = Some(percent);
                    tracing::trace!(file = file_name, number, percent, received, "Segment progress");
                    events
                        .send(Event::SegmentProgress {
                            name: file_name.to_string(),
                            number,
                            percent,
                            rate_bps: stats.rate_bps(),
                        })
                        .ok();
                }
            })
            .await;

        match streamed {
            Ok(()) => {}
            Err(NntpError::Cancelled) => {
                self.discard(&staging).await;
                return Ok(SegmentStatus::Cancelled);
            }
            Err(e) => return Err(e.into()),
        }

        if body.len() > hint {
            tracing::debug!(
                file = file_name,
                number,
                received = body.len(),
                hint,
                "Body exceeded buffer size hint"
            );
        }

        let content = unstuff(&body);
        let partial = partial_path(&staging);
        tokio::fs::write(&partial, &content).await?;
        tokio::fs::rename(&partial, &staging).await?;

        segment.done = true;
        Ok(SegmentStatus::Fetched {
            bytes: content.len() as u64,
        })
    }

    /// Remove whatever was staged for an interrupted segment
    async fn discard(&self, staging: &Path) {
        for path in [partial_path(staging), staging.to_path_buf()] {
            if let Err(e) = remove_if_exists(&path).await {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial staging file");
            }
        }
    }
}

/// Undo dot-stuffing: drop one leading dot from every line
///
/// Lines keep their terminators, so CRLF survives untouched.
pub fn unstuff(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    for line in body.split_inclusive(|&b| b == b'\n') {
        out.extend_from_slice(line.strip_prefix(b".").unwrap_or(line));
    }
    out
}

/// Whole percent of `expected` bytes received, rounded up
fn progress_percent(received: usize, expected: u64) -> u32 {
    if expected == 0 {
        return 100;
    }
    let percent = (received as u64).saturating_mul(100).div_ceil(expected);
    u32::try_from(percent).unwrap_or(u32::MAX)
}
