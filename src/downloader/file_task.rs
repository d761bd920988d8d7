//! Per-file download state machine
//!
//! `Pending → GroupSelected → SegmentsFetched → Decoded → MarkedComplete`, with
//! `Skipped` straight from `Pending` when a completion marker exists and `Failed`
//! from anywhere on a non-retryable error.

use super::Downloader;
use super::segment::SegmentFetcher;
use crate::error::{Error, Result};
use crate::nntp::Session;
use crate::types::{Event, File, FileOutcome, FileState, SegmentStatus};
use crate::utils::{remove_if_exists, write_marker};
use std::path::PathBuf;
use std::sync::Arc;

/// Tracks one file's state and reports every transition
struct FileProgress<'a> {
    downloader: &'a Downloader,
    name: String,
    state: FileState,
}

impl<'a> FileProgress<'a> {
    fn new(downloader: &'a Downloader, name: &str) -> Self {
        Self {
            downloader,
            name: name.to_string(),
            state: FileState::Pending,
        }
    }

    fn transition(&mut self, next: FileState) {
        tracing::debug!(file = %self.name, from = ?self.state, to = ?next, "File state");
        self.state = next;
        self.downloader.emit_event(Event::FileState {
            name: self.name.clone(),
            state: next,
        });
    }

    fn fail(&mut self, error: impl std::fmt::Display) -> FileOutcome {
        tracing::warn!(file = %self.name, state = ?self.state, error = %error, "File failed");
        self.transition(FileState::Failed);
        self.finish(FileOutcome::Failed {
            error: error.to_string(),
        })
    }

    fn finish(&self, outcome: FileOutcome) -> FileOutcome {
        tracing::info!(file = %self.name, outcome = ?outcome, "File finished");
        self.downloader.emit_event(Event::FileFinished {
            name: self.name.clone(),
            outcome: outcome.clone(),
        });
        outcome
    }
}

impl Downloader {
    /// Fetch, decode and mark one file complete
    ///
    /// A file whose completion marker exists is skipped without touching the
    /// network. Segment failures only clear that segment's `done` flag; the
    /// decoder still runs over whatever was staged. Returns `Err` only for
    /// job-fatal conditions (the session could not be re-established, or the
    /// output directory is unusable).
    pub async fn fetch_file(&self, session: &mut Session, file: &mut File) -> Result<FileOutcome> {
        let output_dir = self.config.output_dir.clone();
        tokio::fs::create_dir_all(&output_dir).await?;

        let mut progress = FileProgress::new(self, &file.derived_name);

        if tokio::fs::try_exists(file.marker_path(&output_dir)).await? {
            file.complete = true;
            progress.transition(FileState::Skipped);
            return Ok(progress.finish(FileOutcome::Skipped));
        }

        tracing::info!(
            file = %file.derived_name,
            subject = %file.subject,
            group = %file.group,
            segments = file.segments.len(),
            bytes = file.total_bytes(),
            "Fetching file"
        );
        self.emit_event(Event::FileStarted {
            name: file.derived_name.clone(),
            subject: file.subject.clone(),
            segments: file.segments.len(),
        });

        let selected = match session.select_group(&file.group).await {
            Err(e) if e.is_session_fatal() => {
                self.recover(session, None, &e).await?;
                session.select_group(&file.group).await
            }
            other => other,
        };
        if let Err(e) = selected {
            return Ok(progress.fail(e));
        }
        progress.transition(FileState::GroupSelected);

        let fetcher = SegmentFetcher::new(&output_dir, &self.cancel_token, &self.event_tx);
        let mut failed_segments = 0;

        for segment in file.segments.iter_mut() {
            if self.is_cancelled() {
                break;
            }

            let (status, broken) = match fetcher
                .fetch(session, &file.derived_name, segment)
                .await
            {
                Ok(status) => (status, None),
                Err(Error::Nntp(e)) => (
                    SegmentStatus::Failed {
                        error: e.to_string(),
                    },
                    Some(e),
                ),
                Err(e) => return Ok(progress.fail(e)),
            };

            if !status.is_staged() && status != SegmentStatus::Cancelled {
                failed_segments += 1;
            }
            tracing::debug!(
                file = %file.derived_name,
                number = segment.number,
                status = ?status,
                "Segment finished"
            );
            self.emit_event(Event::SegmentFinished {
                name: file.derived_name.clone(),
                number: segment.number,
                status,
            });

            if let Some(e) = broken {
                self.recover(session, Some(file.group.as_str()), &e).await?;
            }
        }

        if self.is_cancelled() {
            tracing::info!(
                file = %file.derived_name,
                staged = file.done_segments(),
                "Cancelled, keeping staged segments for the next run"
            );
            return Ok(progress.finish(FileOutcome::Cancelled));
        }
        progress.transition(FileState::SegmentsFetched);

        let staging = file.staging_paths_in_order(&output_dir);
        let decoded = self.decode(staging.clone(), output_dir.clone()).await;
        let outcome = match decoded {
            Ok(0) => {
                progress.transition(FileState::Decoded);
                match write_marker(&file.marker_path(&output_dir)).await {
                    Ok(timestamp) => {
                        tracing::debug!(file = %file.derived_name, timestamp, "Wrote completion marker");
                        file.complete = true;
                        progress.transition(FileState::MarkedComplete);
                        progress.finish(FileOutcome::Complete { failed_segments })
                    }
                    Err(e) => progress.fail(format!("failed to write completion marker: {e}")),
                }
            }
            Ok(decode_failures) => {
                tracing::warn!(
                    file = %file.derived_name,
                    decode_failures,
                    failed_segments,
                    "Decoder reported failures, file not marked complete"
                );
                progress.finish(FileOutcome::Incomplete {
                    failed_segments,
                    decode_failures,
                })
            }
            Err(e) => progress.fail(e),
        };

        remove_staging(&staging).await;
        Ok(outcome)
    }

    async fn decode(&self, staging: Vec<PathBuf>, output_dir: PathBuf) -> Result<usize> {
        let decoder = Arc::clone(&self.decoder);
        tracing::debug!(decoder = decoder.name(), items = staging.len(), "Decoding");
        tokio::task::spawn_blocking(move || decoder.decode(&staging, &output_dir)).await?
    }
}

async fn remove_staging(staging: &[PathBuf]) {
    for path in staging {
        if let Err(e) = remove_if_exists(path).await {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove staging file");
        }
    }
}
