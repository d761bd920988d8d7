//! Verify mode: existence checks without staging anything

use super::Downloader;
use super::segment::SegmentFetcher;
use crate::error::Result;
use crate::nntp::Session;
use crate::types::{Event, File, FileOutcome};

impl Downloader {
    /// Check that every segment of `file` exists on the server
    ///
    /// Issues `STAT` per segment and returns how many the server reported missing.
    /// Nothing is written to the output directory. A segment whose check fails on
    /// the wire is counted as missing; if the failure broke the session it is reset
    /// before the next check.
    pub async fn verify_file(&self, session: &mut Session, file: &mut File) -> Result<usize> {
        let name = file.derived_name.clone();
        let total = file.segments.len();

        self.emit_event(Event::FileStarted {
            name: name.clone(),
            subject: file.subject.clone(),
            segments: total,
        });

        let fetcher = SegmentFetcher::new(&self.config.output_dir, &self.cancel_token, &self.event_tx);
        let mut checked = 0;
        let mut missing = 0;

        for segment in &file.segments {
            if self.is_cancelled() {
                break;
            }

            match fetcher.exists(session, segment).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(
                        file = %name,
                        number = segment.number,
                        message_id = %segment.message_id,
                        "Segment missing on server"
                    );
                    missing += 1;
                }
                Err(e) => {
                    tracing::warn!(file = %name, number = segment.number, error = %e, "Existence check failed");
                    missing += 1;
                    if e.is_session_fatal() {
                        self.recover(session, None, &e).await?;
                    }
                }
            }

            checked += 1;
            self.emit_event(Event::VerifyProgress {
                name: name.clone(),
                checked,
                total,
                missing,
            });
        }

        tracing::info!(file = %name, checked, total, missing, "Verified file");
        self.emit_event(Event::FileFinished {
            name,
            outcome: FileOutcome::Verified {
                missing_segments: missing,
            },
        });

        Ok(missing)
    }
}
