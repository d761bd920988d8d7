//! Job orchestration split into focused submodules.
//!
//! The [`Downloader`] owns the job context (configuration, decoder, event channel,
//! transfer counters, cancellation token) and drives one session through every file:
//! - [`file_task`] - Per-file download state machine
//! - [`verify`] - Existence-check mode
//! - [`segment`] - Single-segment retrieval and STAT checks

mod file_task;
mod segment;
mod verify;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use segment::{SegmentFetcher, unstuff};

use crate::config::{Config, JobMode};
use crate::decoder::{Decoder, YencDecoder};
use crate::error::{NntpError, Result};
use crate::nntp::Session;
use crate::stats::TransferStats;
use crate::types::{Event, File, FileOutcome, JobSummary};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Fetches the files of a manifest over a single NNTP session
///
/// # Examples
///
/// ```no_run
/// use nzb_fetch::{Config, Downloader, ServerConfig};
///
/// # async fn example() -> nzb_fetch::Result<()> {
/// let mut config = Config::new(ServerConfig::new("news.example.com"));
/// config.output_dir = "downloads".into();
///
/// let mut files = nzb_fetch::manifest::load_nzb("posting.nzb".as_ref()).await?;
/// let downloader = Downloader::new(config)?;
/// let summary = downloader.run(&mut files).await?;
/// println!("{} of {} files complete", summary.files_complete, summary.files_total);
/// # Ok(())
/// # }
/// ```
pub struct Downloader {
    config: Arc<Config>,
    decoder: Arc<dyn Decoder>,
    event_tx: broadcast::Sender<Event>,
    stats: TransferStats,
    cancel_token: CancellationToken,
}

impl Downloader {
    /// Create a downloader using the yEnc decoder
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let (event_tx, _rx) = broadcast::channel(1000);
        Ok(Self {
            config: Arc::new(config),
            decoder: Arc::new(YencDecoder::new()),
            event_tx,
            stats: TransferStats::new(),
            cancel_token: CancellationToken::new(),
        })
    }

    /// Replace the decoder
    #[must_use]
    pub fn with_decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Subscribe to job events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The job configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Transfer counters shared by every session of this downloader
    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    /// Token that stops the job when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Stop the job at the next checkpoint
    ///
    /// The current receive wait is allowed to finish; the segment being streamed is
    /// discarded, and no further segments or files are started.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Whether [`cancel`](Self::cancel) was called
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Open a connected, authenticated session
    pub async fn connect(&self) -> Result<Session> {
        let mut session = Session::new(Arc::clone(&self.config), self.stats.clone());
        session.connect(self.config.server.connect_attempts).await?;
        Ok(session)
    }

    /// Process every file in order and report the aggregate result
    ///
    /// Fails only when no usable session can be established or kept, or the output
    /// directory cannot be created. Individual file failures are counted in the
    /// summary instead. Verify mode never touches the output directory.
    pub async fn run(&self, files: &mut [File]) -> Result<JobSummary> {
        if self.config.mode == JobMode::Download {
            tokio::fs::create_dir_all(&self.config.output_dir).await?;
        }
        let mut session = self.connect().await?;
        let mut summary = JobSummary::new(files.len());

        for file in files.iter_mut() {
            if self.is_cancelled() {
                break;
            }

            let outcome = match self.config.mode {
                JobMode::Download => self.fetch_file(&mut session, file).await,
                JobMode::Verify => self
                    .verify_file(&mut session, file)
                    .await
                    .map(|missing_segments| FileOutcome::Verified { missing_segments }),
            };

            match outcome {
                Ok(outcome) => summary.record(&outcome),
                Err(e) => {
                    tracing::error!(file = %file.derived_name, error = %e, "Job aborted");
                    session.disconnect().await;
                    return Err(e);
                }
            }
        }

        session.disconnect().await;

        summary.cancelled |= self.is_cancelled();
        summary.transfer = self.stats.snapshot();
        tracing::info!(
            megabytes = summary.transfer.bytes as f64 / (1024.0 * 1024.0),
            seconds = summary.transfer.elapsed_secs,
            kbps = summary.transfer.average_bps() / 1024.0,
            files_complete = summary.files_complete,
            files_skipped = summary.files_skipped,
            files_failed = summary.files_failed,
            cancelled = summary.cancelled,
            "Job finished"
        );
        self.emit_event(Event::JobFinished {
            summary: summary.clone(),
        });

        Ok(summary)
    }

    /// Tear down a broken session and, if given, re-select `group`
    ///
    /// Failure here is fatal to the job.
    async fn recover(
        &self,
        session: &mut Session,
        group: Option<&str>,
        reason: &NntpError,
    ) -> Result<()> {
        tracing::warn!(error = %reason, "Session broken, reconnecting");
        self.emit_event(Event::SessionReset {
            reason: reason.to_string(),
        });

        session.reset().await?;
        if let Some(group) = group {
            session.select_group(group).await?;
        }
        Ok(())
    }

    pub(crate) fn emit_event(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine - we just drop the event
        self.event_tx.send(event).ok();
    }
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("config", &self.config)
            .field("decoder", &self.decoder.name())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
