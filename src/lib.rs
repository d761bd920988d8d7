//! # nzb-fetch
//!
//! Segment-fetch engine for Usenet postings described by NZB manifests.
//!
//! ## Design Philosophy
//!
//! nzb-fetch is designed to be:
//! - **Resumable** - Every segment is staged on disk; interrupted jobs pick up where they stopped
//! - **Tolerant** - A missing article costs one segment, not the file or the job
//! - **Library-first** - The engine is a plain Rust crate; the demo binary is a thin wrapper
//! - **Event-driven** - Consumers subscribe to progress events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use nzb_fetch::{Config, Downloader, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::new(
//!         ServerConfig::new("news.example.com").with_credentials("user", "pass"),
//!     );
//!     config.output_dir = "downloads".into();
//!
//!     let mut files = nzb_fetch::manifest::load_nzb("posting.nzb".as_ref()).await?;
//!     let downloader = Downloader::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = nzb_fetch::run_with_shutdown(&downloader, &mut files).await?;
//!     println!("{} files complete", summary.files_complete);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Turning staged segments into output files
pub mod decoder;
/// Job orchestration (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// NZB manifest loading
pub mod manifest;
/// NNTP client: response codes, framed stream, session
pub mod nntp;
/// Retry logic with exponential backoff
pub mod retry;
/// Transfer counters and rate sampling
pub mod stats;
/// Core types and events
pub mod types;
/// Staging and marker file helpers
pub mod utils;

// Re-export commonly used types
pub use config::{Config, JobMode, RetryConfig, ServerConfig, TimeoutConfig};
pub use decoder::{Decoder, YencDecoder};
pub use downloader::Downloader;
pub use error::{Error, NntpError, Result};
pub use stats::{TransferSnapshot, TransferStats};
pub use types::{Event, File, FileOutcome, FileState, JobSummary, Segment, SegmentStatus};

/// Run a job, cancelling it gracefully on a termination signal.
///
/// On the first signal the downloader's cancellation token fires: the segment being
/// streamed is discarded, staged segments stay on disk, and the partial summary is
/// returned.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use nzb_fetch::{Config, Downloader, ServerConfig, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = Downloader::new(Config::new(ServerConfig::new("news.example.com")))?;
///     let mut files = nzb_fetch::manifest::load_nzb("posting.nzb".as_ref()).await?;
///
///     // Run with automatic signal handling
///     let summary = run_with_shutdown(&downloader, &mut files).await?;
///     println!("cancelled: {}", summary.cancelled);
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: &Downloader, files: &mut [File]) -> Result<JobSummary> {
    let token = downloader.cancel_token();
    let watcher = tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_signal() => {
                tracing::info!("Cancelling job, staged segments are kept for the next run");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    });

    let result = downloader.run(files).await;
    watcher.abort();
    result
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            if tokio::signal::ctrl_c().await.is_err() {
                // Without a signal source the job simply runs to completion
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            std::future::pending::<()>().await;
        }
    }
}
