//! Fetch every file of an NZB into a directory
//!
//! Usage: cargo run --release --example fetch_nzb -- path/to/posting.nzb
//!
//! Server settings come from the environment (a .env file is honoured):
//! `NNTP_HOST`, `NNTP_PORT`, `NNTP_USERNAME`, `NNTP_PASSWORD`, `OUTPUT_DIR`, and
//! `VERIFY=1` to only check that the articles exist. Ctrl+C stops after the current
//! receive; rerunning the same command resumes.

use nzb_fetch::{Config, Downloader, Event, JobMode, ServerConfig, run_with_shutdown};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nzb_fetch=info")),
        )
        .init();

    let nzb_path = std::env::args()
        .nth(1)
        .ok_or("usage: fetch_nzb <path/to/posting.nzb>")?;

    // Load config from env
    let host = std::env::var("NNTP_HOST").map_err(|_| "NNTP_HOST not set")?;
    let mut server = ServerConfig::new(host);
    if let Some(port) = std::env::var("NNTP_PORT").ok().and_then(|p| p.parse().ok()) {
        server.port = port;
    }
    if let (Ok(username), Ok(password)) = (
        std::env::var("NNTP_USERNAME"),
        std::env::var("NNTP_PASSWORD"),
    ) {
        server = server.with_credentials(username, password);
    }

    let mut config = Config::new(server);
    if let Ok(dir) = std::env::var("OUTPUT_DIR") {
        config.output_dir = dir.into();
    }
    if std::env::var("VERIFY").is_ok_and(|v| v == "1") {
        config.mode = JobMode::Verify;
    }

    println!("═══════════════════════════════════════════════════════════");
    println!("  nzb-fetch");
    println!("═══════════════════════════════════════════════════════════");
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Output: {}", config.output_dir.display());
    println!("  Mode:   {:?}", config.mode);
    println!("  NZB:    {}", nzb_path);
    println!("═══════════════════════════════════════════════════════════");

    let mut files = nzb_fetch::manifest::load_nzb(nzb_path.as_ref()).await?;
    let downloader = Downloader::new(config)?;

    // Print per-segment results as they arrive
    let mut events = downloader.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::FileStarted {
                    subject, segments, ..
                } => {
                    println!("⬇ {} ({} segments)", subject, segments);
                }
                Event::SegmentFinished { number, status, .. } => {
                    println!("  segment {:>4}: {:?}", number, status);
                }
                Event::VerifyProgress {
                    checked,
                    total,
                    missing,
                    ..
                } if checked == total => {
                    println!("  {} of {} segments missing", missing, total);
                }
                Event::SessionReset { reason } => {
                    println!("⚠ reconnecting: {}", reason);
                }
                Event::FileFinished { outcome, .. } => {
                    println!("✓ {:?}", outcome);
                }
                _ => {}
            }
        }
    });

    let summary = run_with_shutdown(&downloader, &mut files).await?;

    println!("═══════════════════════════════════════════════════════════");
    println!("  Files:    {}", summary.files_total);
    println!("  Complete: {}", summary.files_complete);
    println!("  Skipped:  {}", summary.files_skipped);
    println!("  Failed:   {}", summary.files_failed);
    if summary.segments_missing > 0 {
        println!("  Missing segments: {}", summary.segments_missing);
    }
    println!(
        "  Transferred {:.2} MB in {:.1}s ({:.2} MB/s)",
        summary.transfer.bytes as f64 / 1_048_576.0,
        summary.transfer.elapsed_secs,
        summary.transfer.average_bps() / 1_048_576.0
    );
    if summary.cancelled {
        println!("  Cancelled: rerun to resume");
    }
    println!("═══════════════════════════════════════════════════════════");

    Ok(())
}
