//! Shared test helpers for creating Downloader instances in tests.

use crate::config::{Config, ServerConfig};
use crate::decoder::Decoder;
use crate::downloader::Downloader;
use crate::error::Result;
use crate::nntp::Session;
use crate::types::{File, Segment};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

/// Helper to create a test Downloader writing into a fresh tempdir.
/// Returns the downloader and the tempdir (which must be kept alive).
pub(crate) fn create_test_downloader() -> (Downloader, Arc<RecordingDecoder>, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();

    // Nothing listens here; tests using this helper must not reach the network
    let mut config = Config::new(ServerConfig::new("127.0.0.1"));
    config.output_dir = temp_dir.path().join("out");

    let decoder = Arc::new(RecordingDecoder::default());
    let downloader = Downloader::new(config)
        .unwrap()
        .with_decoder(decoder.clone());
    (downloader, decoder, temp_dir)
}

/// A session that was never connected
pub(crate) fn offline_session(downloader: &Downloader) -> Session {
    Session::new(downloader.config.clone(), downloader.stats.clone())
}

/// Two-segment file posted to alt.binaries.test
pub(crate) fn sample_file() -> File {
    File::new(
        "user@example.com",
        "alt.binaries.test",
        1_234_567_890,
        "test.file.rar [1/2]",
        vec![
            Segment::new(1, 768_000, "part1of2@example.com"),
            Segment::new(2, 512_000, "part2of2@example.com"),
        ],
    )
}

/// Decoder that records its calls and reports a fixed failure count
#[derive(Default)]
pub(crate) struct RecordingDecoder {
    pub calls: Mutex<Vec<(Vec<PathBuf>, PathBuf)>>,
    pub failures: usize,
}

impl Decoder for RecordingDecoder {
    fn decode(&self, staging: &[PathBuf], output_dir: &Path) -> Result<usize> {
        self.calls
            .lock()
            .unwrap()
            .push((staging.to_vec(), output_dir.to_path_buf()));
        Ok(self.failures)
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
