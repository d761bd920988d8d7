//! Core types: manifest entities, per-file state and events

use crate::stats::TransferSnapshot;
use crate::utils::{marker_path, staging_path};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One article of a posting, tagged with its place in the file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Position in the reassembled file (1-based in NZB manifests)
    pub number: u32,
    /// Size the manifest declares for the article
    pub bytes: u64,
    /// Article message-id, with or without angle brackets
    pub message_id: String,
    /// Set once the segment's staging file exists
    #[serde(default)]
    pub done: bool,
}

impl Segment {
    /// Create a segment that has not been fetched yet
    #[must_use]
    pub fn new(number: u32, bytes: u64, message_id: impl Into<String>) -> Self {
        Self {
            number,
            bytes,
            message_id: message_id.into(),
            done: false,
        }
    }
}

/// A logical file of a manifest and the segments it is assembled from
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    /// Poster of the articles
    pub poster: String,
    /// Newsgroup the articles are fetched from
    pub group: String,
    /// Posting time as a Unix timestamp
    pub posted_at: i64,
    /// Subject line the file was posted under
    pub subject: String,
    /// Stable name derived from the subject, used for staging files and markers
    pub derived_name: String,
    /// Segments in manifest order (not necessarily sequence order)
    pub segments: Vec<Segment>,
    /// Set once the file has been decoded and marked complete
    #[serde(default)]
    pub complete: bool,
}

impl File {
    /// Create a file, deriving its name from `subject`
    #[must_use]
    pub fn new(
        poster: impl Into<String>,
        group: impl Into<String>,
        posted_at: i64,
        subject: impl Into<String>,
        segments: Vec<Segment>,
    ) -> Self {
        let subject = subject.into();
        Self {
            poster: poster.into(),
            group: group.into(),
            posted_at,
            derived_name: derive_name(&subject),
            subject,
            segments,
            complete: false,
        }
    }

    /// Sum of the declared segment sizes
    pub fn total_bytes(&self) -> u64 {
        self.segments.iter().map(|s| s.bytes).sum()
    }

    /// Number of segments whose staging file exists
    pub fn done_segments(&self) -> usize {
        self.segments.iter().filter(|s| s.done).count()
    }

    /// Where `segment`'s raw article text is staged
    pub fn staging_path(&self, output_dir: &Path, segment: &Segment) -> PathBuf {
        staging_path(output_dir, &self.derived_name, segment.number)
    }

    /// Staging paths of every segment, ordered by sequence number
    pub fn staging_paths_in_order(&self, output_dir: &Path) -> Vec<PathBuf> {
        let mut numbers: Vec<u32> = self.segments.iter().map(|s| s.number).collect();
        numbers.sort_unstable();
        numbers.dedup();
        numbers
            .into_iter()
            .map(|n| staging_path(output_dir, &self.derived_name, n))
            .collect()
    }

    /// Completion marker path
    pub fn marker_path(&self, output_dir: &Path) -> PathBuf {
        marker_path(output_dir, &self.derived_name)
    }
}

/// Deterministic file name for `subject`: lowercase hex MD5 of its bytes
///
/// Pure and in-process, so the same subject maps to the same staging files on every run.
pub fn derive_name(subject: &str) -> String {
    format!("{:x}", md5::compute(subject.as_bytes()))
}

/// Where a file is in its retrieval lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    /// Not started
    Pending,
    /// GROUP succeeded
    GroupSelected,
    /// Every segment was attempted
    SegmentsFetched,
    /// Decoder reported no failures
    Decoded,
    /// Completion marker written
    MarkedComplete,
    /// A completion marker already existed
    Skipped,
    /// A non-retryable error stopped the file
    Failed,
}

/// Result of a single segment retrieval
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SegmentStatus {
    /// Body streamed and staged
    Fetched {
        /// Bytes written to the staging file
        bytes: u64,
    },
    /// Staging file already existed
    AlreadyStaged,
    /// Server answered 430
    Missing,
    /// Server answered something other than 222 or 430
    Rejected {
        /// Server response line
        response: String,
    },
    /// Connection failed mid-segment
    Failed {
        /// Error message
        error: String,
    },
    /// Job cancelled while streaming
    Cancelled,
}

impl SegmentStatus {
    /// Whether the segment now has a staging file
    pub fn is_staged(&self) -> bool {
        matches!(self, SegmentStatus::Fetched { .. } | SegmentStatus::AlreadyStaged)
    }
}

/// How a file ended
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Completion marker existed; nothing was fetched
    Skipped,
    /// Decoded and marked complete
    Complete {
        /// Segments that could not be fetched
        failed_segments: usize,
    },
    /// Decoder reported items it could not decode; no marker written
    Incomplete {
        /// Segments that could not be fetched
        failed_segments: usize,
        /// Items the decoder could not decode
        decode_failures: usize,
    },
    /// Verify mode: existence check finished
    Verified {
        /// Segments the server does not have
        missing_segments: usize,
    },
    /// Job cancelled before the file finished
    Cancelled,
    /// A non-retryable error stopped the file
    Failed {
        /// Error message
        error: String,
    },
}

/// Aggregate result of a job
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    /// Files in the job
    pub files_total: usize,
    /// Files decoded and marked complete in this run
    pub files_complete: usize,
    /// Files skipped because a marker existed
    pub files_skipped: usize,
    /// Files that failed or decoded incompletely
    pub files_failed: usize,
    /// Verify mode: segments reported missing across all files
    pub segments_missing: usize,
    /// The job was cancelled before finishing
    pub cancelled: bool,
    /// Transfer counters at the end of the job
    pub transfer: TransferSnapshot,
}

impl JobSummary {
    pub(crate) fn new(files_total: usize) -> Self {
        Self {
            files_total,
            files_complete: 0,
            files_skipped: 0,
            files_failed: 0,
            segments_missing: 0,
            cancelled: false,
            transfer: TransferSnapshot {
                bytes: 0,
                elapsed_secs: 0.0,
                rate_bps: 0.0,
            },
        }
    }

    pub(crate) fn record(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Skipped => self.files_skipped += 1,
            FileOutcome::Complete { .. } => self.files_complete += 1,
            FileOutcome::Incomplete { .. } | FileOutcome::Failed { .. } => self.files_failed += 1,
            FileOutcome::Verified { missing_segments } => self.segments_missing += missing_segments,
            FileOutcome::Cancelled => self.cancelled = true,
        }
    }
}

/// Event emitted while a job runs
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Work on a file began
    FileStarted {
        /// Derived file name
        name: String,
        /// Subject line
        subject: String,
        /// Number of segments
        segments: usize,
    },

    /// A file moved to a new state
    FileState {
        /// Derived file name
        name: String,
        /// New state
        state: FileState,
    },

    /// Body bytes arrived for a segment
    SegmentProgress {
        /// Derived file name
        name: String,
        /// Segment sequence number
        number: u32,
        /// Percentage of the declared size received (may exceed 100 due to wire overhead)
        percent: u32,
        /// Current transfer rate in bytes per second
        rate_bps: f64,
    },

    /// A segment retrieval finished
    SegmentFinished {
        /// Derived file name
        name: String,
        /// Segment sequence number
        number: u32,
        /// How it ended
        status: SegmentStatus,
    },

    /// Verify mode progress
    VerifyProgress {
        /// Derived file name
        name: String,
        /// Segments checked so far
        checked: usize,
        /// Segments in the file
        total: usize,
        /// Missing segments so far
        missing: usize,
    },

    /// The session was torn down and re-established
    SessionReset {
        /// What broke the previous connection
        reason: String,
    },

    /// A file finished
    FileFinished {
        /// Derived file name
        name: String,
        /// How it ended
        outcome: FileOutcome,
    },

    /// The job finished
    JobFinished {
        /// Aggregate result
        summary: JobSummary,
    },
}
