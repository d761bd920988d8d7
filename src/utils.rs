//! On-disk layout helpers for staging files and completion markers
//!
//! Everything lives directly in the output directory as hidden files:
//! - `.{derived_name}.{sequence}` holds the raw article text of one segment
//! - `.{derived_name}.done` marks a file as decoded, containing the Unix timestamp

use std::io;
use std::path::{Path, PathBuf};

/// Staging file for segment `number` of the file named `derived_name`
pub fn staging_path(output_dir: &Path, derived_name: &str, number: u32) -> PathBuf {
    output_dir.join(format!(".{derived_name}.{number}"))
}

/// Completion marker for the file named `derived_name`
pub fn marker_path(output_dir: &Path, derived_name: &str) -> PathBuf {
    output_dir.join(format!(".{derived_name}.done"))
}

/// Sibling path a staging file is written to before being renamed into place
pub(crate) fn partial_path(staging: &Path) -> PathBuf {
    let mut name = staging.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Remove `path`, treating "already gone" as success
///
/// Returns whether a file was actually removed.
pub async fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Write a completion marker containing the current Unix timestamp
///
/// The file holds the decimal seconds and nothing else. Returns the timestamp written.
pub async fn write_marker(path: &Path) -> io::Result<i64> {
    let timestamp = chrono::Utc::now().timestamp();
    tokio::fs::write(path, timestamp.to_string()).await?;
    Ok(timestamp)
}

/// Read back the timestamp stored in a completion marker
pub async fn read_marker(path: &Path) -> io::Result<i64> {
    let content = tokio::fs::read_to_string(path).await?;
    content
        .trim()
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
