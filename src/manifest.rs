//! Bridge from NZB manifests to [`File`]/[`Segment`] entities
//!
//! Parsing itself is done by `nntp-rs`; this module only maps its model onto the
//! engine's types.

use crate::error::{Error, Result};
use crate::types::{File, Segment};

/// Parse and validate NZB XML into files ready for retrieval
///
/// Each file is fetched from the first group it lists.
pub fn parse_nzb(content: &str) -> Result<Vec<File>> {
    let nzb = nntp_rs::parse_nzb(content).map_err(|e| Error::InvalidNzb(e.to_string()))?;
    nzb.validate()
        .map_err(|e| Error::InvalidNzb(e.to_string()))?;

    let files: Vec<File> = nzb.files.iter().map(file_from_nzb).collect();
    if files.is_empty() {
        return Err(Error::InvalidNzb("manifest lists no files".to_string()));
    }
    if let Some(file) = files.iter().find(|f| f.group.is_empty()) {
        return Err(Error::InvalidNzb(format!(
            "file '{}' lists no newsgroup",
            file.subject
        )));
    }

    tracing::debug!(
        files = files.len(),
        segments = files.iter().map(|f| f.segments.len()).sum::<usize>(),
        "Parsed NZB manifest"
    );
    Ok(files)
}

/// Read and parse an NZB file from disk
pub async fn load_nzb(path: &std::path::Path) -> Result<Vec<File>> {
    let content = tokio::fs::read_to_string(path).await?;
    parse_nzb(&content)
}

fn file_from_nzb(file: &nntp_rs::NzbFile) -> File {
    let segments = file
        .segments
        .iter()
        .map(|s| Segment::new(s.number as u32, s.bytes as u64, s.message_id.clone()))
        .collect();

    File::new(
        file.poster.clone(),
        file.groups.first().cloned().unwrap_or_default(),
        file.date as i64,
        file.subject.clone(),
        segments,
    )
}
