use super::Decoder;
use crate::error::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Cross-platform positional file write.
///
/// Writes `buf` to `file` at the given byte `offset`, equivalent to Unix `pwrite`.
#[cfg(unix)]
fn write_all_at(file: &std::fs::File, buf: &[u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

/// Cross-platform positional file write.
///
/// Writes `buf` to `file` at the given byte `offset`, equivalent to Unix `pwrite`.
#[cfg(windows)]
fn write_all_at(file: &std::fs::File, buf: &[u8], offset: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut written = 0;
    while written < buf.len() {
        let n = file.seek_write(&buf[written..], offset + written as u64)?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "failed to write whole buffer",
            ));
        }
        written += n;
    }
    Ok(())
}

#[cfg(not(any(unix, windows)))]
fn write_all_at(_file: &std::fs::File, _buf: &[u8], _offset: u64) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "positional writes not supported on this platform",
    ))
}

/// yEnc decoder backed by `nntp-rs`
///
/// Each staging file is decoded on its own and written at its `=ypart begin` offset
/// into `output_dir/<name>`, where `name` comes from the `=ybegin` header. The output
/// file is sized to the header's total size on the first part seen.
#[derive(Debug, Default, Clone, Copy)]
pub struct YencDecoder;

impl YencDecoder {
    /// Create a decoder
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for YencDecoder {
    fn decode(&self, staging: &[PathBuf], output_dir: &Path) -> Result<usize> {
        let mut failures = 0;
        let mut sized: HashSet<PathBuf> = HashSet::new();

        for path in staging {
            let data = match std::fs::read(path) {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Staging file unavailable");
                    failures += 1;
                    continue;
                }
            };

            let decoded = match nntp_rs::yenc_decode(&data) {
                Ok(decoded) => decoded,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "yEnc decode failed");
                    failures += 1;
                    continue;
                }
            };

            let Some(target) = output_name(&decoded.header.name).map(|n| output_dir.join(n))
            else {
                tracing::warn!(path = %path.display(), "yEnc header carries no usable file name");
                failures += 1;
                continue;
            };

            let offset = decoded
                .part
                .as_ref()
                .map(|p| p.begin.saturating_sub(1)) // yEnc begin is 1-based
                .unwrap_or(0);

            let written = std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(false)
                .open(&target)
                .and_then(|file| {
                    // First part seen this run fixes the file size (drops stale tails)
                    if decoded.header.size > 0 && sized.insert(target.clone()) {
                        file.set_len(decoded.header.size)?;
                    }
                    write_all_at(&file, &decoded.data, offset)
                });

            match written {
                Ok(()) => tracing::trace!(
                    target = %target.display(),
                    offset,
                    bytes = decoded.data.len(),
                    "Wrote decoded part"
                ),
                Err(e) => {
                    tracing::warn!(target = %target.display(), error = %e, "Failed to write decoded part");
                    failures += 1;
                }
            }
        }

        Ok(failures)
    }

    fn name(&self) -> &'static str {
        "yenc"
    }
}

/// Strip any directory components from a header-supplied name
fn output_name(name: &str) -> Option<PathBuf> {
    Path::new(name.trim())
        .file_name()
        .map(PathBuf::from)
        .filter(|n| !n.as_os_str().is_empty())
}
