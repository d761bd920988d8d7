//! Reconstruction of payload files from staged article text
//!
//! The engine never interprets article content itself. After a file's segments have
//! been attempted it hands the staging files, ordered by sequence number, to a
//! [`Decoder`] and uses the reported failure count to decide whether the file is
//! complete.

mod yenc;

pub use yenc::YencDecoder;

use crate::error::Result;
use std::path::{Path, PathBuf};

/// Turns staged segment files into the final payload
///
/// Calls are synchronous and may block; the downloader runs them on the blocking
/// thread pool.
///
/// # Examples
///
/// ```
/// use nzb_fetch::decoder::Decoder;
/// use std::path::{Path, PathBuf};
///
/// /// Concatenates staging files verbatim
/// struct Concat;
///
/// impl Decoder for Concat {
///     fn decode(&self, staging: &[PathBuf], output_dir: &Path) -> nzb_fetch::Result<usize> {
///         let mut out = Vec::new();
///         let mut failures = 0;
///         for path in staging {
///             match std::fs::read(path) {
///                 Ok(data) => out.extend_from_slice(&data),
///                 Err(_) => failures += 1,
///             }
///         }
///         std::fs::write(output_dir.join("payload.bin"), out)?;
///         Ok(failures)
///     }
///
///     fn name(&self) -> &'static str {
///         "concat"
///     }
/// }
/// ```
pub trait Decoder: Send + Sync {
    /// Decode `staging` (ordered by sequence number, possibly including paths that do
    /// not exist because their segment failed) into `output_dir`
    ///
    /// Returns the number of items that could not be decoded; 0 means full success.
    /// An `Err` means the decoder could not run at all.
    fn decode(&self, staging: &[PathBuf], output_dir: &Path) -> Result<usize>;

    /// Name of this implementation, for logs
    fn name(&self) -> &'static str;
}
