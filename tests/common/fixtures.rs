//! NZB fixtures, article builders and a recording decoder

use nzb_fetch::{Decoder, File, Segment};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Minimal valid NZB for testing (single segment)
pub const MINIMAL_NZB: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nzb PUBLIC "-//newzBin//DTD NZB 1.1//EN" "http://www.newzbin.com/DTD/nzb/nzb-1.1.dtd">
<nzb xmlns="http://www.newzbin.com/DTD/2003/nzb">
  <head>
    <meta type="title">Test Download</meta>
  </head>
  <file poster="test@example.com" date="1234567890" subject="test.txt (1/1)">
    <groups>
      <group>alt.test</group>
    </groups>
    <segments>
      <segment bytes="100" number="1">test-msgid-12345@example.com</segment>
    </segments>
  </file>
</nzb>"#;

/// Group every mock fixture is posted to
pub const TEST_GROUP: &str = "alt.binaries.test";

/// Article body of exactly 100 bytes, CRLF included
pub fn body_100() -> Vec<u8> {
    let mut body = vec![b'x'; 98];
    body.extend_from_slice(b"\r\n");
    body
}

/// File posted to [`TEST_GROUP`] with one 100-byte segment per message-id
pub fn test_file(subject: &str, message_ids: &[&str]) -> File {
    let segments = message_ids
        .iter()
        .enumerate()
        .map(|(i, id)| Segment::new(i as u32 + 1, 100, *id))
        .collect();
    File::new("poster@example.com", TEST_GROUP, 1_234_567_890, subject, segments)
}

/// yEnc-encode raw bytes (no line wrapping)
pub fn yenc_encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 2);
    for &byte in data {
        let encoded = byte.wrapping_add(42);
        match encoded {
            0x00 | 0x0A | 0x0D | 0x3D => {
                out.push(b'=');
                out.push(encoded.wrapping_add(64));
            }
            _ => out.push(encoded),
        }
    }
    out
}

/// One part of a multipart yEnc posting, as it appears after unstuffing
pub fn yenc_part(name: &str, total_size: usize, number: u32, total: u32, begin: usize, data: &[u8]) -> Vec<u8> {
    let end = begin + data.len() - 1;
    let mut article = format!(
        "=ybegin part={number} total={total} line=128 size={total_size} name={name}\r\n=ypart begin={begin} end={end}\r\n"
    )
    .into_bytes();
    article.extend_from_slice(&yenc_encode(data));
    article.extend_from_slice(format!("\r\n=yend size={} part={number}\r\n", data.len()).as_bytes());
    article
}

/// Decoder that records every call and reports a fixed failure count
#[derive(Default)]
pub struct RecordingDecoder {
    calls: Mutex<Vec<Vec<PathBuf>>>,
    /// Failure count returned from every call
    pub failures: usize,
}

impl RecordingDecoder {
    /// Staging lists of every call so far
    pub fn calls(&self) -> Vec<Vec<PathBuf>> {
        self.calls.lock().unwrap().clone()
    }
}

impl Decoder for RecordingDecoder {
    fn decode(&self, staging: &[PathBuf], _output_dir: &Path) -> nzb_fetch::Result<usize> {
        // Staging files are deleted after decoding, so keep a note of which existed
        let present = staging.iter().filter(|p| p.exists()).cloned().collect();
        self.calls.lock().unwrap().push(present);
        Ok(self.failures)
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
