//! NNTP client plumbing: response codes, the deadline-bounded stream and the session

pub mod response;
pub mod session;
pub mod stream;

pub use response::{Response, codes, status_code};
pub use session::{Session, SessionState};
pub use stream::{BODY_TERMINATOR, NntpStream};

use std::borrow::Cow;

/// Message-ids from manifests usually lack the angle brackets the wire format needs
pub(crate) fn wire_message_id(message_id: &str) -> Cow<'_, str> {
    let trimmed = message_id.trim();
    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        Cow::Borrowed(trimmed)
    } else {
        Cow::Owned(format!("<{trimmed}>"))
    }
}
