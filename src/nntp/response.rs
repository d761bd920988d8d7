//! Status line classification

/// Status codes the engine branches on
pub mod codes {
    /// Server ready, posting allowed
    pub const READY_POSTING: u16 = 200;
    /// Server ready, posting not allowed
    pub const READY_NO_POSTING: u16 = 201;
    /// Closing connection
    pub const QUIT_OK: u16 = 205;
    /// Group selected
    pub const GROUP_OK: u16 = 211;
    /// Article follows
    pub const ARTICLE_OK: u16 = 220;
    /// Body follows
    pub const BODY_OK: u16 = 222;
    /// Article exists
    pub const STAT_OK: u16 = 223;
    /// Authentication accepted (legacy)
    pub const AUTH_OK_LEGACY: u16 = 250;
    /// Authentication accepted
    pub const AUTH_OK: u16 = 281;
    /// Username accepted, password required
    pub const AUTH_CONTINUE: u16 = 381;
    /// Service discontinued, usually too many connections
    pub const SERVICE_UNAVAILABLE: u16 = 400;
    /// No such newsgroup
    pub const NO_SUCH_GROUP: u16 = 411;
    /// No such article
    pub const NO_SUCH_ARTICLE: u16 = 430;
    /// Authentication rejected
    pub const AUTH_REJECTED: u16 = 452;
}

/// A single response line with its parsed status code
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    code: Option<u16>,
    line: String,
}

impl Response {
    /// Parse a status line (trailing CRLF is ignored)
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        Self {
            code: status_code(line),
            line: line.to_string(),
        }
    }

    /// The status code, or `None` if the line was malformed
    pub fn code(&self) -> Option<u16> {
        self.code
    }

    /// Whether the status code equals `code`
    pub fn is(&self, code: u16) -> bool {
        self.code == Some(code)
    }

    /// Whether the status code is one of `codes`
    pub fn is_any(&self, codes: &[u16]) -> bool {
        self.code.is_some_and(|c| codes.contains(&c))
    }

    /// The raw line without its terminator
    pub fn line(&self) -> &str {
        &self.line
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.line)
    }
}

/// Extract the leading integer status code of `line`
///
/// Leading whitespace is skipped; the code is the run of ASCII digits that follows.
/// Returns `None` (the malformed sentinel) when there is no such run or it does not
/// fit a `u16`.
pub fn status_code(line: &str) -> Option<u16> {
    let trimmed = line.trim_start();
    let digits = trimmed
        .bytes()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits == 0 {
        return None;
    }
    trimmed[..digits].parse().ok()
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_leading_code() {
        assert_eq!(status_code("200 news.example.com ready"), Some(200));
        assert_eq!(status_code("430"), Some(430));
        assert_eq!(status_code("  211 5 1 5 alt.test"), Some(211));
        assert_eq!(status_code("222 0 <a@b> body\r\n"), Some(222));
    }

    #[test]
    fn non_numeric_prefix_is_malformed() {
        for line in [
            "",
            "   ",
            "OK 200",
            "-200 negative",
            "abc",
            ".\r\n",
            "\u{fffd}200",
            "99999999999999999999 overflow",
        ] {
            assert_eq!(status_code(line), None, "line {line:?}");
        }
    }

    #[test]
    fn response_strips_terminator() {
        let resp = Response::parse("381 PASS required\r\n");
        assert!(resp.is(codes::AUTH_CONTINUE));
        assert!(resp.is_any(&[codes::AUTH_OK, codes::AUTH_CONTINUE]));
        assert_eq!(resp.line(), "381 PASS required");
        assert_eq!(resp.to_string(), "381 PASS required");
    }

    #[test]
    fn malformed_response_matches_nothing() {
        let resp = Response::parse("garbage");
        assert_eq!(resp.code(), None);
        assert!(!resp.is(codes::READY_POSTING));
        assert!(!resp.is_any(&[codes::READY_POSTING, codes::READY_NO_POSTING]));
    }
}
