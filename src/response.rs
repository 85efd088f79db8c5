// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Status-line and header-block parsing.

use crate::decode::{ChunkedState, Decoder};
use crate::error::Outcome;

/// Map a response status code to the closed outcome table spec.md §4.6 step 4
/// and §4.6 step 1 both specify — the CONNECT-tunnel response and the main
/// response are dispatched through the same table, not two different ones:
/// 200/206 continue, 400/403/404 map to their outcome, 407 retries when a
/// proxy is in play, anything else is `StatusUnknown`.
pub fn status_to_outcome(status: u16, proxy_present: bool) -> Result<(), Outcome> {
    match status {
        200 | 206 => Ok(()),
        400 => Err(Outcome::BadRequest),
        403 => Err(Outcome::Forbidden),
        404 => Err(Outcome::NotFound),
        407 if proxy_present => Err(Outcome::Retry),
        _ => Err(Outcome::StatusUnknown),
    }
}

/// Parsed response headers relevant to this client, plus the leftover bytes
/// that followed the blank line terminating the header block (the start of
/// the body, already in hand).
pub struct ParsedHeaders {
    pub status: u16,
    pub content_length: Option<u64>,
    pub chunked: bool,
    pub body_start: Vec<u8>,
}

impl ParsedHeaders {
    pub fn decoder(&self) -> Decoder {
        if self.chunked {
            Decoder::Chunked(ChunkedState::new())
        } else {
            Decoder::Identity
        }
    }
}

/// Split `buf` into CRLF- (or bare-LF-) terminated lines up to and including
/// the blank line ending the header block. Returns `None` if the terminating
/// blank line hasn't arrived yet.
fn split_header_block(buf: &[u8]) -> Option<(Vec<&[u8]>, usize)> {
    let mut lines = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;
    while i < buf.len() {
        if buf[i] == b'\n' {
            let mut end = i;
            if end > start && buf[end - 1] == b'\r' {
                end -= 1;
            }
            let line = &buf[start..end];
            start = i + 1;
            if line.is_empty() {
                return Some((lines, start));
            }
            lines.push(line);
        }
        i += 1;
    }
    let _ = lines;
    None
}

/// Parse `HTTP/1.x NNN ...` and return the three-digit status code.
fn parse_status_line(line: &[u8]) -> Option<u16> {
    let s = std::str::from_utf8(line).ok()?;
    let rest = s.strip_prefix("HTTP/1.")?;
    let mut chars = rest.char_indices();
    let (_, c) = chars.next()?;
    if !c.is_ascii_digit() {
        return None;
    }
    let after_minor = chars.next().map(|(i, _)| i).unwrap_or(rest.len());
    let rest = rest[after_minor..].trim_start();
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() != 3 {
        return None;
    }
    digits.parse().ok()
}

/// Parse the full header block (status line + headers) out of `buf`. Returns
/// `None` if the blank line terminating the block has not yet arrived —
/// callers should read more and retry.
pub fn try_parse(buf: &[u8]) -> Option<ParsedHeaders> {
    let (lines, consumed) = split_header_block(buf)?;
    let mut iter = lines.into_iter();
    let status_line = iter.next()?;
    let status = parse_status_line(status_line).unwrap_or(0);

    let mut content_length = None;
    let mut chunked = false;
    for line in iter {
        if let Some(colon) = line.iter().position(|&b| b == b':') {
            let key = &line[..colon];
            let mut value = &line[colon + 1..];
            while value.first().is_some_and(|b| b.is_ascii_whitespace()) {
                value = &value[1..];
            }
            if key.eq_ignore_ascii_case(b"content-length") {
                if let Ok(s) = std::str::from_utf8(value) {
                    content_length = s.trim().parse::<u64>().ok();
                }
            } else if key.eq_ignore_ascii_case(b"transfer-encoding")
                && value.eq_ignore_ascii_case(b"chunked")
            {
                chunked = true;
            }
        }
    }

    Some(ParsedHeaders {
        status,
        content_length,
        chunked,
        body_start: buf[consumed..].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_and_content_length() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello";
        let parsed = try_parse(raw).unwrap();
        assert_eq!(parsed.status, 200);
        assert_eq!(parsed.content_length, Some(5));
        assert!(!parsed.chunked);
        assert_eq!(parsed.body_start, b"hello");
    }

    #[test]
    fn recognizes_chunked_case_insensitively() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: CHUNKED\r\n\r\n";
        let parsed = try_parse(raw).unwrap();
        assert!(parsed.chunked);
    }

    #[test]
    fn tolerates_bare_lf() {
        let raw = b"HTTP/1.1 404 Not Found\nContent-Length: 0\n\n";
        let parsed = try_parse(raw).unwrap();
        assert_eq!(parsed.status, 404);
        assert_eq!(parsed.content_length, Some(0));
    }

    #[test]
    fn incomplete_header_block_returns_none() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n";
        assert!(try_parse(raw).is_none());
    }

    #[test]
    fn unrecognized_headers_are_ignored() {
        let raw = b"HTTP/1.1 200 OK\r\nX-Foo: bar\r\nContent-Length: 2\r\n\r\nhi";
        let parsed = try_parse(raw).unwrap();
        assert_eq!(parsed.content_length, Some(2));
        assert_eq!(parsed.body_start, b"hi");
    }

    #[test]
    fn status_table_matches_recognized_codes() {
        assert_eq!(status_to_outcome(200, false), Ok(()));
        assert_eq!(status_to_outcome(206, true), Ok(()));
        assert_eq!(status_to_outcome(400, false), Err(Outcome::BadRequest));
        assert_eq!(status_to_outcome(403, false), Err(Outcome::Forbidden));
        assert_eq!(status_to_outcome(404, false), Err(Outcome::NotFound));
        assert_eq!(status_to_outcome(500, false), Err(Outcome::StatusUnknown));
    }

    #[test]
    fn status_407_retries_only_through_a_proxy() {
        assert_eq!(status_to_outcome(407, true), Err(Outcome::Retry));
        assert_eq!(status_to_outcome(407, false), Err(Outcome::StatusUnknown));
    }
}
