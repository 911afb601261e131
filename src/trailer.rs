//! `startxref` locator.
//!
//! Finds the byte offset of the primary cross-reference section by searching
//! the file tail for the `%%EOF` marker and the `startxref` keyword before
//! it. Real files bury these under appended junk or omit the leading `%` of
//! the EOF marker, so the search widens through three windows before giving
//! up: the last 1028 bytes, the last 32000 bytes, then the whole file.

use crate::error::{Error, Result};
use crate::parser::rfind_keyword;

const STARTXREF: &[u8] = b"startxref";
const EOF_MARKER: &[u8] = b"%%EOF";
/// Malformed variant some producers emit (missing one `%`).
const EOF_MARKER_SHORT: &[u8] = b"%EOF";

/// Retry windows, widest last. The whole file is always the final attempt.
const WINDOWS: [usize; 2] = [1028, 32000];

/// Parsed trailer position information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    /// Offset of the primary xref section, as declared after `startxref`
    pub start_xref_offset: u64,
}

/// Extract the primary xref offset from the file tail.
///
/// # Errors
///
/// `Error::TrailerNotFound` only after the widest window (the whole buffer)
/// also fails to yield an offset.
pub fn parse_xref_offset(buffer: &[u8]) -> Result<u64> {
    for window in WINDOWS {
        if let Some(offset) = try_window(buffer, window.min(buffer.len())) {
            return Ok(offset);
        }
        if window >= buffer.len() {
            // Wider retries would scan the same bytes again
            return Err(Error::TrailerNotFound);
        }
    }
    try_window(buffer, buffer.len()).ok_or(Error::TrailerNotFound)
}

/// One attempt over the last `window` bytes. Any failure here means "try a
/// wider window", not a hard error.
fn try_window(buffer: &[u8], window: usize) -> Option<u64> {
    let tail = &buffer[buffer.len() - window..];

    // Well-formed marker first, then the malformed fallback
    let eof_pos = rfind_keyword(tail, EOF_MARKER).or_else(|| {
        let pos = rfind_keyword(tail, EOF_MARKER_SHORT);
        if pos.is_some() {
            log::warn!("well-formed %%EOF missing, accepting malformed %EOF");
        }
        pos
    })?;

    let startxref_pos = rfind_keyword(&tail[..eof_pos], STARTXREF)?;

    let digits_start = startxref_pos + STARTXREF.len();
    if digits_start >= eof_pos {
        return None;
    }

    let span = std::str::from_utf8(&tail[digits_start..eof_pos]).ok()?;
    let trimmed = span.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<u64>() {
        Ok(offset) => Some(offset),
        Err(_) => {
            log::debug!("non-numeric startxref operand {:?} in {}-byte window", trimmed, window);
            None
        }
    }
}
