//! `%PDF-x.y` header locator.
//!
//! Producers routinely prepend junk bytes (HTTP headers, printer preambles)
//! before the marker, and some write malformed version strings. Neither is a
//! reason to fail an open: the marker is searched within a bounded window,
//! the version degrades to `0.0`, and the returned view drops the leading
//! junk so every downstream offset is relative to the marker.

use bytes::Bytes;

/// Number of leading bytes searched for the `%PDF-` marker.
const HEADER_SEARCH_WINDOW: usize = 8192;

const MARKER: &[u8] = b"%PDF-";

/// Parsed file header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Header {
    /// Version from the marker (`1.7` for `%PDF-1.7`); `0.0` when the marker
    /// is absent or the version digits do not parse
    pub version: f64,
    /// Whether junk bytes preceded the marker
    pub has_leading_garbage: bool,
}

impl Header {
    /// Locate the header and return it together with a view of the buffer
    /// that starts at the marker (leading junk trimmed).
    ///
    /// This never fails: a missing marker yields version `0.0` and the
    /// buffer unchanged.
    pub fn parse(buffer: &Bytes) -> (Header, Bytes) {
        let window = &buffer[..buffer.len().min(HEADER_SEARCH_WINDOW)];

        let Some(pos) = crate::parser::find_keyword(window, MARKER) else {
            log::warn!("%PDF- marker not found in first {} bytes", window.len());
            return (
                Header {
                    version: 0.0,
                    has_leading_garbage: false,
                },
                buffer.clone(),
            );
        };

        // The 3 bytes after the marker are "d.d"; anything else is tolerated
        let version = buffer
            .get(pos + MARKER.len()..pos + MARKER.len() + 3)
            .and_then(|v| std::str::from_utf8(v).ok())
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or_else(|| {
                log::warn!("malformed version digits after %PDF- marker");
                0.0
            });

        let has_leading_garbage = pos > 0;
        if has_leading_garbage {
            log::debug!("discarding {} junk bytes before %PDF- marker", pos);
        }

        let view = if has_leading_garbage {
            buffer.slice(pos..)
        } else {
            buffer.clone()
        };

        (
            Header {
                version,
                has_leading_garbage,
            },
            view,
        )
    }
}
