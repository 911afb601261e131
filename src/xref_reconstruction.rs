//! Forensic xref recovery for files whose declared index is unusable.
//!
//! When the trailer is missing, the startxref offset points at garbage, or an
//! xref section is corrupt, the object index can still be rebuilt from the
//! ground truth: the `N G obj` headers physically present in the file. The
//! scan walks matches newest-to-oldest so that an object rewritten by an
//! incremental update resolves to its latest copy, exactly as a valid chain
//! would have resolved it.
//!
//! Recovery is infallible by design: the worst case is an empty index with
//! the `recovery_failed` flag set, never an error.

use crate::object::{Object, ObjectRef, dict_integer};
use crate::parser::{parse_indirect_object, parse_object};
use crate::xref::{XRefRoot, XRefSection, parse_stream_section};
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::bytes::Regex;
use std::collections::HashMap;
use std::sync::Arc;

lazy_static! {
    /// Indirect object header: object number, generation, `obj` keyword.
    static ref RE_OBJ_PATTERN: Regex = Regex::new(r"(?-u)(\d+)\s+(\d+)\s+obj").unwrap();
    /// Trailer keyword followed by its dictionary opener.
    static ref RE_TRAILER: Regex = Regex::new(r"(?-u)trailer\s*<<").unwrap();
}

/// Rebuild the object index by scanning the raw bytes.
///
/// Harvests every plausible `N G obj` header (newest occurrence wins),
/// salvages a trailer dictionary when one survives, and registers a hybrid
/// `/XRefStm` section best-effort. The returned root reports
/// [`XRefRoot::recovery_failed`] when the scan found nothing usable.
pub fn recover(buffer: &Bytes) -> XRefRoot {
    log::info!("reconstructing xref table by scanning {} bytes", buffer.len());

    let matches: Vec<(u32, u16, u64)> = RE_OBJ_PATTERN
        .captures_iter(buffer)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if !plausible_header(buffer, whole.start(), whole.end()) {
                return None;
            }
            let number = parse_capture::<u32>(&caps, 1)?;
            let generation = parse_capture::<u16>(&caps, 2)?;
            // Register the position right after the `obj` keyword; readers
            // consuming the entry parse the object body from there
            Some((number, generation, whole.end() as u64))
        })
        .collect();

    let dict = salvage_trailer_dict(buffer, &matches);

    let mut section = XRefSection::new_table(dict, buffer.clone());
    // Reverse order: the last physical occurrence of an object is the newest
    // revision, and first-registration-wins below keeps it
    for &(number, generation, offset) in matches.iter().rev() {
        if !section.contains(ObjectRef::new(number, generation)) {
            section.add_used_entry(number, generation, offset);
        }
    }
    // The scan already covered the whole file; following /Prev from a
    // salvaged trailer would re-enter the broken structure
    section.seal_prev();

    let recovery_failed = section.is_empty();
    if recovery_failed {
        log::warn!("xref reconstruction found no indirect object headers");
    } else {
        log::info!("reconstructed {} xref entries", section.len());
    }

    let mut sections = vec![Arc::new(section)];

    // A hybrid file's stream section may still be intact even when the
    // classic structure is not; registering it is strictly best-effort
    if let Some(stm_offset) = dict_integer(sections[0].dict(), "XRefStm") {
        if stm_offset >= 0 && (stm_offset as u64) < buffer.len() as u64 {
            match parse_stream_section(buffer, stm_offset as u64) {
                Ok(hybrid) => {
                    hybrid.seal_prev();
                    sections.push(Arc::new(hybrid));
                }
                Err(e) => {
                    log::warn!("ignoring unusable /XRefStm during recovery: {}", e);
                }
            }
        }
    }

    XRefRoot::from_recovery(sections, recovery_failed)
}

/// Reject matches that are substrings of longer tokens (`endobject`,
/// `objective`, ...): the byte after `obj` must be whitespace, a delimiter,
/// or end-of-file.
fn plausible_header(buffer: &[u8], _start: usize, end: usize) -> bool {
    match buffer.get(end) {
        None => true,
        Some(&c) => {
            crate::lexer::is_pdf_whitespace(c)
                || matches!(c, b'<' | b'[' | b'/' | b'(' | b'%' | b'>' | b']')
        }
    }
}

fn parse_capture<T: std::str::FromStr>(caps: &regex::bytes::Captures<'_>, i: usize) -> Option<T> {
    std::str::from_utf8(caps.get(i)?.as_bytes()).ok()?.parse().ok()
}

/// Salvage a trailer dictionary: prefer the last `trailer <<` in the file
/// (the newest revision's), else the dictionary of a surviving
/// `/Type /XRef` stream object, else nothing.
fn salvage_trailer_dict(
    buffer: &Bytes,
    matches: &[(u32, u16, u64)],
) -> HashMap<String, Object> {
    for m in RE_TRAILER.find_iter(buffer).collect::<Vec<_>>().into_iter().rev() {
        // The dictionary opener `<<` ends the match; back up onto it
        let dict_start = m.end() - 2;
        match parse_object(&buffer[dict_start..]) {
            Ok((_, Object::Dictionary(dict))) => {
                log::debug!("salvaged trailer dictionary at offset {}", m.start());
                return dict;
            }
            _ => {
                log::debug!("skipping unparseable trailer at offset {}", m.start());
            }
        }
    }

    // No classic trailer: a 1.5+ file keeps the equivalent keys in its
    // cross-reference stream dictionary
    for &(_, _, offset) in matches.iter().rev() {
        let header_start = match RE_OBJ_PATTERN
            .find_iter(&buffer[..offset as usize])
            .last()
        {
            Some(m) => m.start(),
            None => continue,
        };
        if let Ok((_, obj)) = parse_indirect_object(&buffer[header_start..]) {
            if let Some(dict) = obj.as_dict() {
                if dict.get("Type").and_then(Object::as_name) == Some("XRef") {
                    log::debug!("salvaged xref stream dictionary at offset {}", header_start);
                    return dict.clone();
                }
            }
        }
    }

    log::warn!("no trailer dictionary could be salvaged during recovery");
    HashMap::new()
}
