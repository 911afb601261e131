//! Cross-reference sections and the aggregate object index.
//!
//! A PDF's object index is a chain of xref sections, newest first: classic
//! ASCII tables (PDF 1.0-1.4), binary cross-reference streams (PDF 1.5+), or
//! both in a hybrid-reference file. Each section owns the entries it
//! declares plus its trailer/stream dictionary; `/Prev` links the chain of
//! incremental updates, and lookups walk it newest-to-oldest so that newer
//! definitions shadow older ones.
//!
//! Sections are immutable once constructed. The only post-construction
//! mutation is the lazily memoized `/Prev` link, which tolerates duplicate
//! computation under a race: parsing an older section is a pure function of
//! the immutable file bytes, so last-write-wins is safe.

use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef, dict_integer};
use crate::parser::{find_keyword, parse_indirect_object, parse_object};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Cap on `/Prev` recursion, against circular chains in malformed files.
const MAX_PREV_CHAIN: usize = 100;

/// Cap on a single declared subsection, against memory exhaustion from a
/// corrupt count.
const MAX_SUBSECTION_COUNT: u64 = 1_000_000;

/// How one object is materialized.
///
/// A closed sum type: an entry's variant never changes after registration;
/// corrections (e.g. by recovery) replace the entry wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Object is free (not in use)
    Free,
    /// Object data lives at a byte offset in the file
    Used {
        /// Byte offset of the object data
        offset: u64,
        /// Generation number
        generation: u16,
    },
    /// Object is stored inside a compressed object stream
    Compressed {
        /// The object stream containing this object (generation always 0)
        container: ObjectRef,
        /// Index of the object within the container's object list
        index: u32,
    },
}

/// Which format a section was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefSectionKind {
    /// Classic ASCII xref table
    Table,
    /// Binary cross-reference stream
    Stream,
}

/// One xref section: its entries, its dictionary, and a lazy link to the
/// previous (older) section of the incremental-update chain.
#[derive(Debug)]
pub struct XRefSection {
    kind: XRefSectionKind,
    /// Frozen after construction; shared readers never see mutation.
    entries: HashMap<ObjectRef, XRefEntry>,
    /// The section's trailer dictionary (table) or stream dictionary (stream).
    dict: HashMap<String, Object>,
    /// Shared immutable file view, kept for lazy `/Prev` resolution.
    buffer: Bytes,
    /// Outer `None` = not yet resolved; `Some(None)` = resolved, no previous
    /// section. Compute-outside-the-lock, last write wins.
    prev: RwLock<Option<Option<Arc<XRefSection>>>>,
}

impl XRefSection {
    /// Create an empty table-backed section with the given dictionary.
    ///
    /// Used by the recovery scanner, which harvests entries itself.
    pub fn new_table(dict: HashMap<String, Object>, buffer: Bytes) -> Self {
        Self {
            kind: XRefSectionKind::Table,
            entries: HashMap::new(),
            dict,
            buffer,
            prev: RwLock::new(None),
        }
    }

    /// Register a used entry. Free entries are never registered: absence
    /// from the map *is* the free state at this layer.
    pub fn add_used_entry(&mut self, object_number: u32, generation: u16, offset: u64) {
        self.entries.insert(
            ObjectRef::new(object_number, generation),
            XRefEntry::Used {
                offset,
                generation,
            },
        );
    }

    /// Whether an entry is already registered locally.
    pub fn contains(&self, r: ObjectRef) -> bool {
        self.entries.contains_key(&r)
    }

    /// Pin the `/Prev` link as "no previous section", skipping lazy
    /// resolution. The recovery scanner uses this: its scan already covered
    /// the whole file, and following a `/Prev` from a provisional trailer
    /// would re-enter the very structure that failed.
    pub fn seal_prev(&self) {
        *self.prev.write().unwrap_or_else(|e| e.into_inner()) = Some(None);
    }

    /// Which format this section was parsed from.
    pub fn kind(&self) -> XRefSectionKind {
        self.kind
    }

    /// The section's own trailer/stream dictionary.
    pub fn dict(&self) -> &HashMap<String, Object> {
        &self.dict
    }

    /// Number of locally registered entries (chain not followed).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether this section registers no entries of its own.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry locally, without following the chain.
    pub fn local_entry(&self, r: ObjectRef) -> Option<XRefEntry> {
        self.entries.get(&r).copied()
    }

    /// Look up an entry, following the `/Prev` chain of older sections.
    ///
    /// `Ok(None)` is the normal outcome for a dangling reference anywhere in
    /// the chain. `Err` means an older section could not be parsed and the
    /// caller may fall back to recovery.
    pub fn entry(&self, r: ObjectRef) -> Result<Option<XRefEntry>> {
        self.entry_at_depth(r, 0)
    }

    fn entry_at_depth(&self, r: ObjectRef, depth: usize) -> Result<Option<XRefEntry>> {
        if let Some(entry) = self.entries.get(&r) {
            return Ok(Some(*entry));
        }
        if depth >= MAX_PREV_CHAIN {
            return Err(Error::XrefState(format!(
                "/Prev chain depth exceeded {}",
                MAX_PREV_CHAIN
            )));
        }
        match self.resolve_prev()? {
            Some(prev) => prev.entry_at_depth(r, depth + 1),
            None => Ok(None),
        }
    }

    /// Resolve the previous section declared by `/Prev`, memoizing the
    /// result. Two threads racing here both parse the same immutable bytes
    /// and store equal results; the memo is not a lock around the parse.
    fn resolve_prev(&self) -> Result<Option<Arc<XRefSection>>> {
        if let Some(link) = self
            .prev
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            return Ok(link);
        }

        let resolved = match dict_integer(&self.dict, "Prev") {
            Some(offset) if offset >= 0 => {
                log::debug!("resolving /Prev section at offset {}", offset);
                Some(parse_xref_section(&self.buffer, offset as u64)?)
            }
            Some(offset) => {
                log::warn!("ignoring negative /Prev offset {}", offset);
                None
            }
            None => None,
        };

        // Parse failures are not memoized; the next lookup may retry, and
        // the caller typically falls back to recovery anyway.
        *self.prev.write().unwrap_or_else(|e| e.into_inner()) = Some(resolved.clone());
        Ok(resolved)
    }
}

/// The aggregate index for one document revision: the registered sections in
/// lookup order plus the state of any recovery that produced it.
#[derive(Debug)]
pub struct XRefRoot {
    /// `[primary, hybrid?]` in registration order.
    sections: Vec<Arc<XRefSection>>,
    start_xref_offset: u64,
    recovered: bool,
    recovery_failed: bool,
}

impl XRefRoot {
    /// Load the primary xref section at the declared offset, plus the hybrid
    /// stream section when the primary table declares `/XRefStm`.
    ///
    /// # Errors
    ///
    /// `Error::XrefState` when the offset is out of bounds or the construct
    /// there is unrecognizable; parse/corruption errors from the section
    /// parsers. All of these are recoverable via the recovery scanner.
    pub fn initialize(buffer: &Bytes, start_xref_offset: u64) -> Result<Self> {
        if start_xref_offset >= buffer.len() as u64 {
            return Err(Error::XrefState(format!(
                "startxref offset {} beyond end of file ({} bytes)",
                start_xref_offset,
                buffer.len()
            )));
        }

        let primary = parse_xref_section(buffer, start_xref_offset)?;
        let mut sections = vec![Arc::clone(&primary)];

        // Hybrid-reference file: the classic table points at a supplementary
        // compressed stream section via /XRefStm.
        if primary.kind() == XRefSectionKind::Table {
            if let Some(stm_offset) = dict_integer(primary.dict(), "XRefStm") {
                log::debug!("hybrid-reference file: /XRefStm at offset {}", stm_offset);
                if stm_offset < 0 || stm_offset >= buffer.len() as i64 {
                    return Err(Error::XrefState(format!(
                        "/XRefStm offset {} beyond end of file",
                        stm_offset
                    )));
                }
                let hybrid = parse_stream_section(buffer, stm_offset as u64)?;
                sections.push(Arc::new(hybrid));
            }
        }

        Ok(Self {
            sections,
            start_xref_offset,
            recovered: false,
            recovery_failed: false,
        })
    }

    /// Build a root from recovered sections.
    pub(crate) fn from_recovery(sections: Vec<Arc<XRefSection>>, recovery_failed: bool) -> Self {
        Self {
            sections,
            start_xref_offset: 0,
            recovered: true,
            recovery_failed,
        }
    }

    /// Locate the entry for a reference.
    ///
    /// Registered sections are consulted in registration order, so when a
    /// malformed hybrid file defines the same reference in both the table
    /// and the stream, the table's definition wins: pre-1.5 readers only
    /// see the table, and agreeing with them keeps renderers consistent.
    pub fn load_object(&self, r: ObjectRef) -> Result<Option<XRefEntry>> {
        for section in &self.sections {
            if let Some(entry) = section.entry(r)? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// The registered sections, `[primary, hybrid?]`.
    pub fn sections(&self) -> &[Arc<XRefSection>] {
        &self.sections
    }

    /// The primary section's trailer/stream dictionary.
    pub fn trailer_dict(&self) -> &HashMap<String, Object> {
        self.sections[0].dict()
    }

    /// Offset the primary section was parsed from (0 for a recovered root).
    pub fn start_xref_offset(&self) -> u64 {
        self.start_xref_offset
    }

    /// Whether this root was produced by the recovery scanner.
    pub fn is_recovered(&self) -> bool {
        self.recovered
    }

    /// Whether recovery ran and harvested nothing usable.
    pub fn recovery_failed(&self) -> bool {
        self.recovery_failed
    }

    /// Total entries registered across sections (chains not followed).
    pub fn len(&self) -> usize {
        self.sections.iter().map(|s| s.len()).sum()
    }

    /// Whether no section registers any entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parse the xref construct at `offset`, sniffing table vs. stream.
///
/// A classic table starts with the `xref` keyword; a cross-reference stream
/// starts with the `N G obj` header of its stream object. When the sniff
/// says stream but stream parsing fails, a table parse is attempted before
/// giving up, mirroring how tolerant readers behave.
pub fn parse_xref_section(buffer: &Bytes, offset: u64) -> Result<Arc<XRefSection>> {
    if offset >= buffer.len() as u64 {
        return Err(Error::XrefState(format!(
            "xref offset {} beyond end of file ({} bytes)",
            offset,
            buffer.len()
        )));
    }

    let data = &buffer[offset as usize..];
    let head_len = data.len().min(20);
    let head: &[u8] = &data[..head_len];
    let trimmed = head
        .iter()
        .position(|&c| !crate::lexer::is_pdf_whitespace(c))
        .map(|p| &head[p..])
        .unwrap_or(b"");

    if trimmed.starts_with(b"xref") {
        log::debug!("classic xref table at offset {}", offset);
        return Ok(Arc::new(parse_table_section(buffer, offset)?));
    }

    if trimmed.first().is_some_and(|c| c.is_ascii_digit()) {
        match parse_stream_section(buffer, offset) {
            Ok(section) => return Ok(Arc::new(section)),
            Err(stream_err) => {
                log::debug!("xref stream parse failed at offset {}: {}", offset, stream_err);
                match parse_table_section(buffer, offset) {
                    Ok(section) => return Ok(Arc::new(section)),
                    Err(table_err) => {
                        return Err(Error::XrefState(format!(
                            "unparseable xref at offset {} (stream attempt: {}; table attempt: {})",
                            offset, stream_err, table_err
                        )));
                    }
                }
            }
        }
    }

    Err(Error::XrefState(format!(
        "no xref construct at offset {}",
        offset
    )))
}

/// Parse a classic ASCII xref table plus its trailer dictionary.
///
/// Format:
///
/// ```text
/// xref
/// 0 3
/// 0000000000 65535 f
/// 0000000018 00000 n
/// 0000000154 00000 n
/// trailer
/// << /Size 3 /Root 1 0 R >>
/// ```
///
/// Lenient where the wild demands it: CR/LF/CRLF line endings, blank lines
/// and comments inside the table, malformed entries (skipped with a warning)
/// and an early `trailer`.
pub fn parse_table_section(buffer: &Bytes, offset: u64) -> Result<XRefSection> {
    let region = &buffer[offset as usize..];

    let trailer_pos = find_keyword(region, b"trailer");
    let body = &region[..trailer_pos.unwrap_or(region.len())];

    let mut entries = HashMap::new();
    let mut lines = split_lines(body).into_iter();

    // The construct must open with the xref keyword
    loop {
        match lines.next() {
            Some(line) => {
                let line = trim_bytes(line);
                if line.is_empty() {
                    continue;
                }
                if line.starts_with(b"xref") {
                    break;
                }
                return Err(Error::XrefState(format!(
                    "expected xref keyword at offset {}",
                    offset
                )));
            }
            None => {
                return Err(Error::XrefState(format!(
                    "no xref table content at offset {}",
                    offset
                )));
            }
        }
    }

    // Subsections: "start count" header, then `count` entry lines
    'subsections: while let Some(line) = lines.next() {
        let line = trim_bytes(line);
        if line.is_empty() || line.starts_with(b"%") {
            continue;
        }

        let mut header = line.split(|c: &u8| c.is_ascii_whitespace()).filter(|t| !t.is_empty());
        let (start, count) = match (
            header.next().and_then(parse_ascii::<u32>),
            header.next().and_then(parse_ascii::<u64>),
        ) {
            (Some(start), Some(count)) => (start, count),
            _ => {
                log::warn!("skipping malformed xref subsection header: {:?}", String::from_utf8_lossy(line));
                continue;
            }
        };

        if count > MAX_SUBSECTION_COUNT {
            return Err(Error::XrefState(format!(
                "xref subsection count {} exceeds limit",
                count
            )));
        }
        // Object numbers are 32-bit; a start/count pair that walks past
        // u32::MAX is structurally invalid, not merely lenient-skippable
        if start as u64 + count > u32::MAX as u64 + 1 {
            return Err(Error::XrefState(format!(
                "xref subsection ({}, {}) exceeds the object number space",
                start, count
            )));
        }

        let mut i: u32 = 0;
        while (i as u64) < count {
            let Some(line) = lines.next() else {
                log::warn!("xref table truncated: expected {} entries, got {}", count, i);
                break 'subsections;
            };
            let line = trim_bytes(line);
            if line.is_empty() {
                continue;
            }

            let mut parts = line.split(|c: &u8| c.is_ascii_whitespace()).filter(|t| !t.is_empty());
            let parsed = (
                parts.next().and_then(parse_ascii::<u64>),
                parts.next().and_then(parse_ascii::<u16>),
                parts.next(),
            );
            match parsed {
                (Some(obj_offset), Some(generation), Some(flag)) => {
                    match flag.first().map(u8::to_ascii_lowercase) {
                        Some(b'n') => {
                            entries.insert(
                                ObjectRef::new(start + i, generation),
                                XRefEntry::Used {
                                    offset: obj_offset,
                                    generation,
                                },
                            );
                        }
                        Some(b'f') => {} // free objects are simply not registered
                        other => {
                            log::warn!(
                                "invalid xref entry flag {:?} for object {}, treating as free",
                                other.map(|c| c as char),
                                start + i
                            );
                        }
                    }
                }
                _ => {
                    log::warn!(
                        "skipping malformed xref entry for object {}: {:?}",
                        start + i,
                        String::from_utf8_lossy(line)
                    );
                }
            }
            i += 1;
        }
    }

    let dict = match trailer_pos {
        Some(pos) => {
            let after = &region[pos + b"trailer".len()..];
            match parse_object(after) {
                Ok((_, Object::Dictionary(dict))) => dict,
                Ok((_, other)) => {
                    return Err(Error::XrefState(format!(
                        "trailer is not a dictionary (found {:?})",
                        std::mem::discriminant(&other)
                    )));
                }
                Err(e) => {
                    return Err(Error::Parse {
                        offset: offset as usize + pos,
                        reason: format!("failed to parse trailer dictionary: {}", e),
                    });
                }
            }
        }
        None => {
            log::warn!("xref table at offset {} has no trailer keyword", offset);
            HashMap::new()
        }
    };

    Ok(XRefSection {
        kind: XRefSectionKind::Table,
        entries,
        dict,
        buffer: buffer.clone(),
        prev: RwLock::new(None),
    })
}

/// Parse a cross-reference stream section (PDF 1.5+).
///
/// The construct is an ordinary indirect stream object whose dictionary
/// carries `/Type /XRef`, `/Size`, optional `/Index`, and `/W`; the decoded
/// payload is a packed big-endian entry array.
pub fn parse_stream_section(buffer: &Bytes, offset: u64) -> Result<XRefSection> {
    let data = &buffer[offset as usize..];
    let (_, obj) = parse_indirect_object(data)?;

    let (dict, raw) = match obj {
        Object::Stream { dict, data } => (dict, data),
        _ => {
            return Err(Error::XrefState(format!(
                "object at offset {} is not a stream",
                offset
            )));
        }
    };

    if let Some(type_name) = dict.get("Type").and_then(Object::as_name) {
        if type_name != "XRef" {
            return Err(Error::XrefState(format!(
                "expected /Type /XRef, found /{}",
                type_name
            )));
        }
    }

    let decoded = crate::decoders::decode_xref_stream_data(&raw, &dict)?;

    let size = dict_integer(&dict, "Size")
        .ok_or_else(|| Error::XrefState("xref stream missing /Size".to_string()))?;

    let widths = parse_w_array(&dict)?;
    let index = parse_index_pairs(&dict, size)?;

    let entries = decode_stream_entries(&decoded, &index, widths)?;

    Ok(XRefSection {
        kind: XRefSectionKind::Stream,
        entries,
        dict,
        buffer: buffer.clone(),
        prev: RwLock::new(None),
    })
}

/// Extract `/W`: exactly three field widths.
fn parse_w_array(dict: &HashMap<String, Object>) -> Result<[usize; 3]> {
    let w = dict
        .get("W")
        .and_then(Object::as_array)
        .ok_or_else(|| Error::XrefState("xref stream missing /W array".to_string()))?;
    if w.len() != 3 {
        return Err(Error::XrefState(format!("/W has {} elements, expected 3", w.len())));
    }

    let mut widths = [0usize; 3];
    for (i, value) in w.iter().enumerate() {
        let width = value
            .as_integer()
            .ok_or_else(|| Error::XrefState(format!("/W[{}] is not an integer", i)))?;
        if !(0..=8).contains(&width) {
            return Err(Error::XrefState(format!("/W[{}] width {} out of range", i, width)));
        }
        widths[i] = width as usize;
    }
    Ok(widths)
}

/// Extract `/Index` subsection pairs, defaulting to `[(0, Size)]`.
fn parse_index_pairs(dict: &HashMap<String, Object>, size: i64) -> Result<Vec<(u32, u32)>> {
    let Some(index) = dict.get("Index") else {
        let size = u32::try_from(size)
            .map_err(|_| Error::XrefState(format!("invalid /Size {}", size)))?;
        return Ok(vec![(0, size)]);
    };

    let array = index
        .as_array()
        .ok_or_else(|| Error::XrefState("/Index is not an array".to_string()))?;
    if array.len() % 2 != 0 {
        return Err(Error::XrefState(format!(
            "/Index has odd length {}",
            array.len()
        )));
    }

    let mut pairs = Vec::with_capacity(array.len() / 2);
    for pair in array.chunks(2) {
        let start = pair[0]
            .as_integer()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| Error::XrefState("invalid /Index start".to_string()))?;
        let count = pair[1]
            .as_integer()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| Error::XrefState("invalid /Index count".to_string()))?;
        if count as u64 > MAX_SUBSECTION_COUNT {
            return Err(Error::XrefState(format!(
                "/Index subsection count {} exceeds limit",
                count
            )));
        }
        pairs.push((start, count));
    }
    Ok(pairs)
}

/// Decode the packed entry array of a cross-reference stream.
///
/// Per entry: `w0` bytes of type (default type 1 when `w0 == 0`), then `w1`
/// and `w2` bytes whose meaning depends on the type:
///
/// - type 0 (free): next-free hint and generation, consumed for cursor
///   alignment but registered as nothing
/// - type 1 (used): byte offset, generation (0 when `w2 == 0`)
/// - type 2 (compressed): container stream object number (gen implicitly 0),
///   index within the container
///
/// Running out of bytes mid-entry is `Error::XrefCorrupt`: the declared
/// subsections promised more entries than the payload holds.
pub fn decode_stream_entries(
    data: &[u8],
    index: &[(u32, u32)],
    widths: [usize; 3],
) -> Result<HashMap<ObjectRef, XRefEntry>> {
    let [w0, w1, w2] = widths;
    let entry_size = w0 + w1 + w2;
    if entry_size == 0 {
        return Err(Error::XrefState("/W declares zero-width entries".to_string()));
    }

    let mut entries = HashMap::new();
    let mut pos = 0usize;

    for &(start, count) in index {
        // Reject subsections that would walk object numbers past u32::MAX;
        // the wraparound would register entries under the wrong numbers
        if start as u64 + count as u64 > u32::MAX as u64 + 1 {
            return Err(Error::XrefCorrupt(format!(
                "/Index subsection ({}, {}) exceeds the object number space",
                start, count
            )));
        }
        for i in 0..count {
            if pos + entry_size > data.len() {
                return Err(Error::XrefCorrupt(format!(
                    "stream data ends at byte {} but subsection ({}, {}) declares more entries",
                    data.len(),
                    start,
                    count
                )));
            }

            let object_number = start + i;
            let entry_type = if w0 == 0 {
                1
            } else {
                read_int(&data[pos..pos + w0])
            };
            let field2 = read_int(&data[pos + w0..pos + w0 + w1]);
            let field3 = read_int(&data[pos + w0 + w1..pos + entry_size]);
            pos += entry_size;

            match entry_type {
                0 => {} // free: consumed for alignment, not registered
                1 => {
                    let generation = field3 as u16;
                    entries.insert(
                        ObjectRef::new(object_number, generation),
                        XRefEntry::Used {
                            offset: field2,
                            generation,
                        },
                    );
                }
                2 => {
                    entries.insert(
                        ObjectRef::new(object_number, 0),
                        XRefEntry::Compressed {
                            container: ObjectRef::new(field2 as u32, 0),
                            index: field3 as u32,
                        },
                    );
                }
                other => {
                    // The spec reserves unknown types; skipping keeps the
                    // cursor aligned and salvages the rest of the section
                    log::warn!(
                        "unknown xref entry type {} for object {}, skipping",
                        other,
                        object_number
                    );
                }
            }
        }
    }

    Ok(entries)
}

/// Read a big-endian unsigned integer from up to 8 bytes.
fn read_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Split on LF, CRLF, or lone CR; classic tables predate consistent line
/// endings.
fn split_lines(data: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'\n' => {
                lines.push(&data[start..i]);
                i += 1;
                start = i;
            }
            b'\r' => {
                lines.push(&data[start..i]);
                i += 1;
                if i < data.len() && data[i] == b'\n' {
                    i += 1;
                }
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < data.len() {
        lines.push(&data[start..]);
    }
    lines
}

fn trim_bytes(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(|c| !c.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|c| !c.is_ascii_whitespace())
        .map(|p| p + 1)
        .unwrap_or(start);
    &line[start..end]
}

fn parse_ascii<T: std::str::FromStr>(token: &[u8]) -> Option<T> {
    std::str::from_utf8(token).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_bytes(text: &str) -> Bytes {
        Bytes::copy_from_slice(text.as_bytes())
    }

    #[test]
    fn test_parse_table_single_subsection() {
        let buf = table_bytes(
            "xref\n\
             0 3\n\
             0000000000 65535 f \n\
             0000000018 00000 n \n\
             0000000154 00000 n \n\
             trailer\n\
             << /Size 3 >>\n",
        );
        let section = parse_table_section(&buf, 0).unwrap();
        assert_eq!(section.kind(), XRefSectionKind::Table);
        // Only used entries are registered; object 0 is free
        assert_eq!(section.len(), 2);
        assert_eq!(
            section.local_entry(ObjectRef::new(1, 0)),
            Some(XRefEntry::Used { offset: 18, generation: 0 })
        );
        assert_eq!(
            section.local_entry(ObjectRef::new(2, 0)),
            Some(XRefEntry::Used { offset: 154, generation: 0 })
        );
        assert_eq!(section.local_entry(ObjectRef::new(0, 65535)), None);
        assert_eq!(dict_integer(section.dict(), "Size"), Some(3));
    }

    #[test]
    fn test_parse_table_multiple_subsections_with_gap() {
        let buf = table_bytes(
            "xref\n\
             0 2\n\
             0000000000 65535 f \n\
             0000000018 00000 n \n\
             5 2\n\
             0000000200 00000 n \n\
             0000000300 00002 n \n\
             trailer\n\
             << /Size 7 >>\n",
        );
        let section = parse_table_section(&buf, 0).unwrap();
        assert_eq!(section.len(), 3);
        assert!(section.local_entry(ObjectRef::new(5, 0)).is_some());
        assert_eq!(
            section.local_entry(ObjectRef::new(6, 2)),
            Some(XRefEntry::Used { offset: 300, generation: 2 })
        );
        // The gap stays unregistered
        assert_eq!(section.local_entry(ObjectRef::new(3, 0)), None);
    }

    #[test]
    fn test_parse_table_cr_only_line_endings() {
        let buf = table_bytes("xref\r0 2\r0000000000 65535 f\r0000000042 00000 n\rtrailer\r<< /Size 2 >>");
        let section = parse_table_section(&buf, 0).unwrap();
        assert_eq!(
            section.local_entry(ObjectRef::new(1, 0)),
            Some(XRefEntry::Used { offset: 42, generation: 0 })
        );
    }

    #[test]
    fn test_parse_table_malformed_entry_is_skipped() {
        let buf = table_bytes(
            "xref\n\
             0 2\n\
             garbage entry here\n\
             0000000099 00000 n \n\
             trailer\n\
             << /Size 2 >>\n",
        );
        let section = parse_table_section(&buf, 0).unwrap();
        // Slot 0 malformed (skipped), slot 1 registered
        assert_eq!(section.len(), 1);
        assert!(section.local_entry(ObjectRef::new(1, 0)).is_some());
    }

    #[test]
    fn test_parse_table_excessive_count_rejected() {
        let buf = table_bytes("xref\n0 2000000\n0000000000 65535 f\ntrailer\n<< >>\n");
        assert!(parse_table_section(&buf, 0).is_err());
    }

    #[test]
    fn test_parse_table_requires_xref_keyword() {
        let buf = table_bytes("notxref\n0 1\n0000000000 65535 f\ntrailer\n<< >>\n");
        assert!(parse_table_section(&buf, 0).is_err());
    }

    #[test]
    fn test_parse_table_without_trailer_keeps_entries() {
        let buf = table_bytes("xref\n0 2\n0000000000 65535 f \n0000000011 00000 n \n");
        let section = parse_table_section(&buf, 0).unwrap();
        assert_eq!(section.len(), 1);
        assert!(section.dict().is_empty());
    }

    #[test]
    fn test_decode_stream_entries_w_142() {
        // Three entries, W = [1 4 2]: free, used, compressed
        let mut data = Vec::new();
        data.extend_from_slice(&[0, 0, 0, 0, 0, 0xFF, 0xFF]); // free
        data.extend_from_slice(&[1, 0, 0, 0x30, 0x39, 0, 7]); // used @12345 gen 7
        data.extend_from_slice(&[2, 0, 0, 0, 9, 0, 3]); // in stream 9, index 3
        let entries = decode_stream_entries(&data, &[(0, 3)], [1, 4, 2]).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries.get(&ObjectRef::new(1, 7)),
            Some(&XRefEntry::Used { offset: 12345, generation: 7 })
        );
        assert_eq!(
            entries.get(&ObjectRef::new(2, 0)),
            Some(&XRefEntry::Compressed {
                container: ObjectRef::new(9, 0),
                index: 3
            })
        );
    }

    #[test]
    fn test_decode_stream_entries_default_type_when_w0_zero() {
        // W = [0 2 1]: every entry is implicitly type 1 (used)
        let data = [0x01, 0x00, 0x00, 0x02, 0x00, 0x05];
        let entries = decode_stream_entries(&data, &[(4, 2)], [0, 2, 1]).unwrap();
        assert_eq!(
            entries.get(&ObjectRef::new(4, 0)),
            Some(&XRefEntry::Used { offset: 256, generation: 0 })
        );
        assert_eq!(
            entries.get(&ObjectRef::new(5, 5)),
            Some(&XRefEntry::Used { offset: 512, generation: 5 })
        );
    }

    #[test]
    fn test_decode_stream_entries_default_generation_when_w2_zero() {
        let data = [1, 0, 77];
        let entries = decode_stream_entries(&data, &[(2, 1)], [1, 2, 0]).unwrap();
        assert_eq!(
            entries.get(&ObjectRef::new(2, 0)),
            Some(&XRefEntry::Used { offset: 77, generation: 0 })
        );
    }

    #[test]
    fn test_parse_table_subsection_start_overflow_rejected() {
        // Start near u32::MAX with a count that walks past it
        let buf = table_bytes(
            "xref\n\
             4294967295 2\n\
             0000000010 00000 n \n\
             0000000020 00000 n \n\
             trailer\n\
             << /Size 2 >>\n",
        );
        assert!(matches!(parse_table_section(&buf, 0), Err(Error::XrefState(_))));
    }

    #[test]
    fn test_parse_table_highest_object_number_accepted() {
        let buf = table_bytes(
            "xref\n4294967295 1\n0000000010 00000 n \ntrailer\n<< /Size 1 >>\n",
        );
        let section = parse_table_section(&buf, 0).unwrap();
        assert!(section.local_entry(ObjectRef::new(u32::MAX, 0)).is_some());
    }

    #[test]
    fn test_decode_stream_entries_start_overflow_is_corrupt() {
        let data = [1, 10, 0, 1, 20, 0];
        let err = decode_stream_entries(&data, &[(u32::MAX, 2)], [1, 1, 1]).unwrap_err();
        assert!(matches!(err, Error::XrefCorrupt(_)));
        // The boundary itself is still addressable
        let ok = decode_stream_entries(&[1, 10, 0], &[(u32::MAX, 1)], [1, 1, 1]).unwrap();
        assert!(ok.contains_key(&ObjectRef::new(u32::MAX, 0)));
    }

    #[test]
    fn test_decode_stream_entries_truncation_is_corrupt() {
        let data = [1, 0, 0, 0, 10, 0, 0]; // one full entry, then nothing
        let err = decode_stream_entries(&data, &[(0, 2)], [1, 4, 2]).unwrap_err();
        assert!(matches!(err, Error::XrefCorrupt(_)));
    }

    #[test]
    fn test_decode_stream_entries_multiple_subsections() {
        let data = [1, 10, 0, 1, 20, 0, 1, 30, 0];
        let entries = decode_stream_entries(&data, &[(0, 1), (40, 2)], [1, 1, 1]).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.contains_key(&ObjectRef::new(0, 0)));
        assert!(entries.contains_key(&ObjectRef::new(40, 0)));
        assert!(entries.contains_key(&ObjectRef::new(41, 0)));
    }

    #[test]
    fn test_read_int_big_endian() {
        assert_eq!(read_int(&[]), 0);
        assert_eq!(read_int(&[0x12]), 0x12);
        assert_eq!(read_int(&[0x01, 0x00]), 256);
        assert_eq!(read_int(&[0xFF, 0xFF, 0xFF, 0xFF]), 0xFFFF_FFFF);
    }

    #[test]
    fn test_chain_lookup_and_shadowing() {
        // Oldest section at offset 0 defines objects 1 and 2; the middle
        // section redefines object 2; the newest defines only object 3.
        let mut file = Vec::new();
        file.extend_from_slice(
            b"xref\n0 3\n0000000000 65535 f \n0000000100 00000 n \n0000000200 00000 n \ntrailer\n<< /Size 3 >>\n",
        );
        let s1_offset = file.len();
        file.extend_from_slice(
            b"xref\n2 1\n0000000250 00000 n \ntrailer\n<< /Size 3 /Prev 0 >>\n",
        );
        let s0_offset = file.len();
        file.extend_from_slice(
            format!(
                "xref\n3 1\n0000000300 00000 n \ntrailer\n<< /Size 4 /Prev {} >>\n",
                s1_offset
            )
            .as_bytes(),
        );
        let buf = Bytes::from(file);

        let newest = parse_xref_section(&buf, s0_offset as u64).unwrap();

        // Defined only in the oldest section
        assert_eq!(
            newest.entry(ObjectRef::new(1, 0)).unwrap(),
            Some(XRefEntry::Used { offset: 100, generation: 0 })
        );
        // Defined in both older sections: the middle one shadows the oldest
        assert_eq!(
            newest.entry(ObjectRef::new(2, 0)).unwrap(),
            Some(XRefEntry::Used { offset: 250, generation: 0 })
        );
        // Defined locally
        assert_eq!(
            newest.entry(ObjectRef::new(3, 0)).unwrap(),
            Some(XRefEntry::Used { offset: 300, generation: 0 })
        );
        // Dangling reference resolves to absence, not an error
        assert_eq!(newest.entry(ObjectRef::new(99, 0)).unwrap(), None);
    }

    #[test]
    fn test_circular_prev_chain_is_detected() {
        // A section whose /Prev points back at itself
        let text = "xref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 1 /Prev 0 >>\n";
        let buf = Bytes::copy_from_slice(text.as_bytes());
        let section = parse_xref_section(&buf, 0).unwrap();
        assert!(section.entry(ObjectRef::new(50, 0)).is_err());
    }

    #[test]
    fn test_sealed_prev_is_not_followed() {
        let text = "xref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 1 /Prev 999999 >>\n";
        let buf = Bytes::copy_from_slice(text.as_bytes());
        let section = parse_xref_section(&buf, 0).unwrap();
        section.seal_prev();
        // /Prev points out of bounds, but the sealed link never parses it
        assert_eq!(section.entry(ObjectRef::new(4, 0)).unwrap(), None);
    }

    #[test]
    fn test_initialize_rejects_out_of_bounds_offset() {
        let buf = Bytes::copy_from_slice(b"%PDF-1.4\n");
        assert!(matches!(
            XRefRoot::initialize(&buf, 5000),
            Err(Error::XrefState(_))
        ));
    }

    #[test]
    fn test_root_lookup_miss_is_none() {
        let text = "xref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 1 >>\n";
        let buf = Bytes::copy_from_slice(text.as_bytes());
        let root = XRefRoot::initialize(&buf, 0).unwrap();
        assert_eq!(root.load_object(ObjectRef::new(77, 0)).unwrap(), None);
        assert!(!root.is_recovered());
    }
}
