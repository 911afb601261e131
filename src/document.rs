//! Document-level index facade.
//!
//! Ties the layers together: trim the header, locate `startxref`, load the
//! xref chain, and fall back to forensic recovery when the declared
//! structure is unusable, either at open time or later when a lazily parsed
//! `/Prev` section turns out to be corrupt.

use crate::error::Result;
use crate::header::Header;
use crate::object::{Object, ObjectRef};
use crate::trailer;
use crate::xref::{XRefEntry, XRefRoot};
use crate::xref_reconstruction;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// The cross-reference index of one PDF file.
///
/// Shared-reader safe: lookups never block each other, and a recovery swap
/// installs a new root atomically while in-flight readers keep the root they
/// started with.
#[derive(Debug)]
pub struct DocumentIndex {
    header: Header,
    /// View starting at the `%PDF-` marker; all offsets are relative to it.
    buffer: Bytes,
    root: RwLock<Arc<XRefRoot>>,
    /// Recovery runs at most once per document.
    recovery_attempted: AtomicBool,
}

impl DocumentIndex {
    /// Build the index for a file's bytes.
    ///
    /// Walks the declared structure first; when the trailer is missing, the
    /// startxref offset is unusable, the primary section will not parse, or
    /// the declared index is empty, falls back to scanning recovery.
    ///
    /// # Errors
    ///
    /// Only `Error::Io` escapes; every structural failure is absorbed by
    /// recovery (possibly yielding an index that reports
    /// [`DocumentIndex::recovery_failed`]).
    pub fn open(data: impl Into<Bytes>) -> Result<Self> {
        let raw: Bytes = data.into();
        let (header, buffer) = Header::parse(&raw);
        log::debug!(
            "opening document: version {}, {} bytes{}",
            header.version,
            buffer.len(),
            if header.has_leading_garbage { " (leading garbage trimmed)" } else { "" }
        );

        let (root, recovery_attempted) = match Self::load_declared(&buffer) {
            Ok(root) if !root.is_empty() => (root, false),
            Ok(_) => {
                log::warn!("declared xref structure registers no entries, reconstructing");
                (xref_reconstruction::recover(&buffer), true)
            }
            Err(e) if e.is_recoverable() => {
                log::warn!("failed to read xref structure ({}), reconstructing", e);
                (xref_reconstruction::recover(&buffer), true)
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            header,
            buffer,
            root: RwLock::new(Arc::new(root)),
            recovery_attempted: AtomicBool::new(recovery_attempted),
        })
    }

    fn load_declared(buffer: &Bytes) -> Result<XRefRoot> {
        let start_xref_offset = trailer::parse_xref_offset(buffer)?;
        log::debug!("startxref declares primary section at offset {}", start_xref_offset);
        XRefRoot::initialize(buffer, start_xref_offset)
    }

    /// Look up the entry for a reference.
    ///
    /// `None` means the object is free or undeclared. When the declared
    /// chain turns out to be corrupt mid-walk (a lazily parsed `/Prev`
    /// section fails), recovery runs once and the lookup is retried against
    /// the rebuilt index.
    pub fn entry(&self, r: ObjectRef) -> Option<XRefEntry> {
        let root = self.current_root();
        match root.load_object(r) {
            Ok(found) => found,
            Err(e) => {
                if self.recovery_attempted.swap(true, Ordering::SeqCst) {
                    log::warn!("lookup of {} failed after recovery: {}", r, e);
                    return None;
                }
                log::warn!("xref chain corrupt ({}), reconstructing", e);
                let rebuilt = Arc::new(xref_reconstruction::recover(&self.buffer));
                *self.root.write().unwrap_or_else(|p| p.into_inner()) = Arc::clone(&rebuilt);
                rebuilt.load_object(r).ok().flatten()
            }
        }
    }

    /// The parsed file header.
    pub fn header(&self) -> Header {
        self.header
    }

    /// The file view all entry offsets are relative to (leading junk before
    /// the `%PDF-` marker already trimmed).
    pub fn buffer(&self) -> &Bytes {
        &self.buffer
    }

    /// Snapshot of the current index root.
    pub fn current_root(&self) -> Arc<XRefRoot> {
        Arc::clone(&self.root.read().unwrap_or_else(|p| p.into_inner()))
    }

    /// The active trailer dictionary's value for `key`, if any.
    pub fn trailer_value(&self, key: &str) -> Option<Object> {
        self.current_root().trailer_dict().get(key).cloned()
    }

    /// Whether the index in use came from scanning recovery.
    pub fn is_recovered(&self) -> bool {
        self.current_root().is_recovered()
    }

    /// Whether recovery ran and produced an empty index.
    pub fn recovery_failed(&self) -> bool {
        self.current_root().recovery_failed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal well-formed classic file: two objects, a table, a trailer.
    fn classic_file() -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");
        let obj1 = out.len();
        out.extend_from_slice(b"1 0 obj\n<< /Type /Catalog >>\nendobj\n");
        let obj2 = out.len();
        out.extend_from_slice(b"2 0 obj\n<< /Type /Pages >>\nendobj\n");
        let xref = out.len();
        out.extend_from_slice(
            format!(
                "xref\n0 3\n0000000000 65535 f \n{:010} 00000 n \n{:010} 00000 n \n\
                 trailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                obj1, obj2, xref
            )
            .as_bytes(),
        );
        out
    }

    #[test]
    fn test_open_classic_file() {
        let data = classic_file();
        let doc = DocumentIndex::open(data.clone()).unwrap();
        assert!(!doc.is_recovered());
        assert_eq!(doc.header().version, 1.4);

        let obj1 = data.windows(7).position(|w| w == b"1 0 obj").unwrap() as u64;
        assert_eq!(
            doc.entry(ObjectRef::new(1, 0)),
            Some(XRefEntry::Used { offset: obj1, generation: 0 })
        );
        assert_eq!(doc.entry(ObjectRef::new(0, 65535)), None);
        assert_eq!(doc.entry(ObjectRef::new(99, 0)), None);
    }

    #[test]
    fn test_leading_garbage_offsets_stay_consistent() {
        // Junk before %PDF- shifts absolute positions; the table offsets were
        // written relative to the marker, and the trimmed view restores them
        let mut data = b"HTTP/1.1 200 OK\r\n\r\n".to_vec();
        data.extend_from_slice(&classic_file());
        let doc = DocumentIndex::open(data).unwrap();
        assert!(doc.header().has_leading_garbage);
        assert!(!doc.is_recovered());

        let Some(XRefEntry::Used { offset, .. }) = doc.entry(ObjectRef::new(1, 0)) else {
            panic!("object 1 not found");
        };
        assert!(doc.buffer()[offset as usize..].starts_with(b"1 0 obj"));
    }

    #[test]
    fn test_bogus_startxref_falls_back_to_recovery() {
        let mut data = Vec::new();
        data.extend_from_slice(b"%PDF-1.4\n");
        data.extend_from_slice(b"1 0 obj\n<< /Type /Catalog >>\nendobj\n");
        data.extend_from_slice(b"startxref\n999999\n%%EOF\n");
        let doc = DocumentIndex::open(data).unwrap();
        assert!(doc.is_recovered());
        assert!(doc.entry(ObjectRef::new(1, 0)).is_some());
    }

    #[test]
    fn test_missing_trailer_falls_back_to_recovery() {
        let data = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n".to_vec();
        let doc = DocumentIndex::open(data).unwrap();
        assert!(doc.is_recovered());
        assert!(!doc.recovery_failed());
    }

    #[test]
    fn test_hopeless_file_reports_failed_recovery() {
        let doc = DocumentIndex::open(&b"not a pdf in any way"[..]).unwrap();
        assert!(doc.is_recovered());
        assert!(doc.recovery_failed());
        assert_eq!(doc.entry(ObjectRef::new(1, 0)), None);
    }

    #[test]
    fn test_corrupt_prev_chain_triggers_recovery_on_lookup() {
        // Primary table is fine but /Prev points at garbage; the first
        // lookup that walks the chain swaps in a recovered index
        let mut data = Vec::new();
        data.extend_from_slice(b"%PDF-1.4\n");
        data.extend_from_slice(b"garbage region here\n");
        data.extend_from_slice(b"1 0 obj\n<< /Type /Catalog >>\nendobj\n");
        let xref = data.len();
        data.extend_from_slice(
            format!(
                "xref\n1 1\n0000000100 00000 n \ntrailer\n<< /Size 2 /Prev 9 >>\nstartxref\n{}\n%%EOF\n",
                xref
            )
            .as_bytes(),
        );
        let doc = DocumentIndex::open(data).unwrap();
        assert!(!doc.is_recovered());

        // Object 2 is not in the primary section; walking /Prev hits garbage
        let miss = doc.entry(ObjectRef::new(2, 0));
        assert_eq!(miss, None);
        assert!(doc.is_recovered());
        // The recovered index still resolves the real object
        assert!(doc.entry(ObjectRef::new(1, 0)).is_some());
    }

    #[test]
    fn test_trailer_value_accessor() {
        let doc = DocumentIndex::open(classic_file()).unwrap();
        assert_eq!(
            doc.trailer_value("Size").and_then(|v| v.as_integer()),
            Some(3)
        );
        assert!(doc.trailer_value("Encrypt").is_none());
    }
}
