#![warn(missing_docs)]

//! # pdf_xref
//!
//! Cross-reference and recovery indexing for PDF files: locate the trailer,
//! parse classic xref tables and cross-reference streams (including hybrid
//! files), walk `/Prev` incremental-update chains, and, when the declared
//! structure is broken, rebuild the object index by scanning the raw bytes
//! for indirect object headers.
//!
//! ## Quick start
//!
//! ```ignore
//! use pdf_xref::{DocumentIndex, ObjectRef, XRefEntry};
//!
//! let data = std::fs::read("file.pdf")?;
//! let index = DocumentIndex::open(data)?;
//!
//! match index.entry(ObjectRef::new(1, 0)) {
//!     Some(XRefEntry::Used { offset, .. }) => println!("object 1 at byte {offset}"),
//!     Some(XRefEntry::Compressed { container, index }) => {
//!         println!("object 1 is entry {index} of stream {container}")
//!     }
//!     Some(XRefEntry::Free) | None => println!("object 1 is free"),
//! }
//! ```
//!
//! ## Layers
//!
//! - [`header`] / [`trailer`]: locate the `%PDF-` marker (trimming leading
//!   junk) and the `startxref` offset in the file tail
//! - [`lexer`] / [`parser`]: tokenize and parse the PDF values the indexer
//!   reads (trailer and stream dictionaries, indirect object wrappers)
//! - [`decoders`]: FlateDecode and predictor reversal for stream payloads
//! - [`xref`]: sections, entry decoding, `/Prev` chain resolution
//! - [`xref_reconstruction`]: the forensic fallback scanner
//! - [`document`]: the [`DocumentIndex`] facade tying it all together

pub mod decoders;
pub mod document;
pub mod error;
pub mod header;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod trailer;
pub mod xref;
pub mod xref_reconstruction;

pub use document::DocumentIndex;
pub use error::{Error, Result};
pub use header::Header;
pub use object::{Object, ObjectRef};
pub use xref::{XRefEntry, XRefRoot, XRefSection, XRefSectionKind};
