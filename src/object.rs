//! PDF object values, as far as indexing needs them.
//!
//! The indexer only inspects dictionary keys (`/Prev`, `/XRefStm`, `/Size`,
//! `/Index`, `/W`, `/Filter`, `/Type`, ...) and integers, but the trailer and
//! xref stream dictionaries it parses can contain any PDF value, so the full
//! value enum is kept.

use std::collections::HashMap;

/// Reference to an indirect object: object number plus generation.
///
/// This is the key of every cross-reference lookup. Equality and hashing use
/// both fields; an object revised at a new generation is a distinct key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// String (raw bytes; escape sequences are not interpreted because
    /// indexing never looks inside string contents)
    String(Vec<u8>),
    /// Name (without the leading /)
    Name(String),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary (key-value pairs)
    Dictionary(HashMap<String, Object>),
    /// Stream (dictionary + raw, still-encoded data)
    Stream {
        /// Stream dictionary
        dict: HashMap<String, Object>,
        /// Raw stream data as it appears in the file
        data: bytes::Bytes,
    },
    /// Indirect object reference
    Reference(ObjectRef),
}

impl Object {
    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both Dictionary and Stream objects.
    pub fn as_dict(&self) -> Option<&HashMap<String, Object>> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }
}

/// Read a dictionary value as an integer, looking through nothing: the
/// indexing keys (`/Prev`, `/XRefStm`, `/Size`) are required to be direct
/// integers by the format.
pub fn dict_integer(dict: &HashMap<String, Object>, key: &str) -> Option<i64> {
    dict.get(key).and_then(Object::as_integer)
}
