//! Field paths for projecting parts of a decoded record
//!
//! A binding layer usually wants a handful of leaves out of a record, e.g.
//! `city.names.en` or `location.latitude`, and a stable "missing" answer
//! for anything that isn't there. A [`FieldPath`] names one such leaf as a
//! sequence of map keys and array indices.
//!
//! ```
//! use mmdb_reader::path::{FieldPath, PathElement};
//!
//! let path = FieldPath::from(["subdivisions", "0", "iso_code"]);
//! assert_eq!(path.elements()[1], PathElement::Key("0".to_string()));
//!
//! let path = FieldPath::new(vec![
//!     PathElement::Key("subdivisions".to_string()),
//!     PathElement::Index(-1),
//! ]);
//! assert_eq!(path.to_string(), "subdivisions.[-1]");
//! ```

use crate::data_section::DataValue;
use std::fmt;

/// One step of a [`FieldPath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathElement {
    /// Map key
    ///
    /// When the current value is an array and the key parses as an
    /// integer, it is used as an index instead (libmaxminddb semantics).
    Key(String),
    /// Array index; negative values count from the end (`-1` is the last)
    Index(isize),
}

impl PathElement {
    /// Resolve this element against an array of `len` elements
    ///
    /// Returns `None` if the element doesn't name an in-range index.
    pub fn array_index(&self, len: usize) -> Option<usize> {
        let raw = match self {
            PathElement::Index(i) => *i,
            PathElement::Key(k) => k.parse::<isize>().ok()?,
        };
        if raw >= 0 {
            let idx = raw as usize;
            (idx < len).then_some(idx)
        } else {
            len.checked_sub(raw.unsigned_abs())
        }
    }
}

impl From<&str> for PathElement {
    fn from(key: &str) -> Self {
        PathElement::Key(key.to_string())
    }
}

impl From<String> for PathElement {
    fn from(key: String) -> Self {
        PathElement::Key(key)
    }
}

impl From<isize> for PathElement {
    fn from(index: isize) -> Self {
        PathElement::Index(index)
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::Key(k) => write!(f, "{}", k),
            PathElement::Index(i) => write!(f, "[{}]", i),
        }
    }
}

/// A sequence of map-key / array-index steps into a decoded value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldPath {
    elements: Vec<PathElement>,
}

impl FieldPath {
    /// Build a path from explicit elements
    pub fn new(elements: Vec<PathElement>) -> Self {
        Self { elements }
    }

    /// The steps of this path
    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    /// True for the empty path (selects the whole record)
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl<S: Into<PathElement>, const N: usize> From<[S; N]> for FieldPath {
    fn from(parts: [S; N]) -> Self {
        Self::new(parts.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<PathElement>> FromIterator<S> for FieldPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", element)?;
        }
        Ok(())
    }
}

/// Result of [`crate::Database::lookup_fields`]
///
/// Holds one entry per requested path, in request order. A path that did
/// not resolve maps to `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedFields {
    prefix_len: u8,
    entries: Vec<(FieldPath, Option<DataValue>)>,
}

impl ProjectedFields {
    pub(crate) fn new(prefix_len: u8, entries: Vec<(FieldPath, Option<DataValue>)>) -> Self {
        Self {
            prefix_len,
            entries,
        }
    }

    /// Prefix length of the network that matched the address
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Value for `path`, or `None` if it was missing or never requested
    pub fn get(&self, path: &FieldPath) -> Option<&DataValue> {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .and_then(|(_, v)| v.as_ref())
    }

    /// Iterate over `(path, value)` pairs in request order
    pub fn iter(&self) -> impl Iterator<Item = (&FieldPath, Option<&DataValue>)> {
        self.entries.iter().map(|(p, v)| (p, v.as_ref()))
    }

    /// Number of requested paths
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no paths were requested
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume into the underlying `(path, value)` pairs
    pub fn into_entries(self) -> Vec<(FieldPath, Option<DataValue>)> {
        self.entries
    }
}
