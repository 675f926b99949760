//! Error types for the mmdb-reader library
//!
//! All fallible operations return [`MmdbError`]. It sorts failures into
//! four kinds that a binding layer can map onto its own exception classes:
//! I/O, malformed database, bad caller argument, and closed handle.

use thiserror::Error;

/// Result type alias for reader operations
pub type Result<T> = std::result::Result<T, MmdbError>;

/// Main error type for reader operations
#[derive(Error, Debug)]
pub enum MmdbError {
    /// File open, read or mmap failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The database is malformed
    #[error("Invalid MMDB format: {0}")]
    Format(#[from] FormatError),

    /// The caller passed an unusable argument
    #[error(transparent)]
    Argument(#[from] ArgumentError),

    /// Operation on a handle in the wrong state
    #[error(transparent)]
    State(#[from] StateError),
}

/// Coarse classification of an [`MmdbError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// File open/read failure
    Io,
    /// Malformed database
    Format,
    /// Unparseable or unsupported argument
    Argument,
    /// Operation on a closed handle
    State,
}

impl MmdbError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            MmdbError::Io(_) => ErrorKind::Io,
            MmdbError::Format(_) => ErrorKind::Format,
            MmdbError::Argument(_) => ErrorKind::Argument,
            MmdbError::State(_) => ErrorKind::State,
        }
    }

    /// The format error, if this is one
    pub fn as_format(&self) -> Option<&FormatError> {
        match self {
            MmdbError::Format(e) => Some(e),
            _ => None,
        }
    }
}

/// Structural problems in a database file
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// File is too small to hold a metadata section
    #[error("file too small: {size} bytes (need at least {required})")]
    FileTooSmall {
        /// Actual file size in bytes
        size: usize,
        /// Minimum required size in bytes
        required: usize,
    },

    /// The metadata marker never appears in the file
    #[error("metadata marker not found")]
    MetadataNotFound,

    /// Metadata map is missing a field or holds a bad value
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// `record_size` is not 24, 28 or 32
    #[error("unsupported record size: {0} bits")]
    UnsupportedRecordSize(u64),

    /// A read ran past the end of its section
    #[error("truncated data: {len} bytes at offset {offset} exceed section size {size}")]
    TruncatedData {
        /// Offset of the attempted read
        offset: usize,
        /// Length of the attempted read
        len: usize,
        /// Size of the section being read
        size: usize,
    },

    /// Control byte names a type that can't appear here
    #[error("invalid data type {type_id} at offset {offset}")]
    InvalidType {
        /// Raw type number
        type_id: u8,
        /// Offset of the control byte
        offset: usize,
    },

    /// Payload size doesn't fit the declared type
    #[error("invalid size {size} for {type_name} at offset {offset}")]
    InvalidSize {
        /// Name of the data type
        type_name: &'static str,
        /// Declared size
        size: usize,
        /// Offset of the control byte
        offset: usize,
    },

    /// String payload is not valid UTF-8
    #[error("invalid UTF-8 string at offset {0}")]
    InvalidUtf8(usize),

    /// Map key did not decode to a string
    #[error("map key at offset {0} is not a string")]
    InvalidMapKey(usize),

    /// Too many pointer hops on one decode path
    #[error("pointer chain exceeds {limit} hops at offset {offset}")]
    PointerCycle {
        /// Offset of the pointer that broke the limit
        offset: usize,
        /// The hop limit
        limit: usize,
    },

    /// Maps/arrays nested deeper than the decoder allows
    #[error("data structure nesting exceeds {0} levels")]
    NestingTooDeep(usize),

    /// A tree record points outside the tree
    #[error("invalid node {node} (node count {node_count})")]
    InvalidNode {
        /// Referenced node index
        node: u32,
        /// Number of nodes in the tree
        node_count: u32,
    },
}

/// Bad arguments to a lookup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    /// Input is not a valid IPv4/IPv6 address, or can't be looked up here
    #[error("invalid IP address: {0}")]
    InvalidAddress(String),
}

/// Handle state violations
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    /// The database has been closed
    #[error("database is closed")]
    Closed,
}
