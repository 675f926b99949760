//! MaxMind DB (MMDB) binary format
//!
//! - **types**: format constants, record size and IP version
//! - **format**: metadata marker search, metadata parsing, section layout
//! - **tree**: search tree records and traversal
//!
//! Value decoding lives in `crate::data_section`, which both the metadata
//! parser and lookups go through.

pub mod format;
pub mod tree;
pub mod types;

pub use format::{find_metadata_marker, Metadata, MmdbHeader};
pub use tree::{read_record, Ipv4Start, SearchTree, TreeResult};
pub use types::{IpVersion, RecordSize, DATA_SECTION_SEPARATOR_SIZE, METADATA_MARKER};
