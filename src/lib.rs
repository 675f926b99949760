//! mmdb-reader - Read-only MaxMind DB lookups
//!
//! Opens MaxMind DB (`.mmdb`) files, resolves IPv4/IPv6 addresses through
//! the binary search tree, and decodes the matching record into owned,
//! language-neutral values.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mmdb_reader::{Database, FieldPath, QueryResult};
//!
//! let db = Database::open("GeoLite2-City.mmdb")?;
//!
//! // Whole record
//! if let QueryResult::Found { data, prefix_len } = db.lookup("81.2.69.142")? {
//!     println!("/{} {}", prefix_len, data.to_json());
//! }
//!
//! // Just a few leaves, decoded without touching the rest of the record
//! let city = FieldPath::from(["city", "names", "en"]);
//! let iso = FieldPath::from(["country", "iso_code"]);
//! if let Some(fields) = db.lookup_fields("81.2.69.142", &[city.clone(), iso.clone()])? {
//!     println!("{:?} {:?}", fields.get(&city), fields.get(&iso));
//! }
//!
//! db.close();
//! # Ok::<(), mmdb_reader::MmdbError>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  MMDB File                           │
//! ├──────────────────────────────────────┤
//! │  1. Search Tree (binary trie)        │  mmdb::tree
//! │  2. 16-byte zero separator           │
//! │  3. Data Section (self-describing)   │  data_section
//! │  4. Metadata marker + map            │  mmdb::format
//! └──────────────────────────────────────┘
//!          ↓ mmap() or read, once
//! ┌──────────────────────────────────────┐
//! │  Database (Send + Sync, closeable)   │  database
//! └──────────────────────────────────────┘
//! ```
//!
//! # Logging
//!
//! The crate emits [`tracing`] events (open/close at `debug`, per-lookup
//! at `trace`) and installs no subscriber of its own.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Data section decoding
pub mod data_section;
/// Database handle and lookups
pub mod database;
/// Error types
pub mod error;
/// Whole-file loading with gzip support
pub mod file_reader;
pub mod mmap;
/// MMDB binary format
pub mod mmdb;
pub mod path;
/// Whole-database verification
pub mod validation;

pub use crate::data_section::{DataDecoder, DataType, DataValue};
pub use crate::database::{Database, DatabaseOpener, QueryResult};
pub use crate::error::{ArgumentError, ErrorKind, FormatError, MmdbError, Result, StateError};
pub use crate::mmap::FileMode;
pub use crate::mmdb::{IpVersion, Metadata, RecordSize};
pub use crate::path::{FieldPath, PathElement, ProjectedFields};
pub use crate::validation::ValidationReport;

/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
