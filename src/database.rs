//! Database handle and lookups
//!
//! [`Database`] ties the pieces together: the file image, its parsed
//! metadata, the search tree and the data decoder. Lookups are read-only
//! and share no mutable state, so one handle can serve many threads.
//!
//! The open image lives behind an [`ArcSwapOption`]. Each lookup takes a
//! reference-counted snapshot, and [`Database::close`] swaps in `None`:
//! lookups already running finish against their snapshot, and any lookup
//! that starts afterwards fails with [`StateError::Closed`].

use crate::data_section::{DataDecoder, DataValue};
use crate::error::{ArgumentError, MmdbError, Result, StateError};
use crate::mmap::{FileMode, MmdbFile};
use crate::mmdb::{Ipv4Start, Metadata, MmdbHeader, SearchTree, TreeResult};
use crate::path::{FieldPath, ProjectedFields};
use crate::validation::{self, ValidationReport};
use arc_swap::ArcSwapOption;
use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// Result of an IP lookup
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// The address is in a network with data
    Found {
        /// The decoded record
        data: DataValue,
        /// Network prefix length (CIDR), in the query's address family
        prefix_len: u8,
    },
    /// No data for the address
    NotFound {
        /// Length of the prefix that was ruled out
        prefix_len: u8,
    },
}

impl QueryResult {
    /// The record, if found
    pub fn data(&self) -> Option<&DataValue> {
        match self {
            QueryResult::Found { data, .. } => Some(data),
            QueryResult::NotFound { .. } => None,
        }
    }

    /// Consume into the record, if found
    pub fn into_data(self) -> Option<DataValue> {
        match self {
            QueryResult::Found { data, .. } => Some(data),
            QueryResult::NotFound { .. } => None,
        }
    }

    /// Prefix length of the matched or ruled-out network
    pub fn prefix_len(&self) -> u8 {
        match self {
            QueryResult::Found { prefix_len, .. } | QueryResult::NotFound { prefix_len } => {
                *prefix_len
            }
        }
    }

    /// True if the address had data
    pub fn is_found(&self) -> bool {
        matches!(self, QueryResult::Found { .. })
    }
}

/// An open database image with everything derived from it at open time
pub(crate) struct Reader {
    file: MmdbFile,
    header: MmdbHeader,
    metadata: Metadata,
    ipv4_start: Ipv4Start,
}

impl Reader {
    fn new(file: MmdbFile) -> Result<Self> {
        let (header, metadata) = MmdbHeader::from_file(file.as_slice())?;
        let tree = file.bytes(0, header.tree_size)?;
        let ipv4_start = SearchTree::new(tree, &header)?.ipv4_start();
        Ok(Self {
            file,
            header,
            metadata,
            ipv4_start,
        })
    }

    pub(crate) fn image(&self) -> &[u8] {
        self.file.as_slice()
    }

    pub(crate) fn header(&self) -> &MmdbHeader {
        &self.header
    }

    pub(crate) fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub(crate) fn tree(&self) -> SearchTree<'_> {
        // In range: the header was derived from this image
        let tree = &self.image()[..self.header.tree_size];
        SearchTree::with_ipv4_start(tree, &self.header, self.ipv4_start)
    }

    pub(crate) fn decoder(&self) -> DataDecoder<'_> {
        DataDecoder::new(&self.image()[self.header.data_start..self.header.data_end])
    }
}

/// Read-only MaxMind DB handle
///
/// # Examples
///
/// ```no_run
/// use mmdb_reader::{Database, QueryResult};
///
/// let db = Database::open("GeoLite2-City.mmdb")?;
///
/// match db.lookup("8.8.8.8")? {
///     QueryResult::Found { data, prefix_len } => {
///         println!("/{}: {}", prefix_len, data.to_json());
///     }
///     QueryResult::NotFound { .. } => println!("not in database"),
/// }
/// # Ok::<(), mmdb_reader::MmdbError>(())
/// ```
pub struct Database {
    reader: ArcSwapOption<Reader>,
    path: Option<PathBuf>,
}

/// Builder for opening databases with custom configuration
///
/// Created via [`Database::from`].
///
/// ```no_run
/// use mmdb_reader::{Database, FileMode};
///
/// // Defaults: memory-mapped
/// let db = Database::from("GeoLite2-City.mmdb").open()?;
///
/// // Read the whole file up front
/// let db = Database::from("GeoLite2-City.mmdb")
///     .mode(FileMode::Memory)
///     .open()?;
/// # Ok::<(), mmdb_reader::MmdbError>(())
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseOpener {
    path: PathBuf,
    mode: FileMode,
}

impl DatabaseOpener {
    fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: FileMode::default(),
        }
    }

    /// How to bring the file into memory
    ///
    /// Default: [`FileMode::Mmap`]. Ignored for `.gz` files, which are
    /// always decompressed into memory.
    pub fn mode(mut self, mode: FileMode) -> Self {
        self.mode = mode;
        self
    }

    /// Open the database with configured options
    pub fn open(self) -> Result<Database> {
        let file = MmdbFile::open(&self.path, self.mode)?;
        Database::from_file(file, Some(self.path))
    }
}

impl Database {
    /// Open a database file with default options (memory-mapped)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from(path.as_ref()).open()
    }

    /// Start configuring how a database file is opened
    pub fn from(path: impl Into<PathBuf>) -> DatabaseOpener {
        DatabaseOpener::new(path)
    }

    /// Open a database image that is already in memory
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_file(MmdbFile::from_bytes(data)?, None)
    }

    fn from_file(file: MmdbFile, path: Option<PathBuf>) -> Result<Self> {
        let mmap = file.is_mmap();
        let size = file.size();
        let reader = Reader::new(file)?;

        debug!(
            path = ?path,
            size,
            mmap,
            node_count = reader.header.node_count,
            record_size = reader.header.record_size.bits(),
            ip_version = %reader.header.ip_version,
            database_type = %reader.metadata.database_type,
            "opened database"
        );

        Ok(Self {
            reader: ArcSwapOption::from_pointee(reader),
            path,
        })
    }

    fn reader(&self) -> Result<Arc<Reader>> {
        self.reader
            .load_full()
            .ok_or(MmdbError::State(StateError::Closed))
    }

    /// Look up an address given as text (IPv4 or IPv6)
    ///
    /// # Errors
    ///
    /// - `ArgumentError::InvalidAddress` if `address` doesn't parse, or is
    ///   IPv6 and the database is IPv4-only
    /// - `FormatError` if the tree or the record is corrupt
    /// - `StateError::Closed` after [`close`](Self::close)
    pub fn lookup(&self, address: &str) -> Result<QueryResult> {
        self.lookup_ip(parse_address(address)?)
    }

    /// Look up an already-parsed address
    pub fn lookup_ip(&self, ip: IpAddr) -> Result<QueryResult> {
        let reader = self.reader()?;
        let result = reader.tree().lookup(ip)?;
        trace!(%ip, ?result, "tree lookup");

        match result {
            TreeResult::Found {
                data_offset,
                prefix_len,
            } => Ok(QueryResult::Found {
                data: reader.decoder().decode(data_offset)?,
                prefix_len,
            }),
            TreeResult::NotFound { prefix_len } => Ok(QueryResult::NotFound { prefix_len }),
        }
    }

    /// Look up an address and project a set of field paths out of its record
    ///
    /// Each path resolves independently: one that is absent or runs into
    /// the wrong type maps to `None` while the others still resolve. Only
    /// the requested leaves are decoded. Returns `Ok(None)` when the
    /// address itself has no data.
    pub fn lookup_fields(
        &self,
        address: &str,
        paths: &[FieldPath],
    ) -> Result<Option<ProjectedFields>> {
        self.lookup_fields_ip(parse_address(address)?, paths)
    }

    /// [`lookup_fields`](Self::lookup_fields) for an already-parsed address
    pub fn lookup_fields_ip(
        &self,
        ip: IpAddr,
        paths: &[FieldPath],
    ) -> Result<Option<ProjectedFields>> {
        let reader = self.reader()?;
        let result = reader.tree().lookup(ip)?;
        trace!(%ip, ?result, paths = paths.len(), "field lookup");

        let TreeResult::Found {
            data_offset,
            prefix_len,
        } = result
        else {
            return Ok(None);
        };

        let decoder = reader.decoder();
        let entries = paths
            .iter()
            .map(|path| {
                decoder
                    .decode_path(data_offset, path.elements())
                    .map(|value| (path.clone(), value))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Some(ProjectedFields::new(prefix_len, entries)))
    }

    /// Database metadata
    pub fn metadata(&self) -> Result<Metadata> {
        Ok(self.reader()?.metadata.clone())
    }

    /// Check the whole database for structural problems
    ///
    /// Walks every node and decodes every record the tree points at.
    /// Problems are collected into the report rather than returned as
    /// errors; only a closed handle is an error.
    pub fn verify(&self) -> Result<ValidationReport> {
        let reader = self.reader()?;
        Ok(validation::validate_reader(&reader))
    }

    /// Release the file image
    ///
    /// Lookups that are already running keep their snapshot until they
    /// return. Closing twice is a no-op.
    pub fn close(&self) {
        if self.reader.swap(None).is_some() {
            debug!(path = ?self.path, "closed database");
        }
    }

    /// True once [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.reader.load().is_none()
    }

    /// Path the database was opened from (`None` for in-memory images)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reader = self.reader.load();
        let mut s = f.debug_struct("Database");
        s.field("path", &self.path);
        match &*reader {
            Some(r) => s
                .field("node_count", &r.header.node_count)
                .field("record_size", &r.header.record_size.bits())
                .field("ip_version", &r.header.ip_version),
            None => s.field("closed", &true),
        };
        s.finish()
    }
}

fn parse_address(address: &str) -> Result<IpAddr> {
    address
        .parse::<IpAddr>()
        .map_err(|_| ArgumentError::InvalidAddress(address.to_string()).into())
}
