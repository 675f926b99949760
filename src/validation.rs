//! Database verification for untrusted MMDB files
//!
//! Lookups only touch the nodes and records on their own path, so a
//! corrupt region can sit unnoticed until some address happens to land in
//! it. Verification walks the whole file up front:
//!
//! - metadata is present and sane
//! - the 16-byte separator after the tree is all zeros
//! - every node record is a node index, the empty marker, or a data
//!   offset inside the data section
//! - every distinct data record the tree points at decodes cleanly
//!
//! Findings are collected into a [`ValidationReport`] instead of stopping
//! at the first problem.
//!
//! # Usage
//!
//! ```rust,no_run
//! use mmdb_reader::validation::validate_database;
//! use std::path::Path;
//!
//! let report = validate_database(Path::new("GeoLite2-City.mmdb"))?;
//!
//! if report.is_valid() {
//!     println!("✓ {}", report.stats.summary());
//! } else {
//!     for error in &report.errors {
//!         println!("  - {}", error);
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::data_section::DataDecoder;
use crate::database::Reader;
use crate::error::Result;
use crate::file_reader;
use crate::mmdb::{IpVersion, Metadata, MmdbHeader, SearchTree};
use std::collections::BTreeSet;
use std::path::Path;

/// Stop listing individual bad records after this many
const MAX_RECORD_ERRORS: usize = 100;

/// Outcome of verifying a database
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Problems that make the database unsafe or wrong to use
    pub errors: Vec<String>,
    /// Oddities that don't break lookups
    pub warnings: Vec<String>,
    /// What was checked
    pub info: Vec<String>,
    /// Counts gathered along the way
    pub stats: DatabaseStats,
}

/// Counts gathered while verifying
#[derive(Debug, Clone, Default)]
pub struct DatabaseStats {
    /// Size of the image in bytes
    pub file_size: usize,
    /// Nodes in the search tree
    pub node_count: u32,
    /// Record size in bits
    pub record_size: u8,
    /// 4 or 6
    pub ip_version: u8,
    /// Size of the data section in bytes
    pub data_section_size: usize,
    /// Distinct data records referenced from the tree
    pub data_record_count: usize,
    /// Records holding the empty marker
    pub empty_record_count: usize,
}

impl ValidationReport {
    fn new() -> Self {
        Self::default()
    }

    /// Check if the database passed all validations (no errors)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn info(&mut self, msg: impl Into<String>) {
        self.info.push(msg.into());
    }
}

impl DatabaseStats {
    /// Human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "IPv{}, Nodes: {} ({}-bit records), Data records: {}, Data: {} KB, Size: {} KB",
            self.ip_version,
            self.node_count,
            self.record_size,
            self.data_record_count,
            self.data_section_size / 1024,
            self.file_size / 1024
        )
    }
}

/// Verify a database file on disk
///
/// `.gz` files are decompressed first. Only I/O failures are returned as
/// errors; everything wrong with the contents lands in the report.
pub fn validate_database(path: &Path) -> Result<ValidationReport> {
    let image = file_reader::read_to_vec(path)?;
    Ok(validate_image(&image))
}

/// Verify an in-memory database image
pub fn validate_image(image: &[u8]) -> ValidationReport {
    let mut report = ValidationReport::new();
    report.stats.file_size = image.len();

    let (header, metadata) = match MmdbHeader::from_file(image) {
        Ok(parsed) => parsed,
        Err(e) => {
            report.error(format!("Invalid MMDB metadata: {}", e));
            return report;
        }
    };

    let tree = match SearchTree::new(&image[..header.tree_size], &header) {
        Ok(tree) => tree,
        Err(e) => {
            report.error(format!("Cannot locate IPv4 subtree: {}", e));
            return report;
        }
    };

    let decoder = DataDecoder::new(&image[header.data_start..header.data_end]);
    validate_parts(image, &header, &metadata, &tree, &decoder, &mut report);
    report
}

/// Verify an already-open database
pub(crate) fn validate_reader(reader: &Reader) -> ValidationReport {
    let mut report = ValidationReport::new();
    report.stats.file_size = reader.image().len();
    validate_parts(
        reader.image(),
        reader.header(),
        reader.metadata(),
        &reader.tree(),
        &reader.decoder(),
        &mut report,
    );
    report
}

fn validate_parts(
    image: &[u8],
    header: &MmdbHeader,
    metadata: &Metadata,
    tree: &SearchTree<'_>,
    decoder: &DataDecoder<'_>,
    report: &mut ValidationReport,
) {
    report.stats.node_count = header.node_count;
    report.stats.record_size = header.record_size.bits();
    report.stats.ip_version = match header.ip_version {
        IpVersion::V4 => 4,
        IpVersion::V6 => 6,
    };
    report.stats.data_section_size = header.data_len();

    validate_metadata(metadata, report);
    validate_separator(image, header, report);
    let offsets = validate_tree(header, tree, decoder.len(), report);
    validate_data_records(&offsets, decoder, report);

    if header.ip_version == IpVersion::V6 && tree.ipv4_start().record >= header.node_count {
        report.warning("IPv6 tree has no IPv4 subtree; all IPv4 lookups share one result");
    }
}

fn validate_metadata(metadata: &Metadata, report: &mut ValidationReport) {
    report.info(format!(
        "Metadata: {} nodes, {}-bit records, IPv{}, format v{}.{}",
        metadata.node_count,
        metadata.record_size.bits(),
        metadata.ip_version,
        metadata.binary_format_major_version,
        metadata.binary_format_minor_version
    ));

    if metadata.database_type.is_empty() {
        report.warning("Metadata has no database_type");
    } else {
        report.info(format!("Database type: {}", metadata.database_type));
    }

    for lang in metadata.description.keys() {
        if !metadata.languages.is_empty() && !metadata.languages.contains(lang) {
            report.warning(format!(
                "Description language '{}' not listed in languages",
                lang
            ));
        }
    }
}

fn validate_separator(image: &[u8], header: &MmdbHeader, report: &mut ValidationReport) {
    let separator = &image[header.tree_size..header.data_start];
    match separator.iter().position(|&b| b != 0) {
        None => report.info("Data section separator is zeroed"),
        Some(i) => report.error(format!(
            "Data section separator byte {} at offset {} is 0x{:02x}, expected 0",
            i,
            header.tree_size + i,
            separator[i]
        )),
    }
}

/// Check every record and collect the distinct data offsets
fn validate_tree(
    header: &MmdbHeader,
    tree: &SearchTree<'_>,
    data_len: usize,
    report: &mut ValidationReport,
) -> BTreeSet<usize> {
    let node_count = header.node_count;
    let mut offsets = BTreeSet::new();
    let mut bad_records = 0usize;

    for node in 0..node_count {
        let (left, right) = match tree.read_node(node) {
            Ok(records) => records,
            Err(e) => {
                report.error(format!("Node {}: {}", node, e));
                return offsets;
            }
        };

        for (side, record) in [("left", left), ("right", right)] {
            if record < node_count {
                continue;
            }
            if record == node_count {
                report.stats.empty_record_count += 1;
                continue;
            }
            match tree.data_offset(record) {
                Ok(offset) if offset < data_len => {
                    offsets.insert(offset);
                }
                Ok(offset) => {
                    bad_records += 1;
                    if bad_records <= MAX_RECORD_ERRORS {
                        report.error(format!(
                            "Node {} {} record: offset {} is past the data section ({} bytes)",
                            node, side, offset, data_len
                        ));
                    }
                }
                Err(_) => {
                    bad_records += 1;
                    if bad_records <= MAX_RECORD_ERRORS {
                        report.error(format!(
                            "Node {} {} record {} points into the data section separator",
                            node, side, record
                        ));
                    }
                }
            }
        }
    }

    if bad_records > MAX_RECORD_ERRORS {
        report.error(format!(
            "... {} more bad records not listed",
            bad_records - MAX_RECORD_ERRORS
        ));
    }

    report.stats.data_record_count = offsets.len();
    report.info(format!(
        "Search tree: {} nodes, {} data records, {} empty records",
        node_count,
        offsets.len(),
        report.stats.empty_record_count
    ));
    offsets
}

fn validate_data_records(
    offsets: &BTreeSet<usize>,
    decoder: &DataDecoder<'_>,
    report: &mut ValidationReport,
) {
    if offsets.is_empty() {
        report.warning("Search tree references no data records");
        return;
    }

    let mut failures = 0usize;
    for &offset in offsets {
        if let Err(e) = decoder.decode(offset) {
            failures += 1;
            if failures <= MAX_RECORD_ERRORS {
                report.error(format!("Data record at offset {}: {}", offset, e));
            }
        }
    }

    if failures > MAX_RECORD_ERRORS {
        report.error(format!(
            "... {} more undecodable data records not listed",
            failures - MAX_RECORD_ERRORS
        ));
    }
    if failures == 0 {
        report.info(format!("All {} data records decode", offsets.len()));
    }
}
