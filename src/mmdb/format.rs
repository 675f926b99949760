//! MMDB Binary Format Parsing
//!
//! A database file is laid out as:
//!
//! ```text
//! ┌──────────────┬────────────┬──────────────┬────────┬──────────────┐
//! │ search tree  │ 16 × 0x00  │ data section │ marker │ metadata map │
//! └──────────────┴────────────┴──────────────┴────────┴──────────────┘
//!  node_count × node_bytes                    \xAB\xCD\xEFMaxMind.com
//! ```
//!
//! Parsing finds the last metadata marker, decodes the metadata map that
//! follows it, and derives the section boundaries from `node_count` and
//! `record_size`. Nothing else in the file is touched at open time.

use super::types::{
    IpVersion, RecordSize, DATA_SECTION_SEPARATOR_SIZE, METADATA_MARKER,
};
use crate::data_section::{DataDecoder, DataValue};
use crate::error::FormatError;
use memchr::memmem;
use serde::Serialize;
use std::collections::BTreeMap;

/// Section boundaries of a database file
///
/// All offsets are absolute file offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmdbHeader {
    /// Number of nodes in the search tree
    pub node_count: u32,
    /// Record size in bits (24, 28, or 32)
    pub record_size: RecordSize,
    /// IP version (4 or 6)
    pub ip_version: IpVersion,
    /// Size of the search tree in bytes
    pub tree_size: usize,
    /// First byte of the data section
    pub data_start: usize,
    /// One past the last byte of the data section (the marker offset)
    pub data_end: usize,
}

impl MmdbHeader {
    /// Parse the metadata of a whole database image
    ///
    /// Returns the section layout together with the decoded metadata.
    pub fn from_file(data: &[u8]) -> Result<(Self, Metadata), FormatError> {
        if data.len() < METADATA_MARKER.len() {
            return Err(FormatError::FileTooSmall {
                size: data.len(),
                required: METADATA_MARKER.len(),
            });
        }

        let marker_offset = find_metadata_marker(data)?;
        let metadata_start = marker_offset + METADATA_MARKER.len();

        // Metadata pointers are relative to the byte after the marker
        let decoder = DataDecoder::new(&data[metadata_start..]);
        let metadata = Metadata::from_value(&decoder.decode(0)?)?;

        let tree_size = metadata.search_tree_size();
        let data_start = tree_size + DATA_SECTION_SEPARATOR_SIZE;
        if data_start > marker_offset {
            return Err(FormatError::TruncatedData {
                offset: 0,
                len: data_start,
                size: marker_offset,
            });
        }

        let header = MmdbHeader {
            node_count: metadata.node_count,
            record_size: metadata.record_size,
            ip_version: metadata.ip_version,
            tree_size,
            data_start,
            data_end: marker_offset,
        };
        Ok((header, metadata))
    }

    /// Size of the data section in bytes
    pub fn data_len(&self) -> usize {
        self.data_end - self.data_start
    }
}

/// Decoded database metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    /// Number of nodes in the search tree
    pub node_count: u32,
    /// Record size in bits
    pub record_size: RecordSize,
    /// IP version of the search tree
    pub ip_version: IpVersion,
    /// Database type, e.g. "GeoIP2-City"
    pub database_type: String,
    /// Locales that may appear in `names` maps
    pub languages: Vec<String>,
    /// Human readable description keyed by language
    pub description: BTreeMap<String, String>,
    /// Build time in seconds since the Unix epoch
    pub build_epoch: u64,
    /// Format major version (always 2)
    pub binary_format_major_version: u16,
    /// Format minor version
    pub binary_format_minor_version: u16,
}

impl Metadata {
    /// Validate and extract metadata from its decoded map
    pub fn from_value(value: &DataValue) -> Result<Self, FormatError> {
        if value.as_map().is_none() {
            return Err(invalid("metadata is not a map"));
        }

        let node_count = required_uint(value, "node_count")?;
        if node_count == 0 {
            return Err(invalid("node_count must be positive"));
        }
        let node_count = u32::try_from(node_count)
            .map_err(|_| invalid(format!("node_count {} does not fit in 32 bits", node_count)))?;

        let record_size = RecordSize::from_bits(required_uint(value, "record_size")?)?;

        let ip_version_num = required_uint(value, "ip_version")?;
        let ip_version = IpVersion::from_number(ip_version_num)
            .ok_or_else(|| invalid(format!("unsupported ip_version {}", ip_version_num)))?;

        let binary_format_major_version =
            optional_u16(value, "binary_format_major_version")?.unwrap_or(2);
        if binary_format_major_version != 2 {
            return Err(invalid(format!(
                "unsupported binary format major version {}",
                binary_format_major_version
            )));
        }
        let binary_format_minor_version =
            optional_u16(value, "binary_format_minor_version")?.unwrap_or(0);

        let database_type = match value.get("database_type") {
            None => String::new(),
            Some(v) => v
                .as_str()
                .ok_or_else(|| invalid("database_type is not a string"))?
                .to_string(),
        };

        let languages = match value.get("languages") {
            None => Vec::new(),
            Some(v) => v
                .as_array()
                .ok_or_else(|| invalid("languages is not an array"))?
                .iter()
                .map(|lang| {
                    lang.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| invalid("languages contains a non-string"))
                })
                .collect::<Result<_, _>>()?,
        };

        let description = match value.get("description") {
            None => BTreeMap::new(),
            Some(v) => v
                .as_map()
                .ok_or_else(|| invalid("description is not a map"))?
                .iter()
                .map(|(lang, text)| {
                    text.as_str()
                        .map(|t| (lang.clone(), t.to_string()))
                        .ok_or_else(|| invalid(format!("description '{}' is not a string", lang)))
                })
                .collect::<Result<_, _>>()?,
        };

        let build_epoch = match value.get("build_epoch") {
            None => 0,
            Some(_) => required_uint(value, "build_epoch")?,
        };

        Ok(Metadata {
            node_count,
            record_size,
            ip_version,
            database_type,
            languages,
            description,
            build_epoch,
            binary_format_major_version,
            binary_format_minor_version,
        })
    }

    /// Size of the search tree in bytes
    pub fn search_tree_size(&self) -> usize {
        self.node_count as usize * self.record_size.node_bytes()
    }

    /// Description text for a language, e.g. `"en"`
    pub fn description_for(&self, language: &str) -> Option<&str> {
        self.description.get(language).map(String::as_str)
    }

    /// Convert to a JSON value
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Find the last metadata marker in a database image
///
/// The whole image is scanned backward; a marker string that happens to
/// appear inside the data section is shadowed by the real one after it.
pub fn find_metadata_marker(data: &[u8]) -> Result<usize, FormatError> {
    memmem::rfind(data, METADATA_MARKER).ok_or(FormatError::MetadataNotFound)
}

fn invalid(msg: impl Into<String>) -> FormatError {
    FormatError::InvalidMetadata(msg.into())
}

fn required_uint(map: &DataValue, key: &str) -> Result<u64, FormatError> {
    match map.get(key) {
        Some(v) => v
            .as_u64()
            .ok_or_else(|| invalid(format!("field '{}' is not an unsigned integer", key))),
        None => Err(invalid(format!("required field '{}' not found", key))),
    }
}

fn optional_u16(map: &DataValue, key: &str) -> Result<Option<u16>, FormatError> {
    if map.get(key).is_none() {
        return Ok(None);
    }
    let n = required_uint(map, key)?;
    u16::try_from(n)
        .map(Some)
        .map_err(|_| invalid(format!("field '{}' out of range: {}", key, n)))
}
