//! MMDB format constants and small enums

use crate::error::FormatError;
use serde::{Serialize, Serializer};
use std::fmt;

/// MMDB metadata marker: "\xAB\xCD\xEFMaxMind.com"
pub const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

/// Size of the all-zero separator between the search tree and the data section
pub const DATA_SECTION_SEPARATOR_SIZE: usize = 16;

/// Number of leading bits an IPv4 address occupies in an IPv6 tree
pub const IPV4_IN_IPV6_BITS: u8 = 96;

/// IP version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpVersion {
    /// IPv4 only
    V4,
    /// IPv6 (may include IPv4 addresses in its low 32 bits)
    V6,
}

impl IpVersion {
    /// Parse the `ip_version` metadata value
    pub fn from_number(n: u64) -> Option<Self> {
        match n {
            4 => Some(IpVersion::V4),
            6 => Some(IpVersion::V6),
            _ => None,
        }
    }
}

impl Serialize for IpVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(match self {
            IpVersion::V4 => 4,
            IpVersion::V6 => 6,
        })
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpVersion::V4 => write!(f, "4"),
            IpVersion::V6 => write!(f, "6"),
        }
    }
}

/// Record size in bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordSize {
    /// 24-bit records (3 bytes per record, 6 bytes per node)
    Bits24 = 24,
    /// 28-bit records (3.5 bytes per record, 7 bytes per node)
    Bits28 = 28,
    /// 32-bit records (4 bytes per record, 8 bytes per node)
    Bits32 = 32,
}

impl RecordSize {
    /// Get the size of a node (2 records) in bytes
    pub fn node_bytes(self) -> usize {
        match self {
            RecordSize::Bits24 => 6,
            RecordSize::Bits28 => 7,
            RecordSize::Bits32 => 8,
        }
    }

    /// Width of one record in bits
    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Create from bit size
    pub fn from_bits(bits: u64) -> Result<Self, FormatError> {
        match bits {
            24 => Ok(RecordSize::Bits24),
            28 => Ok(RecordSize::Bits28),
            32 => Ok(RecordSize::Bits32),
            _ => Err(FormatError::UnsupportedRecordSize(bits)),
        }
    }
}

impl Serialize for RecordSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.bits())
    }
}
