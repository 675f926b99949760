//! MMDB Search Tree Traversal
//!
//! The tree is a binary trie over address bits. Each node holds two
//! records (left for a 0 bit, right for a 1 bit). A record value is
//! interpreted relative to `node_count`:
//!
//! - `< node_count`: index of the next node
//! - `== node_count`: no data for this prefix
//! - `> node_count`: data section offset `value - node_count - 16`
//!
//! Addresses are handled as 128-bit values. An IPv4 address occupies the
//! low 32 bits, so IPv4 and IPv6 walks share one descent routine that
//! only differs in the bit range it consumes.

use super::format::MmdbHeader;
use super::types::{IpVersion, RecordSize, DATA_SECTION_SEPARATOR_SIZE, IPV4_IN_IPV6_BITS};
use crate::error::{ArgumentError, FormatError, MmdbError};
use std::net::IpAddr;
use tracing::warn;

/// `::ffff:0:0/96`, where some writers place the IPv4 space
const IPV4_MAPPED_PREFIX: u128 = 0xFFFF << 32;

/// Outcome of walking the tree for one address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeResult {
    /// The address falls in a network with data
    Found {
        /// Offset relative to the start of the data section
        data_offset: usize,
        /// Network prefix length, in the query's address family
        prefix_len: u8,
    },
    /// No data for the address
    NotFound {
        /// Length of the prefix that was ruled out
        prefix_len: u8,
    },
}

impl TreeResult {
    /// Prefix length of the matched or ruled-out network
    pub fn prefix_len(&self) -> u8 {
        match self {
            TreeResult::Found { prefix_len, .. } | TreeResult::NotFound { prefix_len } => {
                *prefix_len
            }
        }
    }
}

/// Where IPv4 lookups begin
///
/// `record` is the record value reached after consuming `bit` leading
/// bits. In an IPv4 tree this is the root at bit 96 of the 128-bit
/// address. In an IPv6 tree it is computed once per database; `record`
/// may already be a terminal when the tree has no IPv4 subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Start {
    /// Node index or terminal record value
    pub record: u32,
    /// Number of address bits consumed to reach `record`
    pub bit: u8,
}

/// Read both records of `node` from the tree section
///
/// ```text
/// 24-bit: [ left: 3 bytes ][ right: 3 bytes ]
/// 28-bit: [ left low 24 ][ left hi 4 | right hi 4 ][ right low 24 ]
/// 32-bit: [ left: 4 bytes ][ right: 4 bytes ]
/// ```
pub fn read_record(
    tree: &[u8],
    record_size: RecordSize,
    node: u32,
) -> Result<(u32, u32), FormatError> {
    let node_bytes = record_size.node_bytes();
    let offset = node as usize * node_bytes;
    let b = offset
        .checked_add(node_bytes)
        .and_then(|end| tree.get(offset..end))
        .ok_or(FormatError::TruncatedData {
            offset,
            len: node_bytes,
            size: tree.len(),
        })?;

    let be24 = |b: &[u8]| (b[0] as u32) << 16 | (b[1] as u32) << 8 | b[2] as u32;

    Ok(match record_size {
        RecordSize::Bits24 => (be24(&b[0..3]), be24(&b[3..6])),
        RecordSize::Bits28 => {
            let left = ((b[3] as u32 & 0xF0) << 20) | be24(&b[0..3]);
            let right = ((b[3] as u32 & 0x0F) << 24) | be24(&b[4..7]);
            (left, right)
        }
        RecordSize::Bits32 => (
            u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
            u32::from_be_bytes([b[4], b[5], b[6], b[7]]),
        ),
    })
}

/// Search tree for IP address lookups
#[derive(Debug, Clone, Copy)]
pub struct SearchTree<'a> {
    /// Tree section only (`node_count * node_bytes` bytes)
    tree: &'a [u8],
    node_count: u32,
    record_size: RecordSize,
    ip_version: IpVersion,
    ipv4_start: Ipv4Start,
}

impl<'a> SearchTree<'a> {
    /// Create a search tree and locate its IPv4 subtree
    pub fn new(tree: &'a [u8], header: &MmdbHeader) -> Result<Self, FormatError> {
        let mut search = Self::with_ipv4_start(
            tree,
            header,
            Ipv4Start {
                record: 0,
                bit: IPV4_IN_IPV6_BITS,
            },
        );
        if header.ip_version == IpVersion::V6 {
            search.ipv4_start = search.find_ipv4_start()?;
        }
        Ok(search)
    }

    /// Create a search tree with a previously computed IPv4 start
    pub fn with_ipv4_start(tree: &'a [u8], header: &MmdbHeader, ipv4_start: Ipv4Start) -> Self {
        Self {
            tree,
            node_count: header.node_count,
            record_size: header.record_size,
            ip_version: header.ip_version,
            ipv4_start,
        }
    }

    /// Where IPv4 lookups begin
    pub fn ipv4_start(&self) -> Ipv4Start {
        self.ipv4_start
    }

    /// Number of nodes
    pub fn node_count(&self) -> u32 {
        self.node_count
    }

    /// Read both records of a node
    pub fn read_node(&self, node: u32) -> Result<(u32, u32), FormatError> {
        if node >= self.node_count {
            return Err(FormatError::InvalidNode {
                node,
                node_count: self.node_count,
            });
        }
        read_record(self.tree, self.record_size, node)
    }

    /// Look up an IP address
    ///
    /// Fails with an argument error for an IPv6 address in an IPv4 tree.
    pub fn lookup(&self, ip: IpAddr) -> Result<TreeResult, MmdbError> {
        let result = match (ip, self.ip_version) {
            (IpAddr::V4(addr), _) => {
                let bits = u32::from(addr) as u128;
                let start = self.ipv4_start;
                let (record, bit) = self.descend(start.record, bits, start.bit, 128)?;
                self.classify(record, bit.saturating_sub(IPV4_IN_IPV6_BITS))?
            }
            (IpAddr::V6(addr), IpVersion::V6) => {
                let (record, bit) = self.descend(0, u128::from(addr), 0, 128)?;
                self.classify(record, bit)?
            }
            (IpAddr::V6(addr), IpVersion::V4) => {
                return Err(ArgumentError::InvalidAddress(format!(
                    "cannot look up IPv6 address {} in an IPv4-only database",
                    addr
                ))
                .into());
            }
        };
        Ok(result)
    }

    /// Translate a data record value into a data section offset
    pub fn data_offset(&self, record: u32) -> Result<usize, FormatError> {
        (record as usize)
            .checked_sub(self.node_count as usize + DATA_SECTION_SEPARATOR_SIZE)
            .filter(|_| record > self.node_count)
            .ok_or(FormatError::InvalidNode {
                node: record,
                node_count: self.node_count,
            })
    }

    /// Walk bits `from..to` of `bits` (MSB first) starting at `record`
    ///
    /// Returns the record reached and the bit position where the walk
    /// stopped, which is the prefix length in 128-bit terms.
    fn descend(&self, record: u32, bits: u128, from: u8, to: u8) -> Result<(u32, u8), FormatError> {
        let mut record = record;
        let mut bit = from;
        while bit < to && record < self.node_count {
            let (left, right) = self.read_node(record)?;
            record = if (bits >> (127 - bit)) & 1 == 0 { left } else { right };
            bit += 1;
        }
        Ok((record, bit))
    }

    fn classify(&self, record: u32, prefix_len: u8) -> Result<TreeResult, FormatError> {
        if record > self.node_count {
            Ok(TreeResult::Found {
                data_offset: self.data_offset(record)?,
                prefix_len,
            })
        } else {
            // Either the empty terminal or bits ran out on an interior node
            Ok(TreeResult::NotFound { prefix_len })
        }
    }

    /// Locate the IPv4 subtree of an IPv6 tree
    ///
    /// Uses `::/96` when the tree has a full path there. Otherwise tries
    /// `::ffff:0:0/96`. When neither path reaches depth 96, the terminal
    /// the `::/96` walk ended on applies to every IPv4 address.
    fn find_ipv4_start(&self) -> Result<Ipv4Start, FormatError> {
        let (record, bit) = self.descend(0, 0, 0, IPV4_IN_IPV6_BITS)?;
        if bit == IPV4_IN_IPV6_BITS {
            return Ok(Ipv4Start { record, bit });
        }

        let (mapped, mapped_bit) = self.descend(0, IPV4_MAPPED_PREFIX, 0, IPV4_IN_IPV6_BITS)?;
        if mapped_bit == IPV4_IN_IPV6_BITS && mapped < self.node_count {
            warn!(
                node = mapped,
                "::/96 subtree ends at bit {}, using ::ffff:0:0/96 for IPv4 lookups", bit
            );
            return Ok(Ipv4Start {
                record: mapped,
                bit: mapped_bit,
            });
        }

        Ok(Ipv4Start { record, bit })
    }
}
