//! Test-only MMDB writer
//!
//! Assembles small, byte-exact database images for integration tests.
//! The tree builder uses an arena of nodes with longest-prefix backfill;
//! the encoder emits the smallest legal encoding for each value.

#![allow(dead_code)]

use mmdb_reader::mmdb::{DATA_SECTION_SEPARATOR_SIZE, METADATA_MARKER};
use mmdb_reader::{DataValue, IpVersion, RecordSize};
use std::io::Write;
use std::net::IpAddr;
use tempfile::NamedTempFile;

/// Where IPv4 networks go in an IPv6 tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ipv4Placement {
    /// `::a.b.c.d` (what libmaxminddb looks up)
    Zero96,
    /// `::ffff:a.b.c.d`
    Mapped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodePointer {
    Node(u32),
    /// Data offset and the prefix length it was inserted with
    Data(u32, u8),
    Empty,
}

#[derive(Debug, Clone, Copy)]
struct Node {
    left: NodePointer,
    right: NodePointer,
}

impl Node {
    fn empty() -> Self {
        Self {
            left: NodePointer::Empty,
            right: NodePointer::Empty,
        }
    }

    fn child(&self, bit: u8) -> NodePointer {
        if bit == 0 {
            self.left
        } else {
            self.right
        }
    }

    fn set_child(&mut self, bit: u8, ptr: NodePointer) {
        if bit == 0 {
            self.left = ptr;
        } else {
            self.right = ptr;
        }
    }
}

/// Builds a database image in memory
pub struct TestDbBuilder {
    ip_version: IpVersion,
    record_size: RecordSize,
    ipv4_placement: Ipv4Placement,
    nodes: Vec<Node>,
    data: Vec<u8>,
    database_type: String,
    metadata_overrides: Vec<(String, Option<DataValue>)>,
}

impl TestDbBuilder {
    pub fn new(ip_version: IpVersion, record_size: RecordSize) -> Self {
        Self {
            ip_version,
            record_size,
            ipv4_placement: Ipv4Placement::Zero96,
            nodes: vec![Node::empty()],
            data: Vec::new(),
            database_type: "Test-DB".to_string(),
            metadata_overrides: Vec::new(),
        }
    }

    pub fn v4() -> Self {
        Self::new(IpVersion::V4, RecordSize::Bits24)
    }

    pub fn v6() -> Self {
        Self::new(IpVersion::V6, RecordSize::Bits28)
    }

    pub fn ipv4_placement(mut self, placement: Ipv4Placement) -> Self {
        self.ipv4_placement = placement;
        self
    }

    pub fn database_type(mut self, name: &str) -> Self {
        self.database_type = name.to_string();
        self
    }

    /// Replace (`Some`) or drop (`None`) a metadata field
    pub fn metadata_field(mut self, key: &str, value: Option<DataValue>) -> Self {
        self.metadata_overrides.push((key.to_string(), value));
        self
    }

    /// Append an encoded value to the data section and return its offset
    pub fn add_value(&mut self, value: &DataValue) -> u32 {
        let offset = self.data.len() as u32;
        encode(value, &mut self.data);
        offset
    }

    /// Append raw bytes to the data section and return their offset
    pub fn add_raw(&mut self, bytes: &[u8]) -> u32 {
        let offset = self.data.len() as u32;
        self.data.extend_from_slice(bytes);
        offset
    }

    /// Append a pointer to `target` and return the pointer's own offset
    pub fn add_pointer(&mut self, target: u32) -> u32 {
        let offset = self.data.len() as u32;
        encode_pointer(target, &mut self.data);
        offset
    }

    /// Map a network ("203.0.113.0/24", "2001:db8::/32", or a bare address)
    /// to a data offset
    pub fn insert(&mut self, network: &str, data_offset: u32) -> &mut Self {
        let (addr, prefix_len) = parse_network(network);
        let (bits, depth) = match (addr, self.ip_version) {
            (IpAddr::V4(v4), IpVersion::V4) => ((u32::from(v4) as u128) << 96, prefix_len),
            (IpAddr::V4(v4), IpVersion::V6) => {
                let low = u32::from(v4) as u128;
                let bits = match self.ipv4_placement {
                    Ipv4Placement::Zero96 => low,
                    Ipv4Placement::Mapped => (0xFFFF << 32) | low,
                };
                (bits, 96 + prefix_len)
            }
            (IpAddr::V6(v6), IpVersion::V6) => (u128::from(v6), prefix_len),
            (IpAddr::V6(_), IpVersion::V4) => panic!("IPv6 network in an IPv4 tree"),
        };
        self.insert_bits(bits, depth, data_offset);
        self
    }

    /// Encode `value` and map `network` to it
    pub fn insert_value(&mut self, network: &str, value: &DataValue) -> u32 {
        let offset = self.add_value(value);
        self.insert(network, offset);
        offset
    }

    fn insert_bits(&mut self, bits: u128, prefix_len: u8, data_offset: u32) {
        assert!(prefix_len > 0, "prefix length must be positive");
        let mut node_id = 0u32;

        for depth in 0..prefix_len {
            let bit = ((bits >> (127 - depth)) & 1) as u8;
            let child = self.nodes[node_id as usize].child(bit);

            if depth + 1 == prefix_len {
                match child {
                    NodePointer::Empty => {
                        self.nodes[node_id as usize]
                            .set_child(bit, NodePointer::Data(data_offset, prefix_len));
                    }
                    NodePointer::Data(_, existing) => {
                        if prefix_len >= existing {
                            self.nodes[node_id as usize]
                                .set_child(bit, NodePointer::Data(data_offset, prefix_len));
                        }
                    }
                    NodePointer::Node(child_id) => {
                        // More specific networks already live below; fill around them
                        self.backfill(child_id, data_offset, prefix_len);
                    }
                }
                return;
            }

            node_id = match child {
                NodePointer::Node(child_id) => child_id,
                NodePointer::Empty => {
                    let new_id = self.allocate();
                    self.nodes[node_id as usize].set_child(bit, NodePointer::Node(new_id));
                    new_id
                }
                NodePointer::Data(existing, existing_prefix) => {
                    // Split a less specific leaf so both halves keep its data
                    let new_id = self.allocate();
                    let inherited = NodePointer::Data(existing, existing_prefix);
                    self.nodes[new_id as usize] = Node {
                        left: inherited,
                        right: inherited,
                    };
                    self.nodes[node_id as usize].set_child(bit, NodePointer::Node(new_id));
                    new_id
                }
            };
        }
    }

    fn allocate(&mut self) -> u32 {
        self.nodes.push(Node::empty());
        (self.nodes.len() - 1) as u32
    }

    fn backfill(&mut self, node_id: u32, data_offset: u32, prefix_len: u8) {
        for bit in [0u8, 1] {
            match self.nodes[node_id as usize].child(bit) {
                NodePointer::Empty => self.nodes[node_id as usize]
                    .set_child(bit, NodePointer::Data(data_offset, prefix_len)),
                NodePointer::Data(_, existing) if prefix_len > existing => self.nodes
                    [node_id as usize]
                    .set_child(bit, NodePointer::Data(data_offset, prefix_len)),
                NodePointer::Data(..) => {}
                NodePointer::Node(child) => self.backfill(child, data_offset, prefix_len),
            }
        }
    }

    pub fn node_count(&self) -> u32 {
        self.nodes.len() as u32
    }

    /// Serialize the tree only
    pub fn tree_bytes(&self) -> Vec<u8> {
        let node_count = self.node_count();
        let mut tree = Vec::with_capacity(self.nodes.len() * self.record_size.node_bytes());
        for node in &self.nodes {
            let left = record_value(node.left, node_count);
            let right = record_value(node.right, node_count);
            write_node(&mut tree, self.record_size, left, right);
        }
        tree
    }

    /// Offset where the data section starts in the built image
    pub fn data_section_start(&self) -> usize {
        self.nodes.len() * self.record_size.node_bytes() + DATA_SECTION_SEPARATOR_SIZE
    }

    pub fn metadata_value(&self) -> DataValue {
        let ip_version = match self.ip_version {
            IpVersion::V4 => 4,
            IpVersion::V6 => 6,
        };
        let mut fields = vec![
            ("binary_format_major_version".to_string(), DataValue::Uint16(2)),
            ("binary_format_minor_version".to_string(), DataValue::Uint16(0)),
            ("build_epoch".to_string(), DataValue::Uint64(1_700_000_000)),
            (
                "database_type".to_string(),
                DataValue::String(self.database_type.clone()),
            ),
            (
                "description".to_string(),
                DataValue::Map(vec![(
                    "en".to_string(),
                    DataValue::String("Fixture database".to_string()),
                )]),
            ),
            ("ip_version".to_string(), DataValue::Uint16(ip_version)),
            (
                "languages".to_string(),
                DataValue::Array(vec![DataValue::String("en".to_string())]),
            ),
            ("node_count".to_string(), DataValue::Uint32(self.node_count())),
            (
                "record_size".to_string(),
                DataValue::Uint16(self.record_size.bits() as u16),
            ),
        ];
        for (key, value) in &self.metadata_overrides {
            fields.retain(|(k, _)| k != key);
            if let Some(v) = value {
                fields.push((key.clone(), v.clone()));
            }
        }
        DataValue::Map(fields)
    }

    /// Assemble the full image
    pub fn build(&self) -> Vec<u8> {
        let mut image = self.tree_bytes();
        image.extend_from_slice(&[0u8; DATA_SECTION_SEPARATOR_SIZE]);
        image.extend_from_slice(&self.data);
        image.extend_from_slice(METADATA_MARKER);
        encode(&self.metadata_value(), &mut image);
        image
    }
}

fn record_value(ptr: NodePointer, node_count: u32) -> u32 {
    match ptr {
        NodePointer::Empty => node_count,
        NodePointer::Node(id) => id,
        NodePointer::Data(offset, _) => node_count + DATA_SECTION_SEPARATOR_SIZE as u32 + offset,
    }
}

/// Append one node's two records
pub fn write_node(out: &mut Vec<u8>, record_size: RecordSize, left: u32, right: u32) {
    match record_size {
        RecordSize::Bits24 => {
            out.extend_from_slice(&left.to_be_bytes()[1..]);
            out.extend_from_slice(&right.to_be_bytes()[1..]);
        }
        RecordSize::Bits28 => {
            out.extend_from_slice(&left.to_be_bytes()[1..]);
            out.push((((left >> 24) & 0x0F) as u8) << 4 | ((right >> 24) & 0x0F) as u8);
            out.extend_from_slice(&right.to_be_bytes()[1..]);
        }
        RecordSize::Bits32 => {
            out.extend_from_slice(&left.to_be_bytes());
            out.extend_from_slice(&right.to_be_bytes());
        }
    }
}

fn parse_network(network: &str) -> (IpAddr, u8) {
    match network.split_once('/') {
        Some((addr, len)) => (addr.parse().unwrap(), len.parse().unwrap()),
        None => {
            let addr: IpAddr = network.parse().unwrap();
            let len = if addr.is_ipv4() { 32 } else { 128 };
            (addr, len)
        }
    }
}

/// Control byte(s) for a type and payload size
pub fn encode_control(type_id: u8, size: usize, out: &mut Vec<u8>) {
    let (size_bits, extra): (u8, Vec<u8>) = if size < 29 {
        (size as u8, vec![])
    } else if size < 285 {
        (29, vec![(size - 29) as u8])
    } else if size < 65_821 {
        (30, ((size - 285) as u16).to_be_bytes().to_vec())
    } else {
        (31, ((size - 65_821) as u32).to_be_bytes()[1..].to_vec())
    };

    if type_id <= 7 {
        out.push(type_id << 5 | size_bits);
    } else {
        out.push(size_bits);
        out.push(type_id - 7);
    }
    out.extend(extra);
}

/// Pointer in its smallest size class
pub fn encode_pointer(target: u32, out: &mut Vec<u8>) {
    if target < 2_048 {
        out.push(0x20 | ((target >> 8) & 0x07) as u8);
        out.push(target as u8);
    } else if target < 2_048 + (1 << 19) {
        let v = target - 2_048;
        out.push(0x28 | ((v >> 16) & 0x07) as u8);
        out.extend_from_slice(&v.to_be_bytes()[2..]);
    } else if target < 526_336 + (1 << 27) {
        let v = target - 526_336;
        out.push(0x30 | ((v >> 24) & 0x07) as u8);
        out.extend_from_slice(&v.to_be_bytes()[1..]);
    } else {
        out.push(0x38);
        out.extend_from_slice(&target.to_be_bytes());
    }
}

fn minimal_be(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

/// Encode a value in the MMDB data format
pub fn encode(value: &DataValue, out: &mut Vec<u8>) {
    match value {
        DataValue::String(s) => {
            encode_control(2, s.len(), out);
            out.extend_from_slice(s.as_bytes());
        }
        DataValue::Double(d) => {
            encode_control(3, 8, out);
            out.extend_from_slice(&d.to_be_bytes());
        }
        DataValue::Bytes(b) => {
            encode_control(4, b.len(), out);
            out.extend_from_slice(b);
        }
        DataValue::Uint16(n) => encode_uint(5, &n.to_be_bytes(), out),
        DataValue::Uint32(n) => encode_uint(6, &n.to_be_bytes(), out),
        DataValue::Map(entries) => {
            encode_control(7, entries.len(), out);
            for (k, v) in entries {
                encode(&DataValue::String(k.clone()), out);
                encode(v, out);
            }
        }
        DataValue::Int32(n) => encode_uint(8, &n.to_be_bytes(), out),
        DataValue::Uint64(n) => encode_uint(9, &n.to_be_bytes(), out),
        DataValue::Uint128(n) => encode_uint(10, &n.to_be_bytes(), out),
        DataValue::Array(items) => {
            encode_control(11, items.len(), out);
            for item in items {
                encode(item, out);
            }
        }
        DataValue::EndMarker => encode_control(13, 0, out),
        DataValue::Bool(b) => encode_control(14, *b as usize, out),
        DataValue::Float(f) => {
            encode_control(15, 4, out);
            out.extend_from_slice(&f.to_be_bytes());
        }
    }
}

fn encode_uint(type_id: u8, be: &[u8], out: &mut Vec<u8>) {
    let payload = minimal_be(be);
    encode_control(type_id, payload.len(), out);
    out.extend_from_slice(payload);
}

/// `{"k": "v", ...}` with string values
pub fn string_map(entries: &[(&str, &str)]) -> DataValue {
    DataValue::Map(
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), DataValue::String(v.to_string())))
            .collect(),
    )
}

/// Build a map from (key, value) pairs
pub fn map(entries: Vec<(&str, DataValue)>) -> DataValue {
    DataValue::Map(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

pub fn text(s: &str) -> DataValue {
    DataValue::String(s.to_string())
}

/// Write bytes to a temp file with the given suffix
pub fn write_temp(bytes: &[u8], suffix: &str) -> NamedTempFile {
    let mut file = NamedTempFile::with_suffix(suffix).unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

/// The classic GeoIP City record shape used across scenario tests
pub fn city_record(city: &str, country_iso: &str, country: &str, lat: f64, lon: f64) -> DataValue {
    map(vec![
        ("city", map(vec![("names", string_map(&[("en", city)]))])),
        ("continent", map(vec![("names", string_map(&[("en", "Europe")]))])),
        (
            "country",
            map(vec![
                ("iso_code", text(country_iso)),
                ("names", string_map(&[("en", country)])),
            ]),
        ),
        (
            "location",
            map(vec![
                ("latitude", DataValue::Double(lat)),
                ("longitude", DataValue::Double(lon)),
            ]),
        ),
        ("postal", map(vec![("code", text("SW1A"))])),
        (
            "subdivisions",
            DataValue::Array(vec![
                map(vec![("iso_code", text("ENG"))]),
                map(vec![("iso_code", text("WSM"))]),
            ]),
        ),
    ])
}
