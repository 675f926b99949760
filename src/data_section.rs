//! MMDB data section decoding
//!
//! The data section holds self-describing values. Every value starts with
//! a control byte: the top 3 bits are the type and the bottom 5 bits are
//! the size (or, for pointers, the pointer size class plus 3 value bits).
//!
//! ```text
//! ┌───────┬─────────┐
//! │ type  │  size   │   type 0 = extended: next byte holds (type - 7)
//! │ 3 bit │  5 bit  │   size 29/30/31 = 1/2/3 more size bytes follow
//! └───────┴─────────┘
//! ```
//!
//! # Supported Types
//!
//! | id | type      | payload                                    |
//! |----|-----------|--------------------------------------------|
//! | 1  | Pointer   | 11/19/27/32-bit offset into the section    |
//! | 2  | String    | UTF-8 bytes                                |
//! | 3  | Double    | 8 bytes IEEE 754                           |
//! | 4  | Bytes     | raw bytes                                  |
//! | 5  | Uint16    | 0-2 bytes big-endian                       |
//! | 6  | Uint32    | 0-4 bytes big-endian                       |
//! | 7  | Map       | `size` key/value pairs                     |
//! | 8  | Int32     | 0-4 bytes big-endian, two's complement     |
//! | 9  | Uint64    | 0-8 bytes big-endian                       |
//! | 10 | Uint128   | 0-16 bytes big-endian                      |
//! | 11 | Array     | `size` values                              |
//! | 12 | Container | data cache container, never valid here     |
//! | 13 | EndMarker | only meaningful inside a container         |
//! | 14 | Bool      | value is the size field                    |
//! | 15 | Float     | 4 bytes IEEE 754                           |
//!
//! Pointers are followed transparently, so a decoded [`DataValue`] never
//! contains one. Decoding always copies out of the section, so results
//! don't borrow the database.
//!
//! See: <https://maxmind.github.io/MaxMind-DB/>

use crate::error::FormatError;
use crate::path::PathElement;
use rustc_hash::FxHashMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// Maximum hops in one chain of pointers to pointers
pub const MAX_POINTER_DEPTH: usize = 16;

/// Maximum map/array nesting (libmaxminddb uses the same bound)
pub const MAX_NESTING_DEPTH: usize = 512;

/// Maps up to this size find duplicate keys by scanning; larger ones hash
const LINEAR_KEY_SCAN_MAX: usize = 32;

/// Wire-level data type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Offset of another value in the data section
    Pointer = 1,
    /// UTF-8 text
    String = 2,
    /// IEEE 754 double precision float
    Double = 3,
    /// Raw byte array
    Bytes = 4,
    /// Unsigned 16-bit integer
    Uint16 = 5,
    /// Unsigned 32-bit integer
    Uint32 = 6,
    /// Key-value map with string keys
    Map = 7,
    /// Signed 32-bit integer
    Int32 = 8,
    /// Unsigned 64-bit integer
    Uint64 = 9,
    /// Unsigned 128-bit integer
    Uint128 = 10,
    /// Ordered list of values
    Array = 11,
    /// Data cache container
    Container = 12,
    /// End of a container
    EndMarker = 13,
    /// Boolean
    Bool = 14,
    /// IEEE 754 single precision float
    Float = 15,
}

impl DataType {
    /// Map a raw type number to a type
    pub fn from_id(id: u8) -> Option<Self> {
        Some(match id {
            1 => DataType::Pointer,
            2 => DataType::String,
            3 => DataType::Double,
            4 => DataType::Bytes,
            5 => DataType::Uint16,
            6 => DataType::Uint32,
            7 => DataType::Map,
            8 => DataType::Int32,
            9 => DataType::Uint64,
            10 => DataType::Uint128,
            11 => DataType::Array,
            12 => DataType::Container,
            13 => DataType::EndMarker,
            14 => DataType::Bool,
            15 => DataType::Float,
            _ => return None,
        })
    }

    /// Human-readable type name
    pub fn name(self) -> &'static str {
        match self {
            DataType::Pointer => "pointer",
            DataType::String => "utf8_string",
            DataType::Double => "double",
            DataType::Bytes => "bytes",
            DataType::Uint16 => "uint16",
            DataType::Uint32 => "uint32",
            DataType::Map => "map",
            DataType::Int32 => "int32",
            DataType::Uint64 => "uint64",
            DataType::Uint128 => "uint128",
            DataType::Array => "array",
            DataType::Container => "container",
            DataType::EndMarker => "end_marker",
            DataType::Bool => "boolean",
            DataType::Float => "float",
        }
    }
}

/// A decoded value, fully owned
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// UTF-8 string
    String(String),
    /// IEEE 754 double precision float
    Double(f64),
    /// Raw byte array
    Bytes(Vec<u8>),
    /// Unsigned 16-bit integer
    Uint16(u16),
    /// Unsigned 32-bit integer
    Uint32(u32),
    /// Key-value pairs in file order; duplicate keys keep the last value
    Map(Vec<(String, DataValue)>),
    /// Signed 32-bit integer
    Int32(i32),
    /// Unsigned 64-bit integer
    Uint64(u64),
    /// Unsigned 128-bit integer
    Uint128(u128),
    /// Array of values
    Array(Vec<DataValue>),
    /// Boolean value
    Bool(bool),
    /// IEEE 754 single precision float
    Float(f32),
    /// Container end marker (only appears as an array/map element)
    EndMarker,
}

impl DataValue {
    /// Wire type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            DataValue::String(_) => DataType::String,
            DataValue::Double(_) => DataType::Double,
            DataValue::Bytes(_) => DataType::Bytes,
            DataValue::Uint16(_) => DataType::Uint16,
            DataValue::Uint32(_) => DataType::Uint32,
            DataValue::Map(_) => DataType::Map,
            DataValue::Int32(_) => DataType::Int32,
            DataValue::Uint64(_) => DataType::Uint64,
            DataValue::Uint128(_) => DataType::Uint128,
            DataValue::Array(_) => DataType::Array,
            DataValue::Bool(_) => DataType::Bool,
            DataValue::Float(_) => DataType::Float,
            DataValue::EndMarker => DataType::EndMarker,
        }
    }

    /// Look up a key in a map value (last occurrence wins)
    pub fn get(&self, key: &str) -> Option<&DataValue> {
        match self {
            DataValue::Map(entries) => entries.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Follow a path of keys and indices through nested maps and arrays
    ///
    /// Returns `None` when a step is missing or meets the wrong type.
    pub fn get_path(&self, path: &[PathElement]) -> Option<&DataValue> {
        path.iter().try_fold(self, |current, element| match (current, element) {
            (DataValue::Map(_), PathElement::Key(k)) => current.get(k),
            (DataValue::Array(items), _) => element.array_index(items.len()).map(|i| &items[i]),
            _ => None,
        })
    }

    /// String contents, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Floating point value of a double or float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DataValue::Double(d) => Some(*d),
            DataValue::Float(f) => Some(*f as f64),
            _ => None,
        }
    }

    /// Unsigned value of any unsigned integer type that fits in 64 bits
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            DataValue::Uint16(n) => Some(*n as u64),
            DataValue::Uint32(n) => Some(*n as u64),
            DataValue::Uint64(n) => Some(*n),
            DataValue::Uint128(n) => u64::try_from(*n).ok(),
            _ => None,
        }
    }

    /// Map entries, if this is a map
    pub fn as_map(&self) -> Option<&[(String, DataValue)]> {
        match self {
            DataValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Array elements, if this is an array
    pub fn as_array(&self) -> Option<&[DataValue]> {
        match self {
            DataValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Convert to a JSON value
    ///
    /// u128 values become decimal strings, bytes become arrays of numbers
    /// and the end marker becomes `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            DataValue::String(s) => json!(s),
            DataValue::Double(d) => json!(d),
            DataValue::Bytes(b) => json!(b),
            DataValue::Uint16(u) => json!(u),
            DataValue::Uint32(u) => json!(u),
            DataValue::Uint64(u) => json!(u),
            DataValue::Uint128(u) => json!(u.to_string()),
            DataValue::Int32(i) => json!(i),
            DataValue::Bool(b) => json!(b),
            DataValue::Float(f) => json!(f),
            DataValue::Map(entries) => {
                let mut map = serde_json::Map::new();
                for (k, v) in entries {
                    map.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(map)
            }
            DataValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(DataValue::to_json).collect())
            }
            DataValue::EndMarker => serde_json::Value::Null,
        }
    }
}

impl Serialize for DataValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DataValue::String(s) => serializer.serialize_str(s),
            DataValue::Double(d) => serializer.serialize_f64(*d),
            DataValue::Bytes(b) => serializer.serialize_bytes(b),
            DataValue::Uint16(n) => serializer.serialize_u16(*n),
            DataValue::Uint32(n) => serializer.serialize_u32(*n),
            DataValue::Int32(n) => serializer.serialize_i32(*n),
            DataValue::Uint64(n) => serializer.serialize_u64(*n),
            DataValue::Uint128(n) => match u64::try_from(*n) {
                Ok(small) => serializer.serialize_u64(small),
                Err(_) => serializer.serialize_str(&n.to_string()),
            },
            DataValue::Bool(b) => serializer.serialize_bool(*b),
            DataValue::Float(f) => serializer.serialize_f32(*f),
            DataValue::EndMarker => serializer.serialize_unit(),
            DataValue::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            DataValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

/// Parsed control byte(s) of a value
#[derive(Debug, Clone, Copy)]
struct Control {
    data_type: DataType,
    /// Payload size, or the raw 5 size bits for pointers
    size: usize,
    /// Offset of the first control byte
    offset: usize,
}

/// A control byte after following any pointers
struct Resolved {
    ctrl: Control,
    /// Cursor positioned at the payload of the resolved value
    payload: usize,
    /// True if at least one pointer was followed
    indirect: bool,
}

/// Map/array nesting consumed along the current decode path
#[derive(Debug, Clone, Copy, Default)]
struct Depth {
    nesting: usize,
}

impl Depth {
    fn nest(self) -> Result<Self, FormatError> {
        if self.nesting >= MAX_NESTING_DEPTH {
            return Err(FormatError::NestingTooDeep(MAX_NESTING_DEPTH));
        }
        Ok(Self {
            nesting: self.nesting + 1,
        })
    }
}

/// Data section decoder
///
/// Borrows the data section; every offset (tree entry pointers and
/// in-section pointers alike) is relative to the start of `buffer`.
/// The decoder holds no mutable state, so one instance can serve many
/// threads.
#[derive(Debug, Clone, Copy)]
pub struct DataDecoder<'a> {
    buffer: &'a [u8],
}

impl<'a> DataDecoder<'a> {
    /// Create a decoder over a data section
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer }
    }

    /// Size of the data section in bytes
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True if the data section is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Decode the value at `offset`
    pub fn decode(&self, offset: usize) -> Result<DataValue, FormatError> {
        let mut cursor = offset;
        self.decode_value(&mut cursor, Depth::default(), false)
    }

    /// Decode only the value reached by `path` from the value at `offset`
    ///
    /// Siblings along the way are skipped, not decoded. Returns `Ok(None)`
    /// if a key is absent, an index is out of range, or a step meets a
    /// value that is neither a map nor an array.
    pub fn decode_path(
        &self,
        offset: usize,
        path: &[PathElement],
    ) -> Result<Option<DataValue>, FormatError> {
        let mut cursor = offset;
        let mut depth = Depth::default();

        for element in path {
            let resolved = self.resolve(&mut cursor)?;
            let mut payload = resolved.payload;

            match resolved.ctrl.data_type {
                DataType::Map => {
                    let key = match element {
                        PathElement::Key(k) => k.as_str(),
                        PathElement::Index(_) => return Ok(None),
                    };
                    depth = depth.nest()?;
                    let mut found = None;
                    // Scan every pair so a duplicate key resolves to its last value
                    for _ in 0..resolved.ctrl.size {
                        if self.read_key(&mut payload)? == key {
                            found = Some(payload);
                        }
                        self.skip(&mut payload, depth)?;
                    }
                    match found {
                        Some(value_offset) => cursor = value_offset,
                        None => return Ok(None),
                    }
                }
                DataType::Array => {
                    let Some(index) = element.array_index(resolved.ctrl.size) else {
                        return Ok(None);
                    };
                    depth = depth.nest()?;
                    for _ in 0..index {
                        self.skip(&mut payload, depth)?;
                    }
                    cursor = payload;
                }
                _ => return Ok(None),
            }
        }

        self.decode_value(&mut cursor, depth, !path.is_empty())
            .map(Some)
    }

    fn decode_value(
        &self,
        cursor: &mut usize,
        depth: Depth,
        in_container: bool,
    ) -> Result<DataValue, FormatError> {
        let resolved = self.resolve(cursor)?;
        let mut payload = resolved.payload;
        let value = self.decode_payload(
            &mut payload,
            resolved.ctrl,
            depth,
            in_container && !resolved.indirect,
        )?;
        // A pointer's own bytes were already consumed; its target is elsewhere
        if !resolved.indirect {
            *cursor = payload;
        }
        Ok(value)
    }

    fn decode_payload(
        &self,
        cursor: &mut usize,
        ctrl: Control,
        depth: Depth,
        in_container: bool,
    ) -> Result<DataValue, FormatError> {
        match ctrl.data_type {
            DataType::String => {
                let bytes = self.read_bytes(cursor, ctrl.size)?;
                let s = std::str::from_utf8(bytes)
                    .map_err(|_| FormatError::InvalidUtf8(ctrl.offset))?;
                Ok(DataValue::String(s.to_owned()))
            }
            DataType::Double => {
                self.expect_size(&ctrl, 8)?;
                Ok(DataValue::Double(f64::from_be_bytes(self.read_array(cursor)?)))
            }
            DataType::Bytes => {
                let bytes = self.read_bytes(cursor, ctrl.size)?;
                Ok(DataValue::Bytes(bytes.to_vec()))
            }
            DataType::Uint16 => Ok(DataValue::Uint16(self.read_uint(cursor, &ctrl, 2)? as u16)),
            DataType::Uint32 => Ok(DataValue::Uint32(self.read_uint(cursor, &ctrl, 4)? as u32)),
            DataType::Int32 => Ok(DataValue::Int32(
                self.read_uint(cursor, &ctrl, 4)? as u32 as i32,
            )),
            DataType::Uint64 => Ok(DataValue::Uint64(self.read_uint(cursor, &ctrl, 8)? as u64)),
            DataType::Uint128 => Ok(DataValue::Uint128(self.read_uint(cursor, &ctrl, 16)?)),
            DataType::Map => self.decode_map(cursor, ctrl.size, depth.nest()?),
            DataType::Array => self.decode_array(cursor, ctrl.size, depth.nest()?),
            DataType::Bool => match ctrl.size {
                0 => Ok(DataValue::Bool(false)),
                1 => Ok(DataValue::Bool(true)),
                size => Err(FormatError::InvalidSize {
                    type_name: DataType::Bool.name(),
                    size,
                    offset: ctrl.offset,
                }),
            },
            DataType::Float => {
                self.expect_size(&ctrl, 4)?;
                Ok(DataValue::Float(f32::from_be_bytes(self.read_array(cursor)?)))
            }
            DataType::EndMarker if in_container => Ok(DataValue::EndMarker),
            DataType::Pointer | DataType::Container | DataType::EndMarker => {
                Err(FormatError::InvalidType {
                    type_id: ctrl.data_type as u8,
                    offset: ctrl.offset,
                })
            }
        }
    }

    fn decode_map(
        &self,
        cursor: &mut usize,
        size: usize,
        depth: Depth,
    ) -> Result<DataValue, FormatError> {
        // Each pair needs at least two bytes, which bounds a bogus size
        let capacity = size.min(self.remaining(*cursor) / 2);
        let mut entries: Vec<(String, DataValue)> = Vec::with_capacity(capacity);
        let mut index: Option<FxHashMap<&'a str, usize>> = (size > LINEAR_KEY_SCAN_MAX)
            .then(|| FxHashMap::with_capacity_and_hasher(capacity, Default::default()));

        for _ in 0..size {
            let key = self.read_key(cursor)?;
            let value = self.decode_value(cursor, depth, true)?;
            let existing = match &index {
                Some(index) => index.get(key).copied(),
                None => entries.iter().position(|(k, _)| k == key),
            };
            match existing {
                Some(i) => entries[i].1 = value,
                None => {
                    if let Some(index) = index.as_mut() {
                        index.insert(key, entries.len());
                    }
                    entries.push((key.to_owned(), value));
                }
            }
        }

        Ok(DataValue::Map(entries))
    }

    fn decode_array(
        &self,
        cursor: &mut usize,
        size: usize,
        depth: Depth,
    ) -> Result<DataValue, FormatError> {
        let mut items = Vec::with_capacity(size.min(self.remaining(*cursor)));

        for _ in 0..size {
            items.push(self.decode_value(cursor, depth, true)?);
        }

        Ok(DataValue::Array(items))
    }

    /// Read a map key, following pointers, without allocating
    fn read_key(&self, cursor: &mut usize) -> Result<&'a str, FormatError> {
        let key_offset = *cursor;
        let resolved = self.resolve(cursor)?;
        if resolved.ctrl.data_type != DataType::String {
            return Err(FormatError::InvalidMapKey(key_offset));
        }

        let mut payload = resolved.payload;
        let bytes = self.read_bytes(&mut payload, resolved.ctrl.size)?;
        if !resolved.indirect {
            *cursor = payload;
        }
        std::str::from_utf8(bytes).map_err(|_| FormatError::InvalidUtf8(resolved.ctrl.offset))
    }

    /// Advance `cursor` past one value without decoding it
    ///
    /// Pointers are not followed: their target is somebody else's bytes.
    fn skip(&self, cursor: &mut usize, depth: Depth) -> Result<(), FormatError> {
        let ctrl = self.read_control(cursor)?;
        match ctrl.data_type {
            DataType::Pointer => {
                self.read_pointer(cursor, ctrl.size)?;
            }
            DataType::Map => {
                let depth = depth.nest()?;
                for _ in 0..ctrl.size.saturating_mul(2) {
                    self.skip(cursor, depth)?;
                }
            }
            DataType::Array => {
                let depth = depth.nest()?;
                for _ in 0..ctrl.size {
                    self.skip(cursor, depth)?;
                }
            }
            DataType::Bool | DataType::EndMarker => {}
            DataType::Container => {
                return Err(FormatError::InvalidType {
                    type_id: DataType::Container as u8,
                    offset: ctrl.offset,
                })
            }
            _ => {
                self.read_bytes(cursor, ctrl.size)?;
            }
        }
        Ok(())
    }

    /// Read the control byte at `cursor`, following any pointer chain
    ///
    /// If the value is a pointer, `cursor` ends just past the pointer bytes
    /// and the returned payload cursor sits inside the target. Hops are
    /// counted per chain; cycles through containers hit the nesting bound.
    fn resolve(&self, cursor: &mut usize) -> Result<Resolved, FormatError> {
        let ctrl = self.read_control(cursor)?;
        if ctrl.data_type != DataType::Pointer {
            return Ok(Resolved {
                ctrl,
                payload: *cursor,
                indirect: false,
            });
        }

        let mut pointer_offset = ctrl.offset;
        let mut target = self.read_pointer(cursor, ctrl.size)?;
        let mut hops = 0usize;
        loop {
            if hops >= MAX_POINTER_DEPTH {
                return Err(FormatError::PointerCycle {
                    offset: pointer_offset,
                    limit: MAX_POINTER_DEPTH,
                });
            }
            hops += 1;
            let mut payload = target;
            let ctrl = self.read_control(&mut payload)?;
            if ctrl.data_type != DataType::Pointer {
                return Ok(Resolved {
                    ctrl,
                    payload,
                    indirect: true,
                });
            }
            pointer_offset = ctrl.offset;
            target = self.read_pointer(&mut payload, ctrl.size)?;
        }
    }

    fn read_control(&self, cursor: &mut usize) -> Result<Control, FormatError> {
        let offset = *cursor;
        let ctrl = self.read_u8(cursor)?;
        let type_id = ctrl >> 5;

        let data_type = if type_id == 0 {
            // Extended type: next byte is (type - 7), and must land on 8..=15
            let ext = self.read_u8(cursor)?;
            let actual = ext.saturating_add(7);
            match DataType::from_id(actual) {
                Some(t) if actual >= 8 => t,
                _ => {
                    return Err(FormatError::InvalidType {
                        type_id: actual,
                        offset,
                    })
                }
            }
        } else {
            DataType::from_id(type_id).ok_or(FormatError::InvalidType { type_id, offset })?
        };

        let size_bits = (ctrl & 0x1F) as usize;
        let size = if data_type == DataType::Pointer {
            size_bits
        } else {
            self.read_size(cursor, size_bits)?
        };

        Ok(Control {
            data_type,
            size,
            offset,
        })
    }

    fn read_size(&self, cursor: &mut usize, size_bits: usize) -> Result<usize, FormatError> {
        Ok(match size_bits {
            0..=28 => size_bits,
            29 => 29 + self.read_u8(cursor)? as usize,
            30 => {
                let b = self.read_bytes(cursor, 2)?;
                285 + ((b[0] as usize) << 8 | b[1] as usize)
            }
            _ => {
                let b = self.read_bytes(cursor, 3)?;
                65_821 + ((b[0] as usize) << 16 | (b[1] as usize) << 8 | b[2] as usize)
            }
        })
    }

    /// Decode a pointer payload into a section-relative offset
    fn read_pointer(&self, cursor: &mut usize, size_bits: usize) -> Result<usize, FormatError> {
        let class = (size_bits >> 3) & 0x3;
        let high = (size_bits & 0x7) as u32;
        let b = self.read_bytes(cursor, class + 1)?;

        let offset = match class {
            0 => (high << 8) | b[0] as u32,
            1 => ((high << 16) | (b[0] as u32) << 8 | b[1] as u32) + 2_048,
            2 => ((high << 24) | (b[0] as u32) << 16 | (b[1] as u32) << 8 | b[2] as u32) + 526_336,
            _ => u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
        };

        Ok(offset as usize)
    }

    /// Read a variable-width big-endian unsigned integer of at most `width` bytes
    fn read_uint(
        &self,
        cursor: &mut usize,
        ctrl: &Control,
        width: usize,
    ) -> Result<u128, FormatError> {
        if ctrl.size > width {
            return Err(FormatError::InvalidSize {
                type_name: ctrl.data_type.name(),
                size: ctrl.size,
                offset: ctrl.offset,
            });
        }
        let bytes = self.read_bytes(cursor, ctrl.size)?;
        Ok(bytes.iter().fold(0u128, |acc, &b| (acc << 8) | b as u128))
    }

    fn expect_size(&self, ctrl: &Control, size: usize) -> Result<(), FormatError> {
        if ctrl.size != size {
            return Err(FormatError::InvalidSize {
                type_name: ctrl.data_type.name(),
                size: ctrl.size,
                offset: ctrl.offset,
            });
        }
        Ok(())
    }

    fn read_u8(&self, cursor: &mut usize) -> Result<u8, FormatError> {
        Ok(self.read_bytes(cursor, 1)?[0])
    }

    fn read_array<const N: usize>(&self, cursor: &mut usize) -> Result<[u8; N], FormatError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(cursor, N)?);
        Ok(out)
    }

    fn read_bytes(&self, cursor: &mut usize, len: usize) -> Result<&'a [u8], FormatError> {
        let start = *cursor;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.buffer.len())
            .ok_or(FormatError::TruncatedData {
                offset: start,
                len,
                size: self.buffer.len(),
            })?;
        *cursor = end;
        Ok(&self.buffer[start..end])
    }

    fn remaining(&self, cursor: usize) -> usize {
        self.buffer.len().saturating_sub(cursor)
    }
}
