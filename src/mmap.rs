//! Database file access
//!
//! A database image is either memory-mapped straight from disk or held
//! in an owned buffer (read into memory, decompressed from `.gz`, or
//! handed over by the caller). Either way it is immutable once opened and
//! all reads go through bounds-checked accessors.
//!
//! # Example
//!
//! ```no_run
//! use mmdb_reader::mmap::{FileMode, MmdbFile};
//!
//! let file = MmdbFile::open("GeoLite2-City.mmdb", FileMode::Mmap)?;
//! println!("Size: {} bytes", file.size());
//! # Ok::<(), mmdb_reader::MmdbError>(())
//! ```

use crate::error::{FormatError, MmdbError};
use crate::file_reader;
use crate::mmdb::METADATA_MARKER;
use memmap2::Mmap;
use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;

/// How a database file is brought into memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FileMode {
    /// Memory-map the file (pages are loaded lazily by the OS)
    #[default]
    Mmap,
    /// Read the whole file into an owned buffer
    Memory,
}

/// Backing bytes of an open database
pub enum Storage {
    /// Heap buffer
    Owned(Vec<u8>),
    /// Read-only file mapping
    Mmap(Mmap),
}

impl Storage {
    /// The full image
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Storage::Owned(v) => &v[..],
            Storage::Mmap(m) => &m[..],
        }
    }
}

/// An open database image
///
/// The mapping (or buffer) is released when the `MmdbFile` is dropped.
pub struct MmdbFile {
    storage: Storage,
}

impl MmdbFile {
    /// Open a database file
    ///
    /// Paths ending in `.gz` are decompressed into memory regardless of
    /// `mode`, since a compressed file can't be mapped.
    ///
    /// # Errors
    ///
    /// - `MmdbError::Io` if the file is missing, unreadable, not a regular
    ///   file, or (for `.gz`) not valid gzip
    /// - `FormatError::FileTooSmall` if it can't even hold the metadata marker
    pub fn open<P: AsRef<Path>>(path: P, mode: FileMode) -> Result<Self, MmdbError> {
        let path = path.as_ref();
        let meta = std::fs::metadata(path)?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            )
            .into());
        }

        if file_reader::is_gzip(path) {
            return Ok(Self::from_bytes(file_reader::read_to_vec(path)?)?);
        }

        // Checked before mapping so an empty file never reaches mmap
        check_size(meta.len() as usize)?;

        let storage = match mode {
            FileMode::Mmap => {
                let file = File::open(path)?;
                // SAFETY: the mapping is read-only; callers must not truncate
                // the file while it is open (same contract as libmaxminddb)
                Storage::Mmap(unsafe { Mmap::map(&file)? })
            }
            FileMode::Memory => Storage::Owned(std::fs::read(path)?),
        };

        check_size(storage.as_slice().len())?;
        Ok(Self { storage })
    }

    /// Wrap an in-memory database image
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, FormatError> {
        check_size(data.len())?;
        Ok(Self {
            storage: Storage::Owned(data),
        })
    }

    /// Size of the image in bytes
    pub fn size(&self) -> usize {
        self.storage.as_slice().len()
    }

    /// True if the image is memory-mapped
    pub fn is_mmap(&self) -> bool {
        matches!(self.storage, Storage::Mmap(_))
    }

    /// The entire image
    pub fn as_slice(&self) -> &[u8] {
        self.storage.as_slice()
    }

    /// Get `length` bytes at `offset`
    ///
    /// Fails with `FormatError::TruncatedData` if the range runs past the
    /// end of the image.
    pub fn bytes(&self, offset: usize, length: usize) -> Result<&[u8], FormatError> {
        let data = self.as_slice();
        offset
            .checked_add(length)
            .and_then(|end| data.get(offset..end))
            .ok_or(FormatError::TruncatedData {
                offset,
                len: length,
                size: data.len(),
            })
    }
}

fn check_size(size: usize) -> Result<(), FormatError> {
    if size < METADATA_MARKER.len() {
        return Err(FormatError::FileTooSmall {
            size,
            required: METADATA_MARKER.len(),
        });
    }
    Ok(())
}

impl fmt::Debug for MmdbFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MmdbFile")
            .field("size", &self.size())
            .field("mmap", &self.is_mmap())
            .finish()
    }
}
