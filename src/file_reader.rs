//! Whole-file loading with automatic gzip decompression
//!
//! Databases are often shipped compressed (`GeoLite2-City.mmdb.gz`). A
//! compressed file can't be memory-mapped, so it is inflated into an owned
//! buffer once at open time.
//!
//! ```rust,no_run
//! use mmdb_reader::file_reader;
//!
//! let image = file_reader::read_to_vec("GeoLite2-Country.mmdb.gz")?;
//! println!("{} bytes after decompression", image.len());
//! # Ok::<(), std::io::Error>(())
//! ```

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Buffer size for reading compressed input (128KB)
const BUFFER_SIZE: usize = 128 * 1024;

/// True if the path ends in `.gz` (case-insensitive)
pub fn is_gzip<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

/// Read a whole file, decompressing it if the extension is `.gz`
///
/// # Errors
///
/// Returns an error if the file can't be opened or read, or if a `.gz`
/// file is not valid gzip.
pub fn read_to_vec<P: AsRef<Path>>(path: P) -> io::Result<Vec<u8>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    from_file(file, is_gzip(path))
}

/// Read an already-opened file with an explicit gzip flag
pub fn from_file(file: File, is_gzip: bool) -> io::Result<Vec<u8>> {
    let size_hint = file.metadata().map(|m| m.len() as usize).unwrap_or(0);
    let mut out = Vec::with_capacity(size_hint);

    if is_gzip {
        let mut decoder = GzDecoder::new(BufReader::with_capacity(BUFFER_SIZE, file));
        decoder.read_to_end(&mut out)?;
    } else {
        let mut file = file;
        file.read_to_end(&mut out)?;
    }

    Ok(out)
}
