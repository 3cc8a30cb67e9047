//! ZIP reader and writer for archives that live inside a larger file.
//!
//! The reader is anchored at an arbitrary window of a byte source and
//! corrects stored offsets for whatever precedes the archive, so the same
//! code reads a standalone `.zip`, a ZIP appended to an executable, or a ZIP
//! embedded in one of its segments. It supports:
//!
//! - ZIP64 end records and extra fields
//! - Stored (method 0) and DEFLATE (method 8) entries
//! - Extended timestamp fields (0x5455)
//! - CRC-32 and size verification on every read
//!
//! The writer produces classic ZIP32 archives whose offsets already account
//! for the bytes that will precede them in the final file.
//!
//! # Example
//!
//! ```
//! use std::time::SystemTime;
//! use zipbox_zip::{EntryOptions, ZipArchive, ZipWriter};
//!
//! let prefix = b"not a zip".to_vec();
//! let mut writer = ZipWriter::with_base_offset(Vec::new(), prefix.len() as u64);
//! writer.add_file("public/a.txt", b"hello", &EntryOptions::new(SystemTime::now()))?;
//!
//! let mut file = prefix;
//! file.extend(writer.finish()?);
//!
//! let archive = ZipArchive::new(&file)?;
//! let entry = archive.find("public/a.txt").unwrap();
//! assert_eq!(archive.read(entry)?, b"hello");
//! # Ok::<(), zipbox_zip::Error>(())
//! ```

mod archive;
mod decompress;
mod entry;
mod error;
mod writer;
pub mod zip;

pub use archive::{Location, ZipArchive};
pub use entry::{dos_datetime_to_system_time, system_time_to_dos_datetime, ZipEntry};
pub use error::{Error, Result};
pub use writer::{EntryOptions, ZipWriter};
pub use zip::CompressionMethod;
