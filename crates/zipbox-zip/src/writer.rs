//! ZIP writer for archives that will be appended to an existing file.
//!
//! Offsets in the central directory are written relative to the start of the
//! *final* file, so the writer is told up front how many bytes will precede
//! the archive. Only the classic format is produced; any value that would
//! need ZIP64 is rejected with [`Error::TooLarge`].

use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use flate2::write::DeflateEncoder;
use flate2::Compression;
use zerocopy::IntoBytes;

use crate::entry::system_time_to_dos_datetime;
use crate::zip::central_dir::{extra_field, flags};
use crate::zip::{CentralDirectoryHeader, CompressionMethod, EocdRecord, LocalFileHeader};
use crate::{Error, Result};

/// Version 2.0: deflate and directories.
const VERSION_NEEDED: u16 = 20;
/// Unix host, version 2.0.
const VERSION_MADE_BY: u16 = 3 << 8 | VERSION_NEEDED;

const DEFAULT_DIR_MODE: u32 = 0o040755;
const DEFAULT_FILE_MODE: u32 = 0o100644;
/// MS-DOS directory attribute.
const DOS_DIRECTORY: u32 = 0x10;

/// Per-entry metadata.
#[derive(Debug, Clone)]
pub struct EntryOptions {
    modified: SystemTime,
    unix_mode: Option<u32>,
    comment: String,
}

impl EntryOptions {
    /// Create options for an entry last modified at `modified`.
    pub fn new(modified: SystemTime) -> Self {
        Self {
            modified,
            unix_mode: None,
            comment: String::new(),
        }
    }

    /// Set the Unix mode bits, including the file type bits.
    pub fn unix_mode(mut self, mode: u32) -> Self {
        self.unix_mode = Some(mode);
        self
    }

    /// Set the central directory comment.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }
}

/// Streaming ZIP writer.
///
/// # Example
///
/// ```
/// use std::time::SystemTime;
/// use zipbox_zip::{EntryOptions, ZipArchive, ZipWriter};
///
/// let mut writer = ZipWriter::new(Vec::new());
/// let options = EntryOptions::new(SystemTime::now());
/// writer.add_file("public/index.html", b"<html></html>", &options).unwrap();
/// let bytes = writer.finish().unwrap();
///
/// let archive = ZipArchive::new(&bytes).unwrap();
/// assert_eq!(archive.len(), 1);
/// ```
pub struct ZipWriter<W: Write> {
    inner: W,
    /// Bytes preceding the archive in the final file
    base_offset: u64,
    /// Bytes written through this writer
    written: u64,
    /// Central directory records, emitted by `finish`
    central: Vec<u8>,
    entry_count: usize,
}

impl<W: Write> ZipWriter<W> {
    /// Create a writer for a standalone archive.
    pub fn new(inner: W) -> Self {
        Self::with_base_offset(inner, 0)
    }

    /// Create a writer for an archive that will start `base_offset` bytes
    /// into the final file.
    pub fn with_base_offset(inner: W, base_offset: u64) -> Self {
        Self {
            inner,
            base_offset,
            written: 0,
            central: Vec::new(),
            entry_count: 0,
        }
    }

    /// Number of entries written so far.
    pub fn len(&self) -> usize {
        self.entry_count
    }

    /// Check if no entries have been written.
    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    /// Add a directory entry. The data is always stored.
    pub fn add_directory(&mut self, name: &str, options: &EntryOptions) -> Result<()> {
        let mode = options.unix_mode.unwrap_or(DEFAULT_DIR_MODE);
        let record = Record {
            name,
            method: CompressionMethod::Store,
            crc32: 0,
            uncompressed_size: 0,
            external_attrs: mode << 16 | DOS_DIRECTORY,
        };
        self.write_entry(record, &[], options)
    }

    /// Add a file entry. The data is deflated unless that does not make it
    /// smaller, in which case it is stored.
    pub fn add_file(&mut self, name: &str, data: &[u8], options: &EntryOptions) -> Result<()> {
        let uncompressed_size =
            u32::try_from(data.len()).map_err(|_| Error::TooLarge("entry size"))?;

        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data)?;
        let deflated = encoder.finish()?;

        let (method, payload) = if deflated.len() < data.len() {
            (CompressionMethod::Deflate, deflated.as_slice())
        } else {
            (CompressionMethod::Store, data)
        };

        let mode = options.unix_mode.unwrap_or(DEFAULT_FILE_MODE);
        let record = Record {
            name,
            method,
            crc32: crc32fast::hash(data),
            uncompressed_size,
            external_attrs: mode << 16,
        };
        self.write_entry(record, payload, options)
    }

    /// Write the central directory and end record, returning the inner
    /// writer after flushing it.
    pub fn finish(mut self) -> Result<W> {
        let entry_count =
            u16::try_from(self.entry_count).map_err(|_| Error::TooLarge("entry count"))?;
        let central_dir_offset = self.position()?;
        let central_dir_size =
            u32::try_from(self.central.len()).map_err(|_| Error::TooLarge("central directory"))?;

        let central = std::mem::take(&mut self.central);
        self.write(&central)?;

        let eocd = EocdRecord {
            disk_number: 0,
            central_dir_disk: 0,
            central_dir_count_disk: entry_count,
            central_dir_count_total: entry_count,
            central_dir_size,
            central_dir_offset,
            comment_length: 0,
        };
        self.write(&EocdRecord::MAGIC)?;
        self.write(eocd.as_bytes())?;

        self.inner.flush()?;
        Ok(self.inner)
    }

    // Internal methods

    fn write_entry(
        &mut self,
        record: Record<'_>,
        payload: &[u8],
        options: &EntryOptions,
    ) -> Result<()> {
        let local_header_offset = self.position()?;
        let name_length =
            u16::try_from(record.name.len()).map_err(|_| Error::TooLarge("file name"))?;
        let comment_length =
            u16::try_from(options.comment.len()).map_err(|_| Error::TooLarge("file comment"))?;
        let compressed_size =
            u32::try_from(payload.len()).map_err(|_| Error::TooLarge("entry size"))?;

        let flags = if record.name.is_ascii() && options.comment.is_ascii() {
            0
        } else {
            flags::UTF8
        };
        let last_modified = system_time_to_dos_datetime(options.modified);
        let extra = extended_timestamp(options.modified);

        let local = LocalFileHeader {
            version_needed: VERSION_NEEDED,
            flags,
            compression_method: record.method as u16,
            last_modified,
            crc32: record.crc32,
            compressed_size,
            uncompressed_size: record.uncompressed_size,
            file_name_length: name_length,
            extra_field_length: extra.len() as u16,
        };
        self.write(&LocalFileHeader::MAGIC)?;
        self.write(local.as_bytes())?;
        self.write(record.name.as_bytes())?;
        self.write(&extra)?;
        self.write(payload)?;

        let central = CentralDirectoryHeader {
            version_made_by: VERSION_MADE_BY,
            version_needed: VERSION_NEEDED,
            flags,
            compression_method: record.method as u16,
            last_modified,
            crc32: record.crc32,
            compressed_size,
            uncompressed_size: record.uncompressed_size,
            file_name_length: name_length,
            extra_field_length: extra.len() as u16,
            file_comment_length: comment_length,
            disk_number_start: 0,
            internal_attrs: 0,
            external_attrs: record.external_attrs,
            local_header_offset,
        };
        self.central.extend_from_slice(&CentralDirectoryHeader::MAGIC);
        self.central.extend_from_slice(central.as_bytes());
        self.central.extend_from_slice(record.name.as_bytes());
        self.central.extend_from_slice(&extra);
        self.central.extend_from_slice(options.comment.as_bytes());

        self.entry_count += 1;
        Ok(())
    }

    /// Position in the final file, which must stay addressable by ZIP32.
    fn position(&self) -> Result<u32> {
        u32::try_from(self.base_offset + self.written)
            .map_err(|_| Error::TooLarge("archive offset"))
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }
}

/// Fixed part of an entry shared by the local and central headers.
struct Record<'a> {
    name: &'a str,
    method: CompressionMethod,
    crc32: u32,
    uncompressed_size: u32,
    external_attrs: u32,
}

/// Extended timestamp field holding only the modification time.
fn extended_timestamp(modified: SystemTime) -> [u8; 9] {
    let secs = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().min(u32::MAX as u64) as u32)
        .unwrap_or(0);

    let mut field = [0u8; 9];
    field[0..2].copy_from_slice(&extra_field::EXTENDED_TIMESTAMP.to_le_bytes());
    field[2..4].copy_from_slice(&5u16.to_le_bytes());
    field[4] = 1; // mtime present
    field[5..9].copy_from_slice(&secs.to_le_bytes());
    field
}
