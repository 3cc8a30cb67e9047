//! ZIP archive reader anchored at an arbitrary window of a byte source.
//!
//! An archive appended to an executable is normally written with offsets
//! that are absolute within the final file, while an archive found inside a
//! segment is read through a window that starts somewhere in the middle of
//! the file. Both cases are handled by deriving a base offset from the
//! position of the end of central directory record:
//!
//! ```text
//! base = eocd_position - central_dir_size - central_dir_offset
//! ```
//!
//! Every stored offset is shifted by `base` before it is used.

use memchr::memmem;
use zipbox_common::BinaryReader;

use crate::decompress;
use crate::entry::ZipEntry;
use crate::zip::central_dir::extra_field;
use crate::zip::{
    CentralDirectoryHeader, CompressionMethod, Eocd64Locator, Eocd64Record, EocdRecord,
    LocalFileHeader,
};
use crate::{Error, Result};

/// Byte range of the source that an archive was anchored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    /// Start of the window within the source.
    pub offset: u64,
    /// Length of the window.
    pub size: u64,
}

/// ZIP archive reader over a borrowed window of bytes.
pub struct ZipArchive<'a> {
    /// Window the archive was anchored in
    data: &'a [u8],
    /// Window position within the whole source
    location: Location,
    /// Correction applied to stored offsets
    base_offset: i64,
    /// Central directory entries in stored order
    entries: Vec<ZipEntry>,
}

/// End-of-directory values after ZIP64 resolution.
struct DirectoryEnd {
    entry_count: u64,
    size: u64,
    offset: u64,
    /// Position of the record the values came from.
    position: usize,
}

impl<'a> ZipArchive<'a> {
    /// Open an archive whose end of central directory sits at the end of
    /// `data`.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        Self::at(data, 0, data.len() as u64)
    }

    /// Open an archive whose end of central directory sits at the end of the
    /// window `source[offset..offset + size]`.
    pub fn at(source: &'a [u8], offset: u64, size: u64) -> Result<Self> {
        let len = source.len() as u64;
        let end = offset
            .checked_add(size)
            .filter(|&end| end <= len)
            .ok_or(Error::WindowOutOfBounds { offset, size, len })?;
        let data = &source[offset as usize..end as usize];

        let directory = Self::read_directory_end(data)?;

        // The directory ends where its end record begins, whatever the
        // stored offset claims.
        let start = (directory.position as u64)
            .checked_sub(directory.size)
            .ok_or(Error::InvalidDirectory("directory size exceeds archive"))?;
        let base_offset = i64::try_from(start)
            .ok()
            .zip(i64::try_from(directory.offset).ok())
            .and_then(|(start, offset)| start.checked_sub(offset))
            .ok_or(Error::InvalidDirectory("directory offset out of range"))?;

        // Each record is at least 46 bytes, which bounds the allocation below.
        if directory.entry_count > directory.size / 46 + 1 {
            return Err(Error::InvalidDirectory("entry count exceeds directory size"));
        }

        let mut reader = BinaryReader::at(data, start)?;
        let mut entries = Vec::with_capacity(directory.entry_count as usize);
        for _ in 0..directory.entry_count {
            entries.push(Self::read_cd_entry(&mut reader, base_offset)?);
        }

        Ok(Self {
            data,
            location: Location { offset, size },
            base_offset,
            entries,
        })
    }

    /// Get the window the archive was anchored in.
    #[inline]
    pub fn location(&self) -> Location {
        self.location
    }

    /// Get the correction applied to offsets stored in the archive.
    #[inline]
    pub fn base_offset(&self) -> i64 {
        self.base_offset
    }

    /// Get the number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the archive has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get all entries in central directory order.
    #[inline]
    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    /// Iterate over entries in central directory order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &ZipEntry> + '_ {
        self.entries.iter()
    }

    /// Find an entry by its exact stored name.
    pub fn find(&self, name: &str) -> Option<&ZipEntry> {
        self.entries.iter().find(|e| e.name() == name)
    }

    /// Read entry contents, decompressing and verifying size and CRC-32.
    pub fn read(&self, entry: &ZipEntry) -> Result<Vec<u8>> {
        if entry.is_encrypted() {
            return Err(Error::Encrypted(entry.name().to_string()));
        }
        let method = entry
            .compression_method()
            .ok_or(Error::UnsupportedCompression(entry.raw_compression_method()))?;

        if entry.uncompressed_size() == 0 {
            return Ok(Vec::new());
        }

        let mut reader = BinaryReader::at(self.data, entry.local_header_offset())?;
        let sig = reader.read_u32()?;
        if sig != LocalFileHeader::SIGNATURE {
            return Err(Error::InvalidSignature {
                expected: LocalFileHeader::SIGNATURE,
                actual: sig,
            });
        }

        let local_header: LocalFileHeader = reader.read_struct()?;
        reader.advance(local_header.variable_data_size());

        let compressed_size =
            usize::try_from(entry.compressed_size()).map_err(|_| Error::TooLarge("entry"))?;
        let expected_size =
            usize::try_from(entry.uncompressed_size()).map_err(|_| Error::TooLarge("entry"))?;
        let compressed_data = reader.read_bytes(compressed_size)?;

        let data = decompress::decode(entry.name(), method, compressed_data, expected_size)?;

        let crc = crc32fast::hash(&data);
        if crc != entry.crc32() {
            return Err(Error::ChecksumMismatch {
                name: entry.name().to_string(),
                expected: entry.crc32(),
                actual: crc,
            });
        }

        Ok(data)
    }

    // Internal methods

    fn read_directory_end(data: &[u8]) -> Result<DirectoryEnd> {
        let eocd_offset = Self::find_eocd(data)?;
        let mut reader = BinaryReader::at(data, eocd_offset as u64)?;

        reader.advance(4); // Skip signature
        let eocd: EocdRecord = reader.read_struct()?;

        if eocd.is_zip64() {
            return Self::read_zip64_eocd(data, eocd_offset);
        }

        Ok(DirectoryEnd {
            entry_count: eocd.central_dir_count_total as u64,
            size: eocd.central_dir_size as u64,
            offset: eocd.central_dir_offset as u64,
            position: eocd_offset,
        })
    }

    /// Search backwards for the EOCD signature, accepting only a record whose
    /// comment fits in the remaining bytes.
    fn find_eocd(data: &[u8]) -> Result<usize> {
        if data.len() < EocdRecord::LEN {
            return Err(Error::EocdNotFound);
        }

        let search_start = data.len().saturating_sub(EocdRecord::MAX_SEARCH);
        let mut search_end = data.len() - EocdRecord::LEN + EocdRecord::MAGIC.len();

        while let Some(pos) = memmem::rfind(&data[search_start..search_end], &EocdRecord::MAGIC) {
            let offset = search_start + pos;
            let comment_length =
                u16::from_le_bytes([data[offset + 20], data[offset + 21]]) as usize;

            if offset + EocdRecord::LEN + comment_length <= data.len() {
                return Ok(offset);
            }
            search_end = offset + EocdRecord::MAGIC.len() - 1;
        }

        Err(Error::EocdNotFound)
    }

    fn read_zip64_eocd(data: &[u8], eocd_offset: usize) -> Result<DirectoryEnd> {
        let locator_offset = eocd_offset
            .checked_sub(Eocd64Locator::LEN)
            .ok_or(Error::Zip64EocdNotFound)?;

        let mut reader = BinaryReader::at(data, locator_offset as u64)?;
        if reader.read_bytes(4)? != Eocd64Locator::MAGIC {
            return Err(Error::Zip64EocdNotFound);
        }
        let locator: Eocd64Locator = reader.read_struct()?;

        // The record normally sits right before the locator; the stored
        // offset is only correct when the archive starts the window.
        let candidates = [
            locator_offset.checked_sub(Eocd64Record::LEN),
            usize::try_from(locator.zip64_eocd_offset).ok(),
        ];

        for position in candidates.into_iter().flatten() {
            let record = position
                .checked_add(Eocd64Record::LEN)
                .and_then(|end| data.get(position..end));
            if !record.is_some_and(|record| record[..4] == Eocd64Record::MAGIC) {
                continue;
            }

            let mut reader = BinaryReader::at(data, position as u64 + 4)?;
            let eocd64: Eocd64Record = reader.read_struct()?;

            return Ok(DirectoryEnd {
                entry_count: eocd64.central_dir_count_total,
                size: eocd64.central_dir_size,
                offset: eocd64.central_dir_offset,
                position,
            });
        }

        Err(Error::Zip64EocdNotFound)
    }

    fn read_cd_entry(reader: &mut BinaryReader, base_offset: i64) -> Result<ZipEntry> {
        let sig = reader.read_u32()?;
        if sig != CentralDirectoryHeader::SIGNATURE {
            return Err(Error::InvalidSignature {
                expected: CentralDirectoryHeader::SIGNATURE,
                actual: sig,
            });
        }

        let header: CentralDirectoryHeader = reader.read_struct()?;

        let name_bytes = reader.read_bytes(header.file_name_length as usize)?;
        let name = String::from_utf8_lossy(name_bytes).into_owned();
        let extra_data = reader.read_bytes(header.extra_field_length as usize)?;
        let comment_bytes = reader.read_bytes(header.file_comment_length as usize)?;
        let comment = String::from_utf8_lossy(comment_bytes).into_owned();

        // Initialize values from header (may be overridden by ZIP64)
        let mut compressed_size = header.compressed_size as u64;
        let mut uncompressed_size = header.uncompressed_size as u64;
        let mut local_header_offset = header.local_header_offset as u64;
        let mut unix_mtime = None;

        let mut extra_reader = BinaryReader::new(extra_data);
        while extra_reader.remaining() >= 4 {
            let id = extra_reader.read_u16()?;
            let size = extra_reader.read_u16()? as usize;
            let Ok(body) = extra_reader.read_bytes(size) else {
                break;
            };
            let mut body = BinaryReader::new(body);

            match id {
                extra_field::ZIP64 => {
                    if header.uncompressed_size == u32::MAX {
                        uncompressed_size = body.read_u64()?;
                    }
                    if header.compressed_size == u32::MAX {
                        compressed_size = body.read_u64()?;
                    }
                    if header.local_header_offset == u32::MAX {
                        local_header_offset = body.read_u64()?;
                    }
                }
                extra_field::EXTENDED_TIMESTAMP => {
                    let flags = body.read_u8()?;
                    if flags & 1 != 0 {
                        unix_mtime = Some(body.read_u32()?);
                    }
                }
                _ => {}
            }
        }

        let local_header_offset = i64::try_from(local_header_offset)
            .ok()
            .and_then(|offset| base_offset.checked_add(offset))
            .and_then(|offset| u64::try_from(offset).ok())
            .ok_or(Error::InvalidDirectory("local header outside of archive"))?;

        Ok(ZipEntry::new(
            name,
            comment,
            compressed_size,
            uncompressed_size,
            header.compression_method,
            header.flags,
            local_header_offset,
            header.last_modified,
            unix_mtime,
            header.crc32,
            header.version_made_by,
            header.external_attrs,
        ))
    }
}

impl std::fmt::Debug for ZipArchive<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipArchive")
            .field("location", &self.location)
            .field("base_offset", &self.base_offset)
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use zerocopy::IntoBytes;

    use super::*;
    use crate::writer::{EntryOptions, ZipWriter};

    /// A ZIP64 end record, its locator and a sentinel classic end record,
    /// with no central directory at all.
    fn zip64_end(central_dir_size: u64, central_dir_offset: u64, record_at: u64) -> Vec<u8> {
        let record = Eocd64Record {
            record_size: 44,
            version_made_by: 45,
            version_needed: 45,
            disk_number: 0,
            central_dir_disk: 0,
            central_dir_count_disk: 1,
            central_dir_count_total: 1,
            central_dir_size,
            central_dir_offset,
        };
        let locator = Eocd64Locator {
            zip64_eocd_disk: 0,
            zip64_eocd_offset: record_at,
            total_disks: 1,
        };
        let eocd = EocdRecord {
            central_dir_count_disk: 0xFFFF,
            central_dir_count_total: 0xFFFF,
            central_dir_size: u32::MAX,
            central_dir_offset: u32::MAX,
            ..Default::default()
        };

        let mut data = Eocd64Record::MAGIC.to_vec();
        data.extend_from_slice(record.as_bytes());
        data.extend_from_slice(&Eocd64Locator::MAGIC);
        data.extend_from_slice(locator.as_bytes());
        data.extend_from_slice(&EocdRecord::MAGIC);
        data.extend_from_slice(eocd.as_bytes());
        data
    }

    fn options() -> EntryOptions {
        EntryOptions::new(UNIX_EPOCH + Duration::from_secs(1_600_000_000))
    }

    fn sample_archive(base_offset: u64) -> Vec<u8> {
        let mut writer = ZipWriter::with_base_offset(Vec::new(), base_offset);
        writer
            .add_directory("public", &options().comment("dir"))
            .unwrap();
        writer
            .add_file("public/test.txt", b"hello", &options())
            .unwrap();
        writer
            .add_file("public/big.txt", &b"abc".repeat(30_000), &options())
            .unwrap();
        writer.finish().unwrap()
    }

    #[test]
    fn test_reads_archive_with_relative_offsets() {
        let data = sample_archive(0);
        let archive = ZipArchive::new(&data).unwrap();

        assert_eq!(archive.len(), 3);
        assert_eq!(archive.base_offset(), 0);
        assert_eq!(archive.entries()[0].comment(), "dir");

        let entry = archive.find("public/test.txt").unwrap();
        assert_eq!(archive.read(entry).unwrap(), b"hello");
    }

    #[test]
    fn test_reads_prefixed_archive_from_whole_file_and_from_window() {
        let prefix = vec![0xAAu8; 1000];
        let mut file = prefix.clone();
        file.extend(sample_archive(prefix.len() as u64));

        let whole = ZipArchive::new(&file).unwrap();
        assert_eq!(whole.base_offset(), 0);
        assert_eq!(
            whole.read(whole.find("public/big.txt").unwrap()).unwrap(),
            b"abc".repeat(30_000)
        );

        let size = file.len() as u64 - 1000;
        let window = ZipArchive::at(&file, 1000, size).unwrap();
        assert_eq!(window.base_offset(), -1000);
        assert_eq!(window.location(), Location { offset: 1000, size });
        assert_eq!(
            window.read(window.find("public/test.txt").unwrap()).unwrap(),
            b"hello"
        );
    }

    #[test]
    fn test_tolerates_trailing_bytes_after_eocd() {
        let mut data = sample_archive(0);
        data.extend_from_slice(&[0u8; 7]);

        let archive = ZipArchive::new(&data).unwrap();
        assert_eq!(archive.len(), 3);
    }

    #[test]
    fn test_missing_eocd() {
        let data = vec![0u8; 4096];
        assert!(matches!(ZipArchive::new(&data), Err(Error::EocdNotFound)));
        assert!(matches!(ZipArchive::new(&[]), Err(Error::EocdNotFound)));
    }

    #[test]
    fn test_rejects_zip64_sizes_beyond_signed_range() {
        let data = zip64_end(0x8000_0000_0000_0000, 0, 0);
        assert!(matches!(
            ZipArchive::new(&data),
            Err(Error::InvalidDirectory(_))
        ));

        let data = zip64_end(0, u64::MAX, 0);
        assert!(matches!(
            ZipArchive::new(&data),
            Err(Error::InvalidDirectory(_))
        ));
    }

    #[test]
    fn test_rejects_zip64_locator_pointing_past_the_data() {
        // Without the record in front, only the stored offset is left to try.
        let data = zip64_end(0, 0, u64::MAX).split_off(Eocd64Record::LEN);
        assert!(matches!(
            ZipArchive::new(&data),
            Err(Error::Zip64EocdNotFound)
        ));
    }

    #[test]
    fn test_empty_zip64_directory() {
        let mut data = zip64_end(0, 0, 0);
        // Patch the entry counts down to zero.
        data[24..40].fill(0);

        let archive = ZipArchive::new(&data).unwrap();
        assert!(archive.is_empty());
        assert_eq!(archive.base_offset(), 0);
    }

    #[test]
    fn test_window_out_of_bounds() {
        let data = sample_archive(0);
        let len = data.len() as u64;

        assert!(matches!(
            ZipArchive::at(&data, 10, len),
            Err(Error::WindowOutOfBounds { .. })
        ));
        assert!(matches!(
            ZipArchive::at(&data, u64::MAX, 2),
            Err(Error::WindowOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_corrupted_data_fails_checksum() {
        let mut data = sample_archive(0);
        // "hello" is stored uncompressed right after its local header.
        let pos = memmem::find(&data, b"hello").unwrap();
        data[pos] = b'j';

        let archive = ZipArchive::new(&data).unwrap();
        let entry = archive.find("public/test.txt").unwrap();
        assert!(matches!(
            archive.read(entry),
            Err(Error::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_compression_method_is_unsupported() {
        let mut data = sample_archive(0);
        let records: Vec<usize> = memmem::find_iter(&data, &[0x50, 0x4b, 0x01, 0x02]).collect();
        for pos in records {
            data[pos + 10..pos + 12].copy_from_slice(&93u16.to_le_bytes());
        }

        let archive = ZipArchive::new(&data).unwrap();
        let entry = archive.find("public/test.txt").unwrap();
        assert_eq!(entry.compression_method(), None);
        assert!(matches!(
            archive.read(entry),
            Err(Error::UnsupportedCompression(93))
        ));
    }

    #[test]
    fn test_reads_archive_written_by_zip_crate() {
        use std::io::{Cursor, Write};

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        writer.start_file("public/app.js", options).unwrap();
        writer.write_all(b"console.log('hi')").unwrap();
        let data = writer.finish().unwrap().into_inner();

        let archive = ZipArchive::new(&data).unwrap();
        let entry = archive.find("public/app.js").unwrap();
        assert_eq!(entry.compression_method(), Some(CompressionMethod::Deflate));
        assert_eq!(archive.read(entry).unwrap(), b"console.log('hi')");
    }
}
