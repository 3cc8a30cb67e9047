//! ZIP archive entry.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::zip::central_dir::flags;
use crate::zip::CompressionMethod;

/// An entry within a ZIP archive.
///
/// This contains metadata from the central directory, not the file data
/// itself. Use [`ZipArchive::read`](crate::ZipArchive::read) to get the
/// decompressed contents.
#[derive(Debug, Clone)]
pub struct ZipEntry {
    /// Stored entry name.
    name: String,
    /// Per-entry comment from the central directory.
    comment: String,
    /// Compressed size in bytes.
    compressed_size: u64,
    /// Uncompressed size in bytes.
    uncompressed_size: u64,
    /// Raw compression method.
    compression_method: u16,
    /// General purpose flags.
    flags: u16,
    /// Offset to the local file header, relative to the archive window.
    local_header_offset: u64,
    /// DOS date/time of last modification.
    dos_datetime: u32,
    /// Unix modification time from the extended timestamp field.
    unix_mtime: Option<u32>,
    /// CRC32 checksum of uncompressed data.
    crc32: u32,
    /// Host system in the high byte, ZIP version in the low byte.
    version_made_by: u16,
    /// External file attributes.
    external_attrs: u32,
}

impl ZipEntry {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        comment: String,
        compressed_size: u64,
        uncompressed_size: u64,
        compression_method: u16,
        flags: u16,
        local_header_offset: u64,
        dos_datetime: u32,
        unix_mtime: Option<u32>,
        crc32: u32,
        version_made_by: u16,
        external_attrs: u32,
    ) -> Self {
        Self {
            name,
            comment,
            compressed_size,
            uncompressed_size,
            compression_method,
            flags,
            local_header_offset,
            dos_datetime,
            unix_mtime,
            crc32,
            version_made_by,
            external_attrs,
        }
    }

    /// Get the stored entry name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the entry comment.
    #[inline]
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Get the compressed size in bytes.
    #[inline]
    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    /// Get the uncompressed size in bytes.
    #[inline]
    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    /// Get the compression method, if it is one this crate can decode.
    #[inline]
    pub fn compression_method(&self) -> Option<CompressionMethod> {
        CompressionMethod::try_from(self.compression_method).ok()
    }

    /// Get the raw compression method number.
    #[inline]
    pub fn raw_compression_method(&self) -> u16 {
        self.compression_method
    }

    /// Check if the entry is encrypted.
    #[inline]
    pub fn is_encrypted(&self) -> bool {
        self.flags & flags::ENCRYPTED != 0
    }

    /// Get the offset to the local file header within the archive window.
    #[inline]
    pub(crate) fn local_header_offset(&self) -> u64 {
        self.local_header_offset
    }

    /// Get the CRC32 checksum.
    #[inline]
    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    /// Get the last modification time.
    ///
    /// The extended timestamp field wins over the DOS date/time, which only
    /// has two-second resolution. Returns None if neither is usable.
    pub fn last_modified(&self) -> Option<SystemTime> {
        match self.unix_mtime {
            Some(secs) => UNIX_EPOCH.checked_add(Duration::from_secs(secs as u64)),
            None => dos_datetime_to_system_time(self.dos_datetime),
        }
    }

    /// Get the Unix mode bits, when the entry was written on a Unix host.
    pub fn unix_mode(&self) -> Option<u32> {
        const HOST_UNIX: u16 = 3;
        let mode = self.external_attrs >> 16;
        if self.version_made_by >> 8 == HOST_UNIX && mode != 0 {
            Some(mode)
        } else {
            None
        }
    }
}

/// Convert DOS date/time format to SystemTime.
///
/// DOS date/time format:
/// - Time: bits 0-4 = seconds/2, bits 5-10 = minutes, bits 11-15 = hours
/// - Date: bits 16-20 = day, bits 21-24 = month, bits 25-31 = year-1980
pub fn dos_datetime_to_system_time(datetime: u32) -> Option<SystemTime> {
    let year = 1980 + ((datetime >> 25) & 0x7F) as i64;
    let month = ((datetime >> 21) & 0x0F) as i64;
    let day = ((datetime >> 16) & 0x1F) as i64;
    let hour = ((datetime >> 11) & 0x1F) as i64;
    let minute = ((datetime >> 5) & 0x3F) as i64;
    let second = ((datetime & 0x1F) * 2) as i64;

    if !(1..=12).contains(&month)
        || !(1..=31).contains(&day)
        || hour > 23
        || minute > 59
        || second > 59
    {
        return None;
    }

    let days = days_from_civil(year, month, day);
    let secs = days * 86400 + hour * 3600 + minute * 60 + second;

    UNIX_EPOCH.checked_add(Duration::from_secs(u64::try_from(secs).ok()?))
}

/// Convert a SystemTime to DOS date/time format, clamped to the range DOS
/// dates can express (1980-01-01 to 2107-12-31).
pub fn system_time_to_dos_datetime(time: SystemTime) -> u32 {
    const MIN: u32 = 1 << 21 | 1 << 16;

    let secs = match time.duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_secs() as i64,
        Err(_) => return MIN,
    };

    let (year, month, day) = civil_from_days(secs.div_euclid(86400));
    if year < 1980 {
        return MIN;
    }
    if year > 2107 {
        return (127 << 25) | (12 << 21) | (31 << 16) | (23 << 11) | (59 << 5) | 29;
    }

    let rem = secs.rem_euclid(86400);
    let (hour, minute, second) = (rem / 3600, rem % 3600 / 60, rem % 60);

    ((year - 1980) as u32) << 25
        | (month as u32) << 21
        | (day as u32) << 16
        | (hour as u32) << 11
        | (minute as u32) << 5
        | (second as u32) / 2
}

/// Days since 1970-01-01 for a proleptic Gregorian date.
fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y.rem_euclid(400);
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe - 719468
}

/// Proleptic Gregorian date for a count of days since 1970-01-01.
fn civil_from_days(days: i64) -> (i64, i64, i64) {
    let z = days + 719468;
    let era = z.div_euclid(146097);
    let doe = z.rem_euclid(146097);
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month, day)
}
