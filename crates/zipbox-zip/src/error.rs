//! Error types for the ZIP crate.

use thiserror::Error;

/// Errors that can occur when reading or writing ZIP archives.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] zipbox_common::Error),

    /// Invalid ZIP magic bytes.
    #[error("invalid ZIP signature: expected {expected:#010x}, got {actual:#010x}")]
    InvalidSignature { expected: u32, actual: u32 },

    /// Could not find the end of central directory record.
    #[error("could not find end of central directory record")]
    EocdNotFound,

    /// ZIP64 record not found when expected.
    #[error("ZIP64 end of central directory not found")]
    Zip64EocdNotFound,

    /// The requested window does not fit inside the source.
    #[error("window {offset}+{size} exceeds source length {len}")]
    WindowOutOfBounds { offset: u64, size: u64, len: u64 },

    /// The central directory is inconsistent with its end record.
    #[error("invalid central directory: {0}")]
    InvalidDirectory(&'static str),

    /// Unsupported compression method.
    #[error("unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    /// Encrypted entries cannot be read.
    #[error("entry is encrypted: {0}")]
    Encrypted(String),

    /// Decompression error.
    #[error("decompression error: {0}")]
    Decompression(String),

    /// Entry data failed its integrity check.
    #[error("checksum mismatch in {name}: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    /// Entry data decoded to the wrong length.
    #[error("size mismatch in {name}: expected {expected}, got {actual}")]
    SizeMismatch {
        name: String,
        expected: u64,
        actual: u64,
    },

    /// A value does not fit the classic (non-ZIP64) format.
    #[error("{0} exceeds the ZIP32 limit")]
    TooLarge(&'static str),
}

/// Result type for ZIP operations.
pub type Result<T> = std::result::Result<T, Error>;
