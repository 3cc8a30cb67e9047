//! Error types for the runtime.

use std::io;

use thiserror::Error;

/// Errors returned by box lookups and file handles.
#[derive(Debug, Error)]
pub enum Error {
    /// No box or node with this name.
    #[error("not found: {0}")]
    NotFound(String),

    /// Box names must be relative.
    #[error("absolute path rejected: {0}")]
    AbsolutePathRejected(String),

    /// No strategy found an archive in the executable.
    #[error("no embedded archive found")]
    UnrecognizedContainer,

    /// The file's contents could not be decompressed at ingest.
    #[error("data unavailable for {0}")]
    DataUnavailable(String),

    /// Read or seek on a directory handle.
    #[error("{0} is a directory")]
    IsDirectory(String),

    /// Directory listing on a file handle.
    #[error("{0} is not a directory")]
    NotADirectory(String),

    /// Operation on a closed handle.
    #[error("file is closed")]
    Closed,

    /// Second close of the same handle.
    #[error("file already closed")]
    AlreadyClosed,

    /// String accessor on content that is not UTF-8.
    #[error("{path} is not valid UTF-8: {source}")]
    Utf8 {
        path: String,
        #[source]
        source: std::str::Utf8Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// ZIP error.
    #[error("ZIP error: {0}")]
    Zip(#[from] zipbox_zip::Error),

    /// Container parsing error other than "nothing found".
    #[error("{0}")]
    Exe(zipbox_exe::Error),
}

impl From<zipbox_exe::Error> for Error {
    fn from(err: zipbox_exe::Error) -> Self {
        match err {
            zipbox_exe::Error::UnrecognizedContainer => Error::UnrecognizedContainer,
            zipbox_exe::Error::Io(e) => Error::Io(e),
            zipbox_exe::Error::Zip(e) => Error::Zip(e),
            other => Error::Exe(other),
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match err {
            Error::Io(e) => return e,
            Error::NotFound(_) => io::ErrorKind::NotFound,
            Error::AbsolutePathRejected(_) => io::ErrorKind::InvalidInput,
            Error::UnrecognizedContainer | Error::DataUnavailable(_) | Error::Utf8 { .. } => {
                io::ErrorKind::InvalidData
            }
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;
