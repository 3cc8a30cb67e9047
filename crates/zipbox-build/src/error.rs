//! Error types for the builder.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a build. Nothing is written to the target binary once
/// any of these has occurred.
#[derive(Debug, Error)]
pub enum Error {
    /// A lookup call whose box name is not a string literal.
    #[error("{}:{line}: argument must be a string literal", file.display())]
    ScanLiteralRequired { file: PathBuf, line: usize },

    /// A box name that is absolute or climbs out of its package.
    #[error("{}:{line}: box name {name:?} must stay inside the package", file.display())]
    InvalidBoxName {
        file: PathBuf,
        line: usize,
        name: String,
    },

    /// A source file that does not parse.
    #[error("{}:{line}: {message}", file.display())]
    Parse {
        file: PathBuf,
        line: usize,
        message: String,
    },

    /// Import name or path is empty or not a path.
    #[error("invalid import: {0}")]
    InvalidImport(String),

    #[error("search path not found: {}", .0.display())]
    SearchPathNotFound(PathBuf),

    #[error("box directory not found: {}", .0.display())]
    BoxDirNotFound(PathBuf),

    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP error.
    #[error("ZIP error: {0}")]
    Zip(#[from] zipbox_zip::Error),
}

/// Result type for build operations.
pub type Result<T> = std::result::Result<T, Error>;
