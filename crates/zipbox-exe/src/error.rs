//! Error types for container sniffing.

use thiserror::Error;

use crate::Container;

/// Errors that can occur while locating an embedded archive.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] zipbox_common::Error),

    /// ZIP error.
    #[error("ZIP error: {0}")]
    Zip(#[from] zipbox_zip::Error),

    /// The data does not start with the container's magic.
    #[error("not a {0} file")]
    BadMagic(Container),

    /// The container headers are inconsistent.
    #[error("malformed {container} file: {reason}")]
    Malformed {
        container: Container,
        reason: &'static str,
    },

    /// Every strategy failed.
    #[error("no embedded archive found in a raw ZIP, Mach-O, ELF or PE file")]
    UnrecognizedContainer,
}

/// Result type for sniffing operations.
pub type Result<T> = std::result::Result<T, Error>;
