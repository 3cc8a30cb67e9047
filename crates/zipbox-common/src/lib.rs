//! Common utilities for zipbox.
//!
//! This crate provides the foundations shared by the other zipbox crates:
//!
//! - [`BinaryReader`] - Bounds-checked binary reading from byte slices, in
//!   either byte order
//! - [`layout`] - Conventions shared by the archive builder and the runtime
//!   (directory sentinel, box naming)

mod error;
mod reader;

pub mod layout;

pub use error::{Error, Result};
pub use reader::BinaryReader;

/// Re-export byte order markers for endian-aware reads.
pub use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
