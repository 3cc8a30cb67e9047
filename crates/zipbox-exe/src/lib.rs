//! Locate a ZIP archive embedded in an executable.
//!
//! A program built with appended assets is still a normal Mach-O, ELF or PE
//! image; the archive lives either after the last byte the loader cares
//! about or inside one of the image's segments. [`sniff`] tries, in order:
//!
//! 1. the whole file as an end-anchored ZIP,
//! 2. each Mach-O segment, then the bytes after the last segment,
//! 3. each ELF section with file bytes, then the bytes after the last one,
//! 4. each PE section with raw data, then the bytes after the last one,
//!
//! and fails with [`Error::UnrecognizedContainer`] only when all of them do.
//!
//! # Example
//!
//! ```no_run
//! use zipbox_exe::sniff;
//!
//! let data = std::fs::read("/usr/local/bin/server")?;
//! let found = sniff(&data)?;
//! println!("{} entries in {}", found.archive.len(), found.container);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod container;
pub mod elf;
mod error;
pub mod macho;
pub mod pe;
mod sniff;

#[cfg(test)]
mod fixtures;

pub use container::{Container, Section};
pub use error::{Error, Result};
pub use sniff::{bare, sniff, sniff_file, Embedded, MappedArchive, Strategy, STRATEGIES};
