//! Container kinds and section ranges.

use std::fmt;

/// Executable container formats an archive can be embedded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Container {
    /// A ZIP archive anchored at the end of the data, possibly after
    /// arbitrary prefix bytes.
    Zip,
    /// Thin Mach-O image.
    MachO,
    /// ELF image.
    Elf,
    /// PE/COFF image.
    Pe,
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Container::Zip => "ZIP",
            Container::MachO => "Mach-O",
            Container::Elf => "ELF",
            Container::Pe => "PE",
        })
    }
}

/// File byte range of a segment or section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    /// Start offset within the file.
    pub offset: u64,
    /// Length in bytes.
    pub size: u64,
}

impl Section {
    /// End offset within the file.
    #[inline]
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.size)
    }
}
