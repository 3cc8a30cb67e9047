//! Ordered strategy list and the sniffing entry points.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use zipbox_zip::{Location, ZipArchive};

use crate::{elf, macho, pe, Container, Error, Result, Section};

/// A side-effect-free attempt at finding an archive in one container format.
pub type Strategy = fn(&[u8]) -> Result<ZipArchive<'_>>;

/// Strategies in the order they are tried. The first success wins.
pub const STRATEGIES: [(Container, Strategy); 4] = [
    (Container::Zip, bare),
    (Container::MachO, macho::locate),
    (Container::Elf, elf::locate),
    (Container::Pe, pe::locate),
];

/// An archive found by [`sniff`], with the container that held it.
#[derive(Debug)]
pub struct Embedded<'a> {
    pub container: Container,
    pub archive: ZipArchive<'a>,
}

/// Sniffing strategy: the whole data is an end-anchored ZIP.
pub fn bare(data: &[u8]) -> Result<ZipArchive<'_>> {
    Ok(ZipArchive::new(data)?)
}

/// Try every strategy in order and return the first archive found.
pub fn sniff(data: &[u8]) -> Result<Embedded<'_>> {
    for (container, strategy) in STRATEGIES {
        match strategy(data) {
            Ok(archive) => {
                let location = archive.location();
                tracing::debug!(
                    %container,
                    offset = location.offset,
                    size = location.size,
                    entries = archive.len(),
                    "embedded archive found"
                );
                return Ok(Embedded { container, archive });
            }
            Err(e) => {
                tracing::debug!(%container, error = %e, "sniff strategy failed");
            }
        }
    }

    Err(Error::UnrecognizedContainer)
}

/// Try to anchor an archive at the end of each section in turn, then in the
/// bytes that follow the furthest section end.
pub(crate) fn locate_in_sections<'a>(
    data: &'a [u8],
    container: Container,
    sections: &[Section],
) -> Result<ZipArchive<'a>> {
    let mut max_end = 0;
    for section in sections {
        if let Ok(archive) = ZipArchive::at(data, section.offset, section.size) {
            return Ok(archive);
        }
        max_end = max_end.max(section.end());
    }

    let len = data.len() as u64;
    if max_end > len {
        return Err(Error::Malformed {
            container,
            reason: "sections extend past end of file",
        });
    }

    Ok(ZipArchive::at(data, max_end, len - max_end)?)
}

/// A memory-mapped file known to contain an archive.
///
/// # Example
///
/// ```no_run
/// use zipbox_exe::MappedArchive;
///
/// let mapped = MappedArchive::open("/usr/local/bin/server")?;
/// println!("{} archive at {:?}", mapped.container(), mapped.location());
/// for entry in mapped.archive()?.iter() {
///     println!("{}", entry.name());
/// }
/// # Ok::<(), zipbox_exe::Error>(())
/// ```
pub struct MappedArchive {
    mmap: Mmap,
    container: Container,
    location: Location,
}

impl MappedArchive {
    /// Map a file and sniff it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mmap = unsafe { Mmap::map(&file)? };

        let (container, location) = {
            let found = sniff(&mmap)?;
            (found.container, found.archive.location())
        };

        Ok(Self {
            mmap,
            container,
            location,
        })
    }

    /// Get the container format that held the archive.
    #[inline]
    pub fn container(&self) -> Container {
        self.container
    }

    /// Get the window the archive was found in.
    #[inline]
    pub fn location(&self) -> Location {
        self.location
    }

    /// Get the whole mapped file.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.mmap
    }

    /// Re-anchor the archive reader at the sniffed location.
    pub fn archive(&self) -> Result<ZipArchive<'_>> {
        Ok(ZipArchive::at(
            &self.mmap,
            self.location.offset,
            self.location.size,
        )?)
    }
}

/// Map a file and sniff it.
pub fn sniff_file<P: AsRef<Path>>(path: P) -> Result<MappedArchive> {
    MappedArchive::open(path)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::fixtures;

    #[test]
    fn test_each_strategy_recognizes_its_fixture() {
        let fixtures: [(Container, Vec<u8>); 4] = [
            (Container::Zip, fixtures::sample_archive(0)),
            (
                Container::MachO,
                fixtures::with_trailing_archive(|zip| fixtures::mach_o(true, false, zip)),
            ),
            (
                Container::Elf,
                fixtures::with_trailing_archive(|zip| fixtures::elf(true, false, zip)),
            ),
            (Container::Pe, fixtures::with_trailing_archive(fixtures::pe)),
        ];

        for ((container, strategy), (fixture_container, file)) in STRATEGIES.iter().zip(&fixtures)
        {
            assert_eq!(container, fixture_container);
            let archive = strategy(file).unwrap();
            fixtures::assert_sample(&archive);
        }
    }

    #[test]
    fn test_no_signature_is_rejected_by_every_strategy() {
        let file = fixtures::elf(true, false, &[0u8; 256]);

        for (container, strategy) in STRATEGIES {
            assert!(strategy(&file).is_err(), "{container} accepted the fixture");
        }
        assert!(matches!(sniff(&file), Err(Error::UnrecognizedContainer)));
    }

    #[test]
    fn test_falls_through_to_container_strategy() {
        let file = fixtures::elf_with_embedded_archive();

        assert!(bare(&file).is_err());
        let found = sniff(&file).unwrap();
        assert_eq!(found.container, Container::Elf);
        fixtures::assert_sample(&found.archive);
    }

    #[test]
    fn test_hostile_zip64_end_is_an_error() {
        let file = fixtures::zip64_end_with_huge_directory();

        assert!(matches!(
            bare(&file),
            Err(Error::Zip(zipbox_zip::Error::InvalidDirectory(_)))
        ));
        assert!(matches!(sniff(&file), Err(Error::UnrecognizedContainer)));
    }

    #[test]
    fn test_sniff_is_idempotent() {
        let file = fixtures::with_trailing_archive(fixtures::pe);

        let first = sniff(&file).unwrap();
        let second = sniff(&file).unwrap();
        assert_eq!(first.container, second.container);
        assert_eq!(first.archive.location(), second.archive.location());
    }

    #[test]
    fn test_sniff_file() {
        let mut temp = tempfile::NamedTempFile::new().unwrap();
        temp.write_all(&fixtures::with_trailing_archive(|zip| {
            fixtures::mach_o(false, true, zip)
        }))
        .unwrap();
        temp.flush().unwrap();

        let mapped = sniff_file(temp.path()).unwrap();
        assert_eq!(mapped.container(), Container::Zip);
        fixtures::assert_sample(&mapped.archive().unwrap());
    }
}
