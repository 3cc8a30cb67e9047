//! ELF section table.
//!
//! Handles 32- and 64-bit images in either byte order. Sections of type
//! `SHT_NOBITS` occupy no file bytes and are left out.

use zipbox_common::{BigEndian, BinaryReader, ByteOrder, LittleEndian};
use zipbox_zip::ZipArchive;

use crate::sniff::locate_in_sections;
use crate::{Container, Error, Result, Section};

const MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const EI_CLASS: usize = 4;
const EI_DATA: usize = 5;

const ELFCLASS32: u8 = 1;
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const ELFDATA2MSB: u8 = 2;

const SHT_NOBITS: u32 = 8;

/// Field positions that differ between the two classes.
struct Layout {
    /// Offset of `e_shoff` in the file header.
    shoff_at: u64,
    /// Offset of `e_shentsize`, followed by `e_shnum`.
    shentsize_at: u64,
    /// Minimum section header size.
    shdr_size: u64,
    /// Offset of `sh_offset` within a section header, followed by `sh_size`.
    sh_offset_at: u64,
    /// Addresses and offsets are 64-bit.
    wide: bool,
}

const ELF32: Layout = Layout {
    shoff_at: 0x20,
    shentsize_at: 0x2e,
    shdr_size: 40,
    sh_offset_at: 16,
    wide: false,
};

const ELF64: Layout = Layout {
    shoff_at: 0x28,
    shentsize_at: 0x3a,
    shdr_size: 64,
    sh_offset_at: 24,
    wide: true,
};

impl Layout {
    fn read_word<E: ByteOrder>(&self, reader: &mut BinaryReader) -> Result<u64> {
        if self.wide {
            Ok(reader.read_u64_as::<E>()?)
        } else {
            Ok(reader.read_u32_as::<E>()? as u64)
        }
    }
}

/// Parse the file ranges of every section that has file bytes.
pub fn sections(data: &[u8]) -> Result<Vec<Section>> {
    if data.len() < 16 || data[..4] != MAGIC {
        return Err(Error::BadMagic(Container::Elf));
    }

    let layout = match data[EI_CLASS] {
        ELFCLASS32 => &ELF32,
        ELFCLASS64 => &ELF64,
        _ => return Err(malformed("unknown class")),
    };

    match data[EI_DATA] {
        ELFDATA2LSB => parse::<LittleEndian>(data, layout),
        ELFDATA2MSB => parse::<BigEndian>(data, layout),
        _ => Err(malformed("unknown data encoding")),
    }
}

/// Sniffing strategy: try every section, then the bytes after the last one.
pub fn locate(data: &[u8]) -> Result<ZipArchive<'_>> {
    let sections = sections(data)?;
    locate_in_sections(data, Container::Elf, &sections)
}

fn parse<E: ByteOrder>(data: &[u8], layout: &Layout) -> Result<Vec<Section>> {
    let mut reader = BinaryReader::at(data, layout.shoff_at)?;
    let shoff = layout.read_word::<E>(&mut reader)?;

    let mut reader = BinaryReader::at(data, layout.shentsize_at)?;
    let shentsize = reader.read_u16_as::<E>()? as u64;
    let mut shnum = reader.read_u16_as::<E>()? as u64;

    if shoff == 0 {
        return Ok(Vec::new());
    }
    if shentsize < layout.shdr_size {
        return Err(malformed("section header entry too small"));
    }

    // Extended numbering keeps the real count in the first header's sh_size.
    if shnum == 0 {
        let first = shoff
            .checked_add(layout.sh_offset_at)
            .ok_or_else(|| malformed("section header table overflows"))?;
        let mut reader = BinaryReader::at(data, first)?;
        layout.read_word::<E>(&mut reader)?;
        shnum = layout.read_word::<E>(&mut reader)?;
    }

    let table_end = shnum
        .checked_mul(shentsize)
        .and_then(|len| len.checked_add(shoff))
        .ok_or_else(|| malformed("section header table overflows"))?;
    if table_end > data.len() as u64 {
        return Err(malformed("section header table extends past end of file"));
    }

    let mut sections = Vec::with_capacity(shnum as usize);
    for index in 0..shnum {
        let base = shoff + index * shentsize;

        let mut reader = BinaryReader::at(data, base + 4)?;
        let sh_type = reader.read_u32_as::<E>()?;
        if sh_type == SHT_NOBITS {
            continue;
        }

        reader.seek(base + layout.sh_offset_at)?;
        let offset = layout.read_word::<E>(&mut reader)?;
        let size = layout.read_word::<E>(&mut reader)?;
        sections.push(Section { offset, size });
    }

    Ok(sections)
}

fn malformed(reason: &'static str) -> Error {
    Error::Malformed {
        container: Container::Elf,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_sections_skip_nobits() {
        let file = fixtures::elf(true, false, &[]);
        assert_eq!(
            sections(&file).unwrap(),
            vec![
                Section { offset: 0, size: 0 },
                Section { offset: 64, size: 16 },
            ]
        );
    }

    #[test]
    fn test_sections_32_big_endian() {
        let file = fixtures::elf(false, true, &[]);
        assert_eq!(
            sections(&file).unwrap(),
            vec![
                Section { offset: 0, size: 0 },
                Section { offset: 52, size: 16 },
            ]
        );
    }

    #[test]
    fn test_locate_trailing_archive() {
        for (wide, big) in [(true, false), (false, true)] {
            let file = fixtures::with_trailing_archive(|zip| fixtures::elf(wide, big, zip));
            let archive = locate(&file).unwrap();
            fixtures::assert_sample(&archive);
        }
    }

    #[test]
    fn test_locate_archive_inside_section() {
        let file = fixtures::elf_with_embedded_archive();
        let archive = locate(&file).unwrap();

        assert_eq!(archive.location().offset, 192);
        fixtures::assert_sample(&archive);
    }

    #[test]
    fn test_rejects_bad_header() {
        assert!(matches!(
            sections(b"MZ not an elf file"),
            Err(Error::BadMagic(Container::Elf))
        ));

        let mut file = fixtures::elf(true, false, &[]);
        file[EI_CLASS] = 9;
        assert!(matches!(sections(&file), Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_rejects_section_table_offset_near_end_of_address_space() {
        // ELF64 little-endian header with e_shoff = u64::MAX, e_shentsize = 64
        // and e_shnum = 0, which asks for the count in the first header.
        let mut file = vec![0u8; 64];
        file[..4].copy_from_slice(&MAGIC);
        file[EI_CLASS] = ELFCLASS64;
        file[EI_DATA] = ELFDATA2LSB;
        file[0x28..0x30].copy_from_slice(&u64::MAX.to_le_bytes());
        file[0x3A..0x3C].copy_from_slice(&64u16.to_le_bytes());

        assert!(matches!(
            locate(&file),
            Err(Error::Malformed {
                container: Container::Elf,
                reason: "section header table overflows",
            })
        ));
    }
}
