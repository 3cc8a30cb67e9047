//! Mach-O segment table.
//!
//! Only thin images are recognised. Both byte orders and both word sizes
//! are handled; the segment file ranges come from `LC_SEGMENT` and
//! `LC_SEGMENT_64` load commands.

use zipbox_common::{BigEndian, BinaryReader, ByteOrder, LittleEndian};
use zipbox_zip::ZipArchive;

use crate::sniff::locate_in_sections;
use crate::{Container, Error, Result, Section};

/// 32-bit magic, file in host order when read little-endian.
const MH_MAGIC: u32 = 0xfeed_face;
/// 64-bit magic, file in host order when read little-endian.
const MH_MAGIC_64: u32 = 0xfeed_facf;
/// 32-bit magic of a big-endian file read little-endian.
const MH_CIGAM: u32 = 0xcefa_edfe;
/// 64-bit magic of a big-endian file read little-endian.
const MH_CIGAM_64: u32 = 0xcffa_edfe;

const LC_SEGMENT: u32 = 0x1;
const LC_SEGMENT_64: u32 = 0x19;

/// Parse the file ranges of every segment load command.
pub fn segments(data: &[u8]) -> Result<Vec<Section>> {
    let magic = BinaryReader::new(data)
        .peek_u32()
        .map_err(|_| Error::BadMagic(Container::MachO))?;

    match magic {
        MH_MAGIC => parse::<LittleEndian>(data, false),
        MH_MAGIC_64 => parse::<LittleEndian>(data, true),
        MH_CIGAM => parse::<BigEndian>(data, false),
        MH_CIGAM_64 => parse::<BigEndian>(data, true),
        _ => Err(Error::BadMagic(Container::MachO)),
    }
}

/// Sniffing strategy: try every segment, then the bytes after the last one.
pub fn locate(data: &[u8]) -> Result<ZipArchive<'_>> {
    let segments = segments(data)?;
    locate_in_sections(data, Container::MachO, &segments)
}

fn parse<E: ByteOrder>(data: &[u8], wide: bool) -> Result<Vec<Section>> {
    let header_size: u64 = if wide { 32 } else { 28 };

    // magic, cputype, cpusubtype, filetype
    let mut reader = BinaryReader::at(data, 16)?;
    let ncmds = reader.read_u32_as::<E>()?;
    let sizeofcmds = reader.read_u32_as::<E>()? as u64;

    if header_size + sizeofcmds > data.len() as u64 {
        return Err(malformed("load commands extend past end of file"));
    }

    let mut segments = Vec::new();
    let mut offset = header_size;
    for _ in 0..ncmds {
        let mut reader = BinaryReader::at(data, offset)?;
        let cmd = reader.read_u32_as::<E>()?;
        let cmdsize = reader.read_u32_as::<E>()?;
        if cmdsize < 8 {
            return Err(malformed("load command smaller than its header"));
        }

        match cmd {
            LC_SEGMENT => {
                reader.advance(16 + 8); // segname, vmaddr, vmsize
                let offset = reader.read_u32_as::<E>()? as u64;
                let size = reader.read_u32_as::<E>()? as u64;
                segments.push(Section { offset, size });
            }
            LC_SEGMENT_64 => {
                reader.advance(16 + 16); // segname, vmaddr, vmsize
                let offset = reader.read_u64_as::<E>()?;
                let size = reader.read_u64_as::<E>()?;
                segments.push(Section { offset, size });
            }
            _ => {}
        }

        offset += cmdsize as u64;
    }

    Ok(segments)
}

fn malformed(reason: &'static str) -> Error {
    Error::Malformed {
        container: Container::MachO,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_segments_64_little_endian() {
        let file = fixtures::mach_o(true, false, &[]);
        assert_eq!(
            segments(&file).unwrap(),
            vec![Section { offset: 0, size: 104 }]
        );
    }

    #[test]
    fn test_segments_32_big_endian() {
        let file = fixtures::mach_o(false, true, &[]);
        assert_eq!(
            segments(&file).unwrap(),
            vec![Section { offset: 0, size: 84 }]
        );
    }

    #[test]
    fn test_locate_trailing_archive() {
        for (wide, big) in [(true, false), (false, true)] {
            let file = fixtures::with_trailing_archive(|zip| fixtures::mach_o(wide, big, zip));
            let archive = locate(&file).unwrap();
            fixtures::assert_sample(&archive);
        }
    }

    #[test]
    fn test_rejects_other_formats() {
        let file = fixtures::elf(true, false, &[]);
        assert!(matches!(
            segments(&file),
            Err(Error::BadMagic(Container::MachO))
        ));
        assert!(matches!(segments(&[]), Err(Error::BadMagic(_))));
    }

    #[test]
    fn test_truncated_load_commands() {
        let mut file = fixtures::mach_o(true, false, &[]);
        file.truncate(60);
        assert!(matches!(segments(&file), Err(Error::Malformed { .. })));
    }
}
