//! PE/COFF section table.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
use zipbox_common::BinaryReader;
use zipbox_zip::ZipArchive;

use crate::sniff::locate_in_sections;
use crate::{Container, Error, Result, Section};

const DOS_MAGIC: &[u8; 2] = b"MZ";
const PE_MAGIC: &[u8; 4] = b"PE\0\0";
/// Offset of `e_lfanew` in the DOS header.
const PE_POINTER_OFFSET: u64 = 0x3c;

/// COFF file header, following the `PE\0\0` signature.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct CoffHeader {
    pub machine: u16,
    pub number_of_sections: u16,
    pub time_date_stamp: u32,
    pub pointer_to_symbol_table: u32,
    pub number_of_symbols: u32,
    pub size_of_optional_header: u16,
    pub characteristics: u16,
}

/// Section table entry.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct SectionHeader {
    pub name: [u8; 8],
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub size_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
    pub pointer_to_relocations: u32,
    pub pointer_to_linenumbers: u32,
    pub number_of_relocations: u16,
    pub number_of_linenumbers: u16,
    pub characteristics: u32,
}

/// Parse the file ranges of every section that has raw data.
pub fn sections(data: &[u8]) -> Result<Vec<Section>> {
    let mut reader = BinaryReader::new(data);
    reader
        .expect_magic(DOS_MAGIC)
        .map_err(|_| Error::BadMagic(Container::Pe))?;

    reader.seek(PE_POINTER_OFFSET)?;
    let pe_offset = reader.read_u32()? as u64;

    reader.seek(pe_offset)?;
    reader
        .expect_magic(PE_MAGIC)
        .map_err(|_| Error::BadMagic(Container::Pe))?;

    let coff: CoffHeader = reader.read_struct()?;
    reader.advance(coff.size_of_optional_header as usize);

    let count = coff.number_of_sections as usize;
    if reader.remaining() < count * std::mem::size_of::<SectionHeader>() {
        return Err(Error::Malformed {
            container: Container::Pe,
            reason: "section table extends past end of file",
        });
    }

    let mut sections = Vec::with_capacity(count);
    for _ in 0..count {
        let header: SectionHeader = reader.read_struct()?;
        if header.size_of_raw_data == 0 {
            continue;
        }
        sections.push(Section {
            offset: header.pointer_to_raw_data as u64,
            size: header.size_of_raw_data as u64,
        });
    }

    Ok(sections)
}

/// Sniffing strategy: try every section, then the bytes after the last one.
pub fn locate(data: &[u8]) -> Result<ZipArchive<'_>> {
    let sections = sections(data)?;
    locate_in_sections(data, Container::Pe, &sections)
}
