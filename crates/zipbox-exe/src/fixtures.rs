//! Minimal container images built byte by byte for tests.

use std::time::{Duration, UNIX_EPOCH};

use zerocopy::IntoBytes;
use zipbox_zip::zip::{Eocd64Locator, Eocd64Record, EocdRecord};
use zipbox_zip::{EntryOptions, ZipArchive, ZipWriter};

/// Archive holding a `public` directory and `public/test.txt` = "hello",
/// with offsets for a file where it starts `base_offset` bytes in.
pub(crate) fn sample_archive(base_offset: u64) -> Vec<u8> {
    let options = EntryOptions::new(UNIX_EPOCH + Duration::from_secs(1_600_000_000));
    let mut writer = ZipWriter::with_base_offset(Vec::new(), base_offset);
    writer
        .add_directory("public", &options.clone().comment("dir"))
        .unwrap();
    writer
        .add_file("public/test.txt", b"hello", &options)
        .unwrap();
    writer.finish().unwrap()
}

pub(crate) fn assert_sample(archive: &ZipArchive) {
    assert_eq!(archive.len(), 2);
    let entry = archive.find("public/test.txt").unwrap();
    assert_eq!(archive.read(entry).unwrap(), b"hello");
}

/// ZIP64 end records whose central directory size does not fit in an i64.
pub(crate) fn zip64_end_with_huge_directory() -> Vec<u8> {
    let record = Eocd64Record {
        record_size: 44,
        version_made_by: 45,
        version_needed: 45,
        disk_number: 0,
        central_dir_disk: 0,
        central_dir_count_disk: 1,
        central_dir_count_total: 1,
        central_dir_size: 0x8000_0000_0000_0000,
        central_dir_offset: 0,
    };
    let locator = Eocd64Locator {
        zip64_eocd_disk: 0,
        zip64_eocd_offset: 0,
        total_disks: 1,
    };
    let eocd = EocdRecord {
        central_dir_count_disk: 0xFFFF,
        central_dir_count_total: 0xFFFF,
        central_dir_size: u32::MAX,
        central_dir_offset: u32::MAX,
        ..Default::default()
    };

    let mut data = Eocd64Record::MAGIC.to_vec();
    data.extend_from_slice(record.as_bytes());
    data.extend_from_slice(&Eocd64Locator::MAGIC);
    data.extend_from_slice(locator.as_bytes());
    data.extend_from_slice(&EocdRecord::MAGIC);
    data.extend_from_slice(eocd.as_bytes());
    data
}

/// Build an image with `build`, then rebuild it with a sample archive
/// appended at the position the empty image ends.
pub(crate) fn with_trailing_archive<F>(build: F) -> Vec<u8>
where
    F: Fn(&[u8]) -> Vec<u8>,
{
    let prefix_len = build(&[]).len() as u64;
    build(&sample_archive(prefix_len))
}

fn put(file: &mut [u8], offset: usize, bytes: &[u8]) {
    file[offset..offset + bytes.len()].copy_from_slice(bytes);
}

fn u16_bytes(value: u16, big: bool) -> [u8; 2] {
    if big {
        value.to_be_bytes()
    } else {
        value.to_le_bytes()
    }
}

fn u32_bytes(value: u32, big: bool) -> [u8; 4] {
    if big {
        value.to_be_bytes()
    } else {
        value.to_le_bytes()
    }
}

fn u64_bytes(value: u64, big: bool) -> [u8; 8] {
    if big {
        value.to_be_bytes()
    } else {
        value.to_le_bytes()
    }
}

/// Mach-O header with one segment covering the header and load commands.
pub(crate) fn mach_o(wide: bool, big: bool, trailing: &[u8]) -> Vec<u8> {
    let (header_size, cmd_size) = if wide { (32, 72) } else { (28, 56) };
    let total = header_size + cmd_size;
    let mut file = vec![0u8; total];

    let magic: u32 = if wide { 0xfeed_facf } else { 0xfeed_face };
    put(&mut file, 0, &u32_bytes(magic, big));
    put(&mut file, 16, &u32_bytes(1, big)); // ncmds
    put(&mut file, 20, &u32_bytes(cmd_size as u32, big));

    let cmd = header_size;
    put(&mut file, cmd, &u32_bytes(if wide { 0x19 } else { 0x1 }, big));
    put(&mut file, cmd + 4, &u32_bytes(cmd_size as u32, big));
    put(&mut file, cmd + 8, b"__TEXT");
    if wide {
        put(&mut file, cmd + 40, &u64_bytes(0, big));
        put(&mut file, cmd + 48, &u64_bytes(total as u64, big));
    } else {
        put(&mut file, cmd + 32, &u32_bytes(0, big));
        put(&mut file, cmd + 36, &u32_bytes(total as u32, big));
    }

    file.extend_from_slice(trailing);
    file
}

/// ELF header, a 16-byte `.text`, then a section table holding a null
/// section, `.text` and a huge `.bss` that has no file bytes.
pub(crate) fn elf(wide: bool, big: bool, trailing: &[u8]) -> Vec<u8> {
    let (header_size, shdr_size) = if wide { (64, 64) } else { (52, 40) };
    let text = header_size;
    let shoff = text + 16;
    let mut file = vec![0u8; shoff + 3 * shdr_size];

    put(&mut file, 0, &[0x7f, b'E', b'L', b'F']);
    file[4] = if wide { 2 } else { 1 };
    file[5] = if big { 2 } else { 1 };
    file[6] = 1;

    let sections = [(1u32, text as u64, 16u64), (8u32, shoff as u64, 0x1000_0000u64)];
    if wide {
        put(&mut file, 0x28, &u64_bytes(shoff as u64, big));
        put(&mut file, 0x3a, &u16_bytes(shdr_size as u16, big));
        put(&mut file, 0x3c, &u16_bytes(3, big));
        for (index, (sh_type, offset, size)) in sections.iter().enumerate() {
            let base = shoff + (index + 1) * shdr_size;
            put(&mut file, base + 4, &u32_bytes(*sh_type, big));
            put(&mut file, base + 24, &u64_bytes(*offset, big));
            put(&mut file, base + 32, &u64_bytes(*size, big));
        }
    } else {
        put(&mut file, 0x20, &u32_bytes(shoff as u32, big));
        put(&mut file, 0x2e, &u16_bytes(shdr_size as u16, big));
        put(&mut file, 0x30, &u16_bytes(3, big));
        for (index, (sh_type, offset, size)) in sections.iter().enumerate() {
            let base = shoff + (index + 1) * shdr_size;
            put(&mut file, base + 4, &u32_bytes(*sh_type, big));
            put(&mut file, base + 16, &u32_bytes(*offset as u32, big));
            put(&mut file, base + 20, &u32_bytes(*size as u32, big));
        }
    }

    file.extend_from_slice(trailing);
    file
}

/// 64-bit little-endian ELF whose second section holds the sample archive,
/// followed by more padding than an end-anchored EOCD search covers.
pub(crate) fn elf_with_embedded_archive() -> Vec<u8> {
    let zip_offset = 192;
    let zip = sample_archive(0);
    let mut file = vec![0u8; zip_offset];

    put(&mut file, 0, &[0x7f, b'E', b'L', b'F', 2, 1, 1]);
    put(&mut file, 0x28, &64u64.to_le_bytes());
    put(&mut file, 0x3a, &64u16.to_le_bytes());
    put(&mut file, 0x3c, &2u16.to_le_bytes());

    let base = 64 + 64;
    put(&mut file, base + 4, &1u32.to_le_bytes());
    put(&mut file, base + 24, &(zip_offset as u64).to_le_bytes());
    put(&mut file, base + 32, &(zip.len() as u64).to_le_bytes());

    file.extend_from_slice(&zip);
    file.extend(std::iter::repeat(0u8).take(70_000));
    file
}

/// DOS stub, PE signature, COFF header and two sections: a 16-byte
/// `.text` and a `.bss` with no raw data.
pub(crate) fn pe(trailing: &[u8]) -> Vec<u8> {
    let mut file = vec![0u8; 184];

    put(&mut file, 0, b"MZ");
    put(&mut file, 0x3c, &64u32.to_le_bytes());
    put(&mut file, 64, b"PE\0\0");
    put(&mut file, 68, &0x8664u16.to_le_bytes()); // machine
    put(&mut file, 70, &2u16.to_le_bytes()); // number of sections

    let text = 88;
    put(&mut file, text, b".text\0\0\0");
    put(&mut file, text + 16, &16u32.to_le_bytes());
    put(&mut file, text + 20, &168u32.to_le_bytes());

    let bss = text + 40;
    put(&mut file, bss, b".bss\0\0\0\0");
    put(&mut file, bss + 8, &0x1000u32.to_le_bytes()); // virtual size only

    file.extend_from_slice(trailing);
    file
}
