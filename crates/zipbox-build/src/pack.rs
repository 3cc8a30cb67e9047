//! Packing box directories into archive entries.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use walkdir::WalkDir;
use zipbox_common::layout::{entry_name, DIR_COMMENT};
use zipbox_zip::{EntryOptions, ZipWriter};

use crate::{Error, Result};

/// Summary of one packed box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedBox {
    pub name: String,
    pub key: String,
    pub dir: PathBuf,
    pub files: usize,
    pub dirs: usize,
    /// Uncompressed size of all files.
    pub bytes: u64,
}

/// Add the directory `dir` and everything below it under `key`.
///
/// The directory itself becomes the entry named `key`. Entries are added
/// in file-name order and symlinks are followed.
pub fn pack_dir<W: Write>(
    writer: &mut ZipWriter<W>,
    name: &str,
    key: &str,
    dir: &Path,
) -> Result<PackedBox> {
    if !dir.is_dir() {
        return Err(Error::BoxDirNotFound(dir.to_path_buf()));
    }

    let mut packed = PackedBox {
        name: name.to_string(),
        key: key.to_string(),
        dir: dir.to_path_buf(),
        files: 0,
        dirs: 0,
        bytes: 0,
    };

    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        let relative = relative_name(dir, entry.path())?;
        let name = entry_name(key, &relative);

        let metadata = entry.metadata().map_err(std::io::Error::from)?;
        let modified = metadata.modified().unwrap_or(UNIX_EPOCH);
        let mut options = EntryOptions::new(modified);
        if let Some(mode) = unix_mode(&metadata) {
            options = options.unix_mode(mode);
        }

        if metadata.is_dir() {
            writer.add_directory(&name, &options.comment(DIR_COMMENT))?;
            packed.dirs += 1;
        } else {
            let data = fs::read(entry.path())?;
            writer.add_file(&name, &data, &options)?;
            packed.files += 1;
            packed.bytes += data.len() as u64;
        }
    }

    tracing::info!(
        name = %packed.name,
        key = %packed.key,
        dir = %packed.dir.display(),
        files = packed.files,
        dirs = packed.dirs,
        bytes = packed.bytes,
        "packing box"
    );
    Ok(packed)
}

/// `path` relative to `root`, joined with `/`.
fn relative_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} is outside {}", path.display(), root.display()),
        )
    })?;

    let mut segments = Vec::new();
    for component in relative.components() {
        if let Component::Normal(segment) = component {
            let segment = segment
                .to_str()
                .ok_or_else(|| Error::NonUtf8Path(path.to_path_buf()))?;
            segments.push(segment);
        }
    }
    Ok(segments.join("/"))
}

#[cfg(unix)]
fn unix_mode(metadata: &fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode())
}

#[cfg(not(unix))]
fn unix_mode(_metadata: &fs::Metadata) -> Option<u32> {
    None
}
