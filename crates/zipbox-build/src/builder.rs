//! Scan, pack and append.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use zipbox_common::layout::box_key;
use zipbox_zip::ZipWriter;

use crate::config::BuildConfig;
use crate::pack::{pack_dir, PackedBox};
use crate::package::{Package, PackageScan};
use crate::scan::Scanner;
use crate::Result;

/// A built archive and what went into it.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// Archive bytes, with offsets relative to the base offset it was built
    /// for.
    pub archive: Vec<u8>,
    pub packages: Vec<PackageScan>,
    pub boxes: Vec<PackedBox>,
}

impl BuildOutput {
    pub fn files(&self) -> usize {
        self.boxes.iter().map(|b| b.files).sum()
    }

    pub fn bytes(&self) -> u64 {
        self.boxes.iter().map(|b| b.bytes).sum()
    }
}

/// Builds the asset archive for a set of packages.
///
/// ```no_run
/// use zipbox_build::{BuildConfig, Builder};
///
/// let mut builder = Builder::new(BuildConfig::default());
/// builder.add_search_path(".");
/// let output = builder.append_to("target/release/app")?;
/// println!("{} boxes", output.boxes.len());
/// # Ok::<(), zipbox_build::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Builder {
    config: BuildConfig,
    scanner: Scanner,
    search_paths: Vec<PathBuf>,
}

impl Builder {
    pub fn new(config: BuildConfig) -> Self {
        let scanner = Scanner::new(&config);
        Self {
            config,
            scanner,
            search_paths: Vec::new(),
        }
    }

    /// Add a package directory. Without any, the current directory is used.
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.search_paths.push(path.into());
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Scan every search path for box lookups.
    pub fn scan(&self) -> Result<Vec<PackageScan>> {
        let default = [PathBuf::from(".")];
        let paths = if self.search_paths.is_empty() {
            &default[..]
        } else {
            &self.search_paths[..]
        };

        paths
            .iter()
            .map(|path| Package::open(path)?.scan(&self.scanner))
            .collect()
    }

    /// Scan and pack everything into an archive meant to start at
    /// `base_offset` of the file it is appended to.
    pub fn build_archive(&self, base_offset: u64) -> Result<BuildOutput> {
        let packages = self.scan()?;
        let mut writer = ZipWriter::with_base_offset(Vec::new(), base_offset);
        let mut keys = HashSet::new();
        let mut boxes = Vec::new();

        for package in &packages {
            for found in &package.boxes {
                let key = box_key(&found.name);
                if !keys.insert(key.clone()) {
                    tracing::warn!(
                        name = %found.name,
                        key = %key,
                        file = %found.file.display(),
                        "box already packed by another package"
                    );
                    continue;
                }

                let dir = package.root.join(&found.name);
                boxes.push(pack_dir(&mut writer, &found.name, &key, &dir)?);
            }
        }

        Ok(BuildOutput {
            archive: writer.finish()?,
            packages,
            boxes,
        })
    }

    /// Build the archive and append it to `target`.
    ///
    /// Nothing is written unless the whole archive was built. When no box
    /// is referenced the target is left untouched.
    pub fn append_to(&self, target: impl AsRef<Path>) -> Result<BuildOutput> {
        let target = target.as_ref();
        let mut file = OpenOptions::new().read(true).write(true).open(target)?;
        let base_offset = file.metadata()?.len();

        let output = self.build_archive(base_offset)?;
        if output.boxes.is_empty() {
            tracing::warn!(target = %target.display(), "no boxes found, binary left unchanged");
            return Ok(output);
        }

        file.seek(SeekFrom::End(0))?;
        file.write_all(&output.archive)?;
        file.flush()?;
        file.sync_all()?;

        tracing::debug!(
            target = %target.display(),
            base_offset,
            size = output.archive.len(),
            "archive appended"
        );
        Ok(output)
    }
}
