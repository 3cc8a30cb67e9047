//! Box registry and archive ingest.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use zipbox_common::layout::{base_name, box_key, parent_path, split_entry_name, DIR_COMMENT};
use zipbox_zip::{ZipArchive, ZipEntry};

use crate::boxes::ZipBox;
use crate::node::{DirNode, FileNode, Node};
use crate::{Error, Result};

const DEFAULT_DIR_MODE: u32 = 0o040755;
const DEFAULT_FILE_MODE: u32 = 0o100644;

/// Nodes of one box, addressed by path relative to the box root.
#[derive(Debug)]
pub(crate) struct BoxData {
    pub key: String,
    pub modified: SystemTime,
    pub nodes: Vec<Node>,
    /// Relative path of each node, parallel to `nodes`.
    pub paths: Vec<String>,
    pub index: HashMap<String, usize>,
}

impl BoxData {
    fn new(key: String, modified: SystemTime) -> Self {
        Self {
            key,
            modified,
            nodes: Vec::new(),
            paths: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Insert a node; a later entry with the same path replaces the earlier
    /// node in place.
    fn insert(&mut self, path: String, node: Node) {
        match self.index.get(&path) {
            Some(&existing) => self.nodes[existing] = node,
            None => {
                self.index.insert(path.clone(), self.nodes.len());
                self.paths.push(path);
                self.nodes.push(node);
            }
        }
    }

    /// Attach every node to the directory node at its parent path. Runs after
    /// all entries are in, so archive order does not matter; a node whose
    /// parent has no directory entry stays unattached.
    fn link(&mut self) {
        for child in 0..self.nodes.len() {
            let path = &self.paths[child];
            if path.is_empty() {
                continue;
            }

            let Some(&parent) = self.index.get(parent_path(path)) else {
                continue;
            };
            if let Some(dir) = self.nodes[parent].as_directory_mut() {
                dir.children.push(child);
            }
        }
    }

    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }
}

/// Immutable map from box key to box contents.
///
/// # Example
///
/// ```no_run
/// use zipbox::Registry;
///
/// let registry = Registry::open("target/release/server")?;
/// let public = registry.get("public")?;
/// let index = public.string("index.html")?;
/// # Ok::<(), zipbox::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    boxes: HashMap<String, BoxData>,
}

impl Registry {
    /// A registry with no boxes.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sniff a file for an embedded archive and ingest it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mapped = zipbox_exe::sniff_file(path)?;
        let archive = mapped.archive()?;
        Ok(Self::from_archive(&archive))
    }

    /// Like [`Registry::open`], but any failure yields an empty registry.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::open(path) {
            Ok(registry) => registry,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "no boxes loaded");
                Self::empty()
            }
        }
    }

    /// Best-effort load of the running executable.
    pub fn current_exe() -> Self {
        match executable_path() {
            Ok(path) => Self::load(path),
            Err(e) => {
                tracing::debug!(error = %e, "unable to resolve current executable");
                Self::empty()
            }
        }
    }

    /// Build the box table from every entry of an archive.
    ///
    /// File contents are decompressed here. An entry that fails to
    /// decompress is kept as a file without data, so opening it reports
    /// [`Error::DataUnavailable`].
    pub fn from_archive(archive: &ZipArchive) -> Self {
        let mut boxes: HashMap<String, BoxData> = HashMap::new();

        for entry in archive.iter() {
            let (key, path) = split_entry_name(entry.name());
            if key.is_empty() {
                tracing::debug!(name = entry.name(), "skipping entry outside any box");
                continue;
            }
            let path = path.trim_end_matches('/').to_string();
            let modified = entry.last_modified().unwrap_or(UNIX_EPOCH);

            let name = if path.is_empty() {
                key.clone()
            } else {
                base_name(&path).to_string()
            };
            let node = if entry.comment() == DIR_COMMENT {
                Node::Directory(DirNode {
                    name,
                    modified,
                    mode: entry.unix_mode().unwrap_or(DEFAULT_DIR_MODE),
                    children: Vec::new(),
                })
            } else {
                Node::File(FileNode {
                    name,
                    size: entry.uncompressed_size(),
                    modified,
                    mode: entry.unix_mode().unwrap_or(DEFAULT_FILE_MODE),
                    data: read_entry(archive, entry),
                })
            };

            boxes
                .entry(key.clone())
                .or_insert_with(|| BoxData::new(key, modified))
                .insert(path, node);
        }

        for data in boxes.values_mut() {
            data.link();
        }

        tracing::debug!(
            boxes = boxes.len(),
            entries = archive.len(),
            "ingested embedded archive"
        );

        Self { boxes }
    }

    /// Look up a box by the name used when it was packed.
    pub fn get(&self, name: &str) -> Result<ZipBox<'_>> {
        if is_absolute(name) {
            return Err(Error::AbsolutePathRejected(name.to_string()));
        }

        self.boxes
            .get(&box_key(name))
            .map(|data| ZipBox::new(name, data))
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    /// Box keys in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.boxes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}

fn read_entry(archive: &ZipArchive, entry: &ZipEntry) -> Option<Vec<u8>> {
    if entry.uncompressed_size() == 0 {
        return Some(Vec::new());
    }
    match archive.read(entry) {
        Ok(data) => Some(data),
        Err(e) => {
            tracing::warn!(name = entry.name(), error = %e, "unable to read embedded file");
            None
        }
    }
}

/// Absolute, symlink-resolved path of the running executable.
fn executable_path() -> std::io::Result<PathBuf> {
    std::env::current_exe()?.canonicalize()
}

pub(crate) fn is_absolute(path: &str) -> bool {
    path.starts_with('/') || path.starts_with('\\') || Path::new(path).is_absolute()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use zipbox_zip::{EntryOptions, ZipWriter};

    use super::*;

    fn options(secs: u64) -> EntryOptions {
        EntryOptions::new(UNIX_EPOCH + Duration::from_secs(secs))
    }

    fn dir(secs: u64) -> EntryOptions {
        options(secs).comment(DIR_COMMENT)
    }

    #[test]
    fn test_ingest_links_children_regardless_of_order() {
        let mut writer = ZipWriter::new(Vec::new());
        writer.add_file("public/css/site.css", b"body{}", &options(1_600_000_010)).unwrap();
        writer.add_file("public/index.html", b"<html>", &options(1_600_000_010)).unwrap();
        writer.add_directory("public/css", &dir(1_600_000_010)).unwrap();
        writer.add_directory("public", &dir(1_600_000_020)).unwrap();
        let bytes = writer.finish().unwrap();

        let registry = Registry::from_archive(&ZipArchive::new(&bytes).unwrap());
        let data = &registry.boxes["public"];

        let root = data.node(data.index[""]).as_directory().unwrap();
        let names: Vec<&str> = root.children.iter().map(|&i| data.node(i).name()).collect();
        assert_eq!(names, ["index.html", "css"]);

        let css = data.node(data.index["css"]).as_directory().unwrap();
        assert_eq!(css.children.len(), 1);

        // First entry seen sets the box time.
        assert_eq!(data.modified, UNIX_EPOCH + Duration::from_secs(1_600_000_010));
    }

    #[test]
    fn test_parents_are_not_inferred() {
        let mut writer = ZipWriter::new(Vec::new());
        writer.add_directory("assets", &dir(1_600_000_000)).unwrap();
        writer.add_file("assets/img/logo.png", b"png", &options(1_600_000_000)).unwrap();
        let bytes = writer.finish().unwrap();

        let registry = Registry::from_archive(&ZipArchive::new(&bytes).unwrap());
        let data = &registry.boxes["assets"];

        assert!(!data.index.contains_key("img"));
        assert!(data.node(data.index[""]).as_directory().unwrap().children.is_empty());
        assert!(data.index.contains_key("img/logo.png"));
    }

    #[test]
    fn test_boxes_split_on_first_segment() {
        let mut writer = ZipWriter::new(Vec::new());
        writer.add_directory("public", &dir(1_600_000_000)).unwrap();
        writer.add_directory("static-css", &dir(1_600_000_000)).unwrap();
        writer.add_file("static-css/a.css", b"a{}", &options(1_600_000_000)).unwrap();
        let bytes = writer.finish().unwrap();

        let registry = Registry::from_archive(&ZipArchive::new(&bytes).unwrap());
        assert_eq!(registry.names(), ["public", "static-css"]);
        assert!(registry.get("static/css").is_ok());
        assert!(registry.get("./static/css/").is_ok());
        assert!(matches!(registry.get("private"), Err(Error::NotFound(_))));
        assert!(matches!(
            registry.get("/public"),
            Err(Error::AbsolutePathRejected(_))
        ));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let registry = Registry::load("/nonexistent/zipbox/binary");
        assert!(registry.is_empty());
        assert!(matches!(registry.get("public"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_open_reports_unrecognized_container() {
        let mut temp = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut temp, &[0u8; 512]).unwrap();

        assert!(matches!(
            Registry::open(temp.path()),
            Err(Error::UnrecognizedContainer)
        ));
    }
}
