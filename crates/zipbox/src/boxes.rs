//! Box handle.

use std::time::SystemTime;

use zipbox_common::layout::box_key;

use crate::file::File;
use crate::http::HttpZipBox;
use crate::node::Metadata;
use crate::registry::BoxData;
use crate::{Error, Result};

/// A named, read-only view of one box.
///
/// Paths are relative to the box root and use `/` as separator. The root
/// itself is the empty path. A path whose first segment is the box name
/// resolves against the box root when nothing in the box matches it as
/// written, so `string("public/test.txt")` on the `public` box reads the
/// same node as `string("test.txt")`.
#[derive(Debug, Clone)]
pub struct ZipBox<'r> {
    name: String,
    data: &'r BoxData,
}

impl<'r> ZipBox<'r> {
    pub(crate) fn new(name: &str, data: &'r BoxData) -> Self {
        Self {
            name: name.to_string(),
            data,
        }
    }

    /// Name the box was looked up with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Top-level archive segment holding the box.
    pub fn key(&self) -> &str {
        &self.data.key
    }

    /// Modification time of the first archive entry of this box.
    pub fn modified(&self) -> SystemTime {
        self.data.modified
    }

    /// Open a file or directory.
    pub fn open(&self, path: &str) -> Result<File<'r>> {
        let index = self.resolve(path)?;
        File::open(self.data, index)
    }

    /// Contents of a file.
    pub fn bytes(&self, path: &str) -> Result<&'r [u8]> {
        let index = self.resolve(path)?;
        let file = self
            .data
            .node(index)
            .as_file()
            .ok_or_else(|| Error::IsDirectory(path.to_string()))?;
        file.data
            .as_deref()
            .ok_or_else(|| Error::DataUnavailable(path.to_string()))
    }

    /// Contents of a file as UTF-8.
    pub fn string(&self, path: &str) -> Result<&'r str> {
        let bytes = self.bytes(path)?;
        std::str::from_utf8(bytes).map_err(|source| Error::Utf8 {
            path: path.to_string(),
            source,
        })
    }

    /// Metadata of a file or directory.
    pub fn stat(&self, path: &str) -> Result<Metadata> {
        let index = self.resolve(path)?;
        Ok(self.data.node(index).stat())
    }

    /// Every path in the box, in archive order.
    pub fn paths(&self) -> impl Iterator<Item = &'r str> + 'r {
        self.data.paths.iter().map(String::as_str)
    }

    /// Adaptor for static file servers.
    pub fn as_http_filesystem(&self) -> HttpZipBox<'r> {
        HttpZipBox::new(self.clone())
    }

    fn resolve(&self, path: &str) -> Result<usize> {
        let path = normalize(path);
        if let Some(&index) = self.data.index.get(path.as_str()) {
            return Ok(index);
        }

        let prefixes = [box_key(&self.name), self.data.key.clone()];
        let found = prefixes
            .iter()
            .filter_map(|prefix| strip_segment(&path, prefix))
            .find_map(|rest| self.data.index.get(rest).copied());
        found.ok_or(Error::NotFound(path))
    }
}

/// Backslashes become slashes; leading `/` and `./` and trailing `/` go.
fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut rest = path.as_str();
    loop {
        if let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
        } else {
            break;
        }
    }

    let rest = rest.trim_end_matches('/');
    if rest == "." {
        String::new()
    } else {
        rest.to_string()
    }
}

/// `path` without its first segment, if that segment is `segment`.
fn strip_segment<'p>(path: &'p str, segment: &str) -> Option<&'p str> {
    if segment.is_empty() {
        return None;
    }
    let rest = path.strip_prefix(segment)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix('/')
    }
}
