//! Files and directories of an ingested box.

use std::time::SystemTime;

/// Node metadata as returned by `stat` and `readdir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    name: String,
    size: u64,
    modified: SystemTime,
    is_dir: bool,
    mode: u32,
}

impl Metadata {
    /// Base name of the node.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Uncompressed size in bytes; zero for directories.
    pub fn len(&self) -> u64 {
        self.size
    }

    /// Check if the node holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Modification time stored in the archive.
    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    pub fn is_file(&self) -> bool {
        !self.is_dir
    }

    /// Unix mode bits, including the file type bits.
    pub fn mode(&self) -> u32 {
        self.mode
    }
}

/// File node; `data` is `None` when decompression failed at ingest.
#[derive(Debug)]
pub(crate) struct FileNode {
    pub name: String,
    pub size: u64,
    pub modified: SystemTime,
    pub mode: u32,
    pub data: Option<Vec<u8>>,
}

/// Directory node; children are node indices in ingest order.
#[derive(Debug)]
pub(crate) struct DirNode {
    pub name: String,
    pub modified: SystemTime,
    pub mode: u32,
    pub children: Vec<usize>,
}

#[derive(Debug)]
pub(crate) enum Node {
    File(FileNode),
    Directory(DirNode),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::File(file) => &file.name,
            Node::Directory(dir) => &dir.name,
        }
    }

    pub fn stat(&self) -> Metadata {
        match self {
            Node::File(file) => Metadata {
                name: file.name.clone(),
                size: file.size,
                modified: file.modified,
                is_dir: false,
                mode: file.mode,
            },
            Node::Directory(dir) => Metadata {
                name: dir.name.clone(),
                size: 0,
                modified: dir.modified,
                is_dir: true,
                mode: dir.mode,
            },
        }
    }

    pub fn as_file(&self) -> Option<&FileNode> {
        match self {
            Node::File(file) => Some(file),
            Node::Directory(_) => None,
        }
    }

    pub fn as_directory(&self) -> Option<&DirNode> {
        match self {
            Node::Directory(dir) => Some(dir),
            Node::File(_) => None,
        }
    }

    pub fn as_directory_mut(&mut self) -> Option<&mut DirNode> {
        match self {
            Node::Directory(dir) => Some(dir),
            Node::File(_) => None,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Directory(_))
    }
}
