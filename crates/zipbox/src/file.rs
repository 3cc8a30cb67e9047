//! Open file and directory handles.

use std::io::{self, Cursor, Read, Seek, SeekFrom};

use crate::node::{Metadata, Node};
use crate::registry::BoxData;
use crate::{Error, Result};

/// Handle to an open node.
///
/// A file handle owns a cursor over the node's shared buffer; a directory
/// handle lists the node's children. Handles are not meant to be shared
/// across threads, but any number of handles may be open on the same node.
#[derive(Debug)]
pub struct File<'r> {
    data: &'r BoxData,
    index: usize,
    /// Read position over the node buffer; `None` for directories.
    cursor: Option<Cursor<&'r [u8]>>,
    open: bool,
}

impl<'r> File<'r> {
    pub(crate) fn open(data: &'r BoxData, index: usize) -> Result<Self> {
        let cursor = match data.node(index) {
            Node::File(file) => {
                let buffer = file
                    .data
                    .as_deref()
                    .ok_or_else(|| Error::DataUnavailable(file.name.clone()))?;
                Some(Cursor::new(buffer))
            }
            Node::Directory(_) => None,
        };

        Ok(Self {
            data,
            index,
            cursor,
            open: true,
        })
    }

    fn node(&self) -> &'r Node {
        self.data.node(self.index)
    }

    /// Base name of the node.
    pub fn name(&self) -> &'r str {
        self.node().name()
    }

    pub fn is_dir(&self) -> bool {
        self.node().is_dir()
    }

    /// Read into `buf`, returning the number of bytes read; zero at end.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let cursor = self.cursor_mut()?;
        Ok(Read::read(cursor, buf)?)
    }

    /// Move the read position, returning the new position.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let cursor = self.cursor_mut()?;
        Ok(Seek::seek(cursor, pos)?)
    }

    /// Metadata of every child in archive order.
    pub fn readdir(&self) -> Result<Vec<Metadata>> {
        let children = self.children()?;
        Ok(children
            .iter()
            .map(|&child| self.data.node(child).stat())
            .collect())
    }

    /// Base names of every child in archive order.
    pub fn readdir_names(&self) -> Result<Vec<String>> {
        let children = self.children()?;
        Ok(children
            .iter()
            .map(|&child| self.data.node(child).name().to_string())
            .collect())
    }

    pub fn stat(&self) -> Result<Metadata> {
        self.ensure_open()?;
        Ok(self.node().stat())
    }

    /// Release the cursor. The node's buffer is untouched. Closing twice is
    /// an error.
    pub fn close(&mut self) -> Result<()> {
        if !self.open {
            return Err(Error::AlreadyClosed);
        }
        self.open = false;
        self.cursor = None;
        Ok(())
    }

    // Internal methods

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(Error::Closed)
        }
    }

    fn cursor_mut(&mut self) -> Result<&mut Cursor<&'r [u8]>> {
        self.ensure_open()?;
        let name = self.name();
        self.cursor
            .as_mut()
            .ok_or_else(|| Error::IsDirectory(name.to_string()))
    }

    fn children(&self) -> Result<&'r [usize]> {
        self.ensure_open()?;
        self.node()
            .as_directory()
            .map(|dir| dir.children.as_slice())
            .ok_or_else(|| Error::NotADirectory(self.name().to_string()))
    }
}

impl Read for File<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        File::read(self, buf).map_err(io::Error::from)
    }
}

impl Seek for File<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        File::seek(self, pos).map_err(io::Error::from)
    }
}
