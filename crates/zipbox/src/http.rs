//! Adaptor between a box and a static file server.
//!
//! A server only needs to open a path, stat it, list it when it is a
//! directory and stream it otherwise. The traits here are that contract;
//! [`HttpZipBox`] implements it on top of a [`ZipBox`].

use std::io::{Read, Seek};

use crate::boxes::ZipBox;
use crate::file::File;
use crate::node::Metadata;
use crate::registry::is_absolute;
use crate::{Error, Result};

/// File handle as consumed by a static file server.
pub trait HttpFile: Read + Seek {
    fn stat(&self) -> Result<Metadata>;
    fn readdir(&self) -> Result<Vec<Metadata>>;
    fn close(&mut self) -> Result<()>;
}

/// Filesystem as consumed by a static file server.
pub trait HttpFileSystem {
    type File: HttpFile;

    /// Open a path relative to the filesystem root.
    fn open(&self, path: &str) -> Result<Self::File>;
}

/// A box exposed as an [`HttpFileSystem`].
///
/// Absolute paths are rejected before any lookup, so servers must strip
/// the leading `/` of a request path first.
#[derive(Debug, Clone)]
pub struct HttpZipBox<'r> {
    inner: ZipBox<'r>,
}

impl<'r> HttpZipBox<'r> {
    pub(crate) fn new(inner: ZipBox<'r>) -> Self {
        Self { inner }
    }

    /// The box being served.
    pub fn inner(&self) -> &ZipBox<'r> {
        &self.inner
    }
}

impl<'r> HttpFileSystem for HttpZipBox<'r> {
    type File = File<'r>;

    fn open(&self, path: &str) -> Result<File<'r>> {
        if is_absolute(path) {
            return Err(Error::AbsolutePathRejected(path.to_string()));
        }
        self.inner.open(path)
    }
}

impl HttpFile for File<'_> {
    fn stat(&self) -> Result<Metadata> {
        File::stat(self)
    }

    fn readdir(&self) -> Result<Vec<Metadata>> {
        File::readdir(self)
    }

    fn close(&mut self) -> Result<()> {
        File::close(self)
    }
}
