//! Read-only asset boxes embedded in the running executable.
//!
//! The `zipbox` build tool appends a ZIP archive to a compiled binary. At
//! run time [`init`] finds that archive, whatever executable format wraps
//! it, decompresses every entry once and exposes each top-level directory
//! of the archive as a named [`ZipBox`].
//!
//! ```text
//! binary
//! +--------------------------+
//! | Mach-O / ELF / PE image  |
//! +--------------------------+
//! | public/                  |  box "public"
//! | public/index.html        |
//! | static-css/              |  box "static/css"
//! | static-css/site.css      |
//! | central directory, EOCD  |
//! +--------------------------+
//! ```
//!
//! Initialization is best-effort: when no archive can be found, the
//! registry is simply empty and every lookup fails with
//! [`Error::NotFound`].
//!
//! # Example
//!
//! ```no_run
//! let public = zipbox::get("public")?;
//! let page = public.string("index.html")?;
//!
//! let mut dir = public.open("css")?;
//! for entry in dir.readdir()? {
//!     println!("{} {}", entry.name(), entry.len());
//! }
//! dir.close()?;
//! # Ok::<(), zipbox::Error>(())
//! ```

use std::sync::OnceLock;

mod boxes;
mod error;
mod file;
mod http;
mod node;
mod registry;

pub use boxes::ZipBox;
pub use error::{Error, Result};
pub use file::File;
pub use http::{HttpFile, HttpFileSystem, HttpZipBox};
pub use node::Metadata;
pub use registry::Registry;

// Re-export the lower layers
pub use zipbox_exe as exe;
pub use zipbox_zip as zip;

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Load the boxes embedded in the running executable.
///
/// The first call sniffs and ingests the executable; every later call
/// returns the same registry.
pub fn init() -> &'static Registry {
    REGISTRY.get_or_init(Registry::current_exe)
}

/// Look up a box in the registry of the running executable.
pub fn get(name: &str) -> Result<ZipBox<'static>> {
    init().get(name)
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
