//! Build-time half of zipbox.
//!
//! The builder reads a program's Rust sources, finds every box the program
//! looks up with a string literal, packs the matching directories into a
//! ZIP archive and appends that archive to the compiled binary:
//!
//! ```text
//! src/main.rs                     app/public/...
//!   zipbox::get("public")   -->   app/static/css/...
//!   zipbox::get("static/css")          |
//!                                      v
//! target/release/app  +  [ public/..., static-css/..., central directory ]
//! ```
//!
//! Box names must be literals; a lookup with any other argument aborts the
//! build with the file and line of the call.
//!
//! # Example
//!
//! ```no_run
//! use zipbox_build::{BuildConfig, Builder, ImportSpec};
//!
//! let config = BuildConfig::new(ImportSpec::default(), ["web"]);
//! let mut builder = Builder::new(config);
//! builder.add_search_path("crates/app");
//!
//! let output = builder.append_to("target/release/app")?;
//! for packed in &output.boxes {
//!     println!("{} -> {} ({} files)", packed.name, packed.key, packed.files);
//! }
//! # Ok::<(), zipbox_build::Error>(())
//! ```

mod builder;
pub mod cfg;
mod config;
mod error;
mod pack;
mod package;
pub mod scan;

pub use builder::{BuildOutput, Builder};
pub use config::{BuildConfig, ImportSpec};
pub use error::{Error, Result};
pub use pack::{pack_dir, PackedBox};
pub use package::{BoxRef, Package, PackageScan};
pub use scan::{Lookup, Scanner};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
