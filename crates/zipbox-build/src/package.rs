//! Package discovery.
//!
//! A search path holding a `Cargo.toml` is scanned the way the compiler
//! sees it: starting from the crate roots and following every enabled
//! `mod name;` declaration. Any other directory contributes every `.rs`
//! file below it.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use walkdir::{DirEntry, WalkDir};

use crate::scan::{Lookup, ModuleDecl, Scanner};
use crate::{Error, Result};

/// A box name as first seen in a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxRef {
    pub name: String,
    pub file: PathBuf,
    pub line: usize,
}

/// Result of scanning one package.
#[derive(Debug, Clone)]
pub struct PackageScan {
    pub root: PathBuf,
    /// Number of source files scanned.
    pub files: usize,
    /// Distinct box names in first-seen order.
    pub boxes: Vec<BoxRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Cargo,
    Plain,
}

/// A directory of Rust sources.
#[derive(Debug, Clone)]
pub struct Package {
    root: PathBuf,
    layout: Layout,
}

/// A file queued for scanning.
#[derive(Debug, Clone)]
struct Source {
    path: PathBuf,
    /// Crate roots and `mod.rs` files own the directory they live in.
    mod_root: bool,
}

impl Package {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(Error::SearchPathNotFound(root.to_path_buf()));
        }

        let layout = if root.join("Cargo.toml").is_file() {
            Layout::Cargo
        } else {
            Layout::Plain
        };

        Ok(Self {
            root: root.to_path_buf(),
            layout,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_cargo(&self) -> bool {
        self.layout == Layout::Cargo
    }

    /// Scan every reachable source file for box lookups.
    pub fn scan(&self, scanner: &Scanner) -> Result<PackageScan> {
        let mut visited = HashSet::new();
        let mut frontier: Vec<Source> = self
            .entry_points(scanner)?
            .into_iter()
            .filter(|source| visited.insert(canonical(&source.path)))
            .collect();

        let mut files = 0;
        let mut lookups: Vec<(PathBuf, Lookup)> = Vec::new();

        while !frontier.is_empty() {
            let results: Vec<_> = frontier
                .par_iter()
                .map(|source| scanner.scan_file(&source.path))
                .collect();

            let mut next = Vec::new();
            for (source, result) in frontier.iter().zip(results) {
                let scan = result?;
                files += 1;
                lookups.extend(
                    scan.lookups
                        .into_iter()
                        .map(|lookup| (source.path.clone(), lookup)),
                );

                if self.layout == Layout::Plain {
                    continue;
                }
                for decl in &scan.modules {
                    match resolve_module(source, decl) {
                        Some(path) => {
                            if visited.insert(canonical(&path)) {
                                let mod_root = path.file_name().is_some_and(|n| n == "mod.rs");
                                next.push(Source { path, mod_root });
                            }
                        }
                        None => tracing::warn!(
                            file = %source.path.display(),
                            module = %decl.name,
                            "module file not found"
                        ),
                    }
                }
            }
            frontier = next;
        }

        let mut seen = HashSet::new();
        let boxes: Vec<BoxRef> = lookups
            .into_iter()
            .filter(|(_, lookup)| seen.insert(lookup.name.clone()))
            .map(|(file, lookup)| BoxRef {
                name: lookup.name,
                file,
                line: lookup.line,
            })
            .collect();

        if boxes.is_empty() {
            tracing::warn!(package = %self.root.display(), "no lookups found in package");
        }

        Ok(PackageScan {
            root: self.root.clone(),
            files,
            boxes,
        })
    }

    // Internal methods

    fn entry_points(&self, scanner: &Scanner) -> Result<Vec<Source>> {
        match self.layout {
            Layout::Plain => Ok(rust_files(&self.root)?
                .into_iter()
                .map(|path| Source {
                    path,
                    mod_root: true,
                })
                .collect()),
            Layout::Cargo => {
                let src = self.root.join("src");
                let mut roots = vec![src.join("lib.rs"), src.join("main.rs")];

                let bin = src.join("bin");
                if bin.is_dir() {
                    for entry in sorted_dir(&bin)? {
                        if entry.is_dir() {
                            roots.push(entry.join("main.rs"));
                        } else if is_rust_file(&entry) {
                            roots.push(entry);
                        }
                    }
                }

                let tests = self.root.join("tests");
                if scanner.tags().contains("test") && tests.is_dir() {
                    roots.extend(
                        sorted_dir(&tests)?
                            .into_iter()
                            .filter(|path| is_rust_file(path)),
                    );
                }

                Ok(roots
                    .into_iter()
                    .filter(|path| path.is_file())
                    .map(|path| Source {
                        path,
                        mod_root: true,
                    })
                    .collect())
            }
        }
    }
}

/// Find the file a `mod` declaration loads.
fn resolve_module(source: &Source, decl: &ModuleDecl) -> Option<PathBuf> {
    let parent = source.path.parent()?;

    if let (Some(path), true) = (&decl.path, decl.inline.is_empty()) {
        return Some(parent.join(path)).filter(|p| p.is_file());
    }

    let mut dir = parent.to_path_buf();
    if !source.mod_root {
        dir.push(source.path.file_stem()?);
    }
    dir.extend(&decl.inline);

    let candidates = match &decl.path {
        Some(path) => vec![dir.join(path)],
        None => vec![
            dir.join(format!("{}.rs", decl.name)),
            dir.join(&decl.name).join("mod.rs"),
        ],
    };
    candidates.into_iter().find(|p| p.is_file())
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn is_rust_file(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == "rs")
}

fn sorted_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();
    Ok(paths)
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.') || name == "target")
}

/// Every `.rs` file below `root`, skipping `target` and hidden directories.
fn rust_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_skipped(entry))
    {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() && is_rust_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
