//! Builder configuration.

use crate::{Error, Result};

/// How the runtime library is brought into scope by scanned code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    /// Identifier that qualifies lookups when the library is not renamed.
    name: String,
    /// `::`-separated path of the library module.
    path: String,
}

impl ImportSpec {
    /// Create an `ImportSpec`. Surrounding whitespace and quotes are trimmed.
    ///
    /// ```
    /// use zipbox_build::ImportSpec;
    ///
    /// let import = ImportSpec::new("assets", "\"my_app::assets\"").unwrap();
    /// assert_eq!(import.segments(), ["my_app", "assets"]);
    /// assert!(ImportSpec::new("zipbox", "").is_err());
    /// ```
    pub fn new(name: &str, path: &str) -> Result<Self> {
        let name = name.trim();
        let path = path.trim().trim_matches('"').trim();

        if name.is_empty() || syn::parse_str::<syn::Ident>(name).is_err() {
            return Err(Error::InvalidImport(format!("name {:?}", name)));
        }
        if path.is_empty() || syn::parse_str::<syn::Path>(path).is_err() {
            return Err(Error::InvalidImport(format!("path {:?}", path)));
        }

        Ok(Self {
            name: name.to_string(),
            path: path.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path segments, without a leading `::`.
    pub fn segments(&self) -> Vec<&str> {
        self.path
            .trim_start_matches("::")
            .split("::")
            .map(str::trim)
            .collect()
    }
}

impl Default for ImportSpec {
    fn default() -> Self {
        Self {
            name: "zipbox".to_string(),
            path: "zipbox".to_string(),
        }
    }
}

/// Everything that decides which boxes a build picks up.
#[derive(Debug, Clone, Default)]
pub struct BuildConfig {
    pub import: ImportSpec,
    /// Build tags gating `#[cfg(..)]` items.
    pub tags: Vec<String>,
}

impl BuildConfig {
    /// Create a config. Each tag may hold several comma-separated tags.
    pub fn new<I, S>(import: ImportSpec, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags = tags
            .into_iter()
            .flat_map(|tag| {
                tag.as_ref()
                    .split(',')
                    .map(|t| t.trim().to_string())
                    .collect::<Vec<_>>()
            })
            .filter(|t| !t.is_empty())
            .collect();

        Self { import, tags }
    }
}
