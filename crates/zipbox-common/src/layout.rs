//! Archive layout conventions.
//!
//! The builder and the runtime agree on three things: how a box name maps to
//! the top-level directory of the archive, how entry names are composed, and
//! which entry comment marks a directory.
//!
//! ```text
//! <box-key>                 directory entry, comment "dir"
//! <box-key>/css             directory entry, comment "dir"
//! <box-key>/css/site.css    file entry
//! ```

/// Entry comment marking a directory entry.
pub const DIR_COMMENT: &str = "dir";

const SEPARATORS: &[char] = &['/', '\\'];

/// Convert a box name, as written at the lookup call site, into the
/// top-level archive segment that stores it.
///
/// Leading `./` and trailing separators are dropped, and the remaining
/// separators become dashes so that nested directories map to a single
/// segment.
///
/// ```
/// use zipbox_common::layout::box_key;
///
/// assert_eq!(box_key("public"), "public");
/// assert_eq!(box_key("./static/css/"), "static-css");
/// ```
pub fn box_key(name: &str) -> String {
    let mut name = name;
    while let Some(rest) = name.strip_prefix("./") {
        name = rest;
    }
    name.trim_end_matches(SEPARATORS).replace(SEPARATORS, "-")
}

/// Compose an entry name from a box key and a `/`-separated path relative to
/// the box root. The root itself is named by the bare key.
pub fn entry_name(key: &str, relative: &str) -> String {
    if relative.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", key, relative)
    }
}

/// Split a stored entry name into its box key and relative path.
///
/// Backslashes are accepted as separators and leading separators are
/// ignored.
///
/// ```
/// use zipbox_common::layout::split_entry_name;
///
/// assert_eq!(split_entry_name("public/css/site.css"), ("public".into(), "css/site.css".into()));
/// assert_eq!(split_entry_name("public"), ("public".into(), String::new()));
/// ```
pub fn split_entry_name(name: &str) -> (String, String) {
    let name = name.replace('\\', "/");
    let name = name.trim_start_matches('/');
    match name.split_once('/') {
        Some((key, rest)) => (key.to_string(), rest.to_string()),
        None => (name.to_string(), String::new()),
    }
}

/// Parent of a `/`-separated relative path; the root's children have the
/// empty path as parent.
pub fn parent_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[..pos],
        None => "",
    }
}

/// Last segment of a `/`-separated path.
pub fn base_name(path: &str) -> &str {
    let path = path.trim_end_matches('/');
    match path.rfind('/') {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}
