//! `#[cfg(..)]` evaluation against build tags.
//!
//! Predicates the tags say nothing about are unknown, and an item is only
//! skipped when its predicate is known to be false:
//!
//! | predicate           | value                                        |
//! |---------------------|----------------------------------------------|
//! | `test`              | true iff `test` is a tag                     |
//! | `ident`             | true if `ident` is a tag, unknown otherwise  |
//! | `feature = "x"`     | true if there are no tags or `x` is a tag    |
//! | `key = "v"`         | true if `v` is a tag, unknown otherwise      |
//! | `not`, `any`, `all` | three-valued logic                           |

use std::collections::HashSet;

use syn::punctuated::Punctuated;
use syn::{Attribute, Expr, ExprLit, Lit, Meta, Token};

/// Build tags, as used to decide which items are compiled.
#[derive(Debug, Clone, Default)]
pub struct Tags {
    tags: HashSet<String>,
}

impl Tags {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Check that no `cfg` attribute in `attrs` is known to be false.
    pub fn enabled(&self, attrs: &[Attribute]) -> bool {
        attrs
            .iter()
            .filter(|attr| attr.path().is_ident("cfg"))
            .all(|attr| match attr.parse_args::<Meta>() {
                Ok(meta) => self.eval(&meta) != Some(false),
                Err(_) => true,
            })
    }

    /// Evaluate a predicate; `None` means unknown.
    pub fn eval(&self, meta: &Meta) -> Option<bool> {
        match meta {
            Meta::Path(path) => {
                let ident = path.get_ident()?.to_string();
                if ident == "test" {
                    Some(self.contains("test"))
                } else if self.contains(&ident) {
                    Some(true)
                } else {
                    None
                }
            }
            Meta::NameValue(pair) => {
                let value = match &pair.value {
                    Expr::Lit(ExprLit {
                        lit: Lit::Str(s), ..
                    }) => s.value(),
                    _ => return None,
                };
                if pair.path.is_ident("feature") {
                    Some(self.tags.is_empty() || self.contains(&value))
                } else if self.contains(&value) {
                    Some(true)
                } else {
                    None
                }
            }
            Meta::List(list) => {
                let args = list
                    .parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated)
                    .ok()?;
                let values = args.iter().map(|arg| self.eval(arg));

                if list.path.is_ident("not") {
                    if args.len() != 1 {
                        return None;
                    }
                    self.eval(&args[0]).map(|v| !v)
                } else if list.path.is_ident("any") {
                    any(values)
                } else if list.path.is_ident("all") {
                    all(values)
                } else {
                    None
                }
            }
        }
    }
}

fn any(values: impl Iterator<Item = Option<bool>>) -> Option<bool> {
    let mut result = Some(false);
    for value in values {
        match value {
            Some(true) => return Some(true),
            None => result = None,
            Some(false) => {}
        }
    }
    result
}

fn all(values: impl Iterator<Item = Option<bool>>) -> Option<bool> {
    let mut result = Some(true);
    for value in values {
        match value {
            Some(false) => return Some(false),
            None => result = None,
            Some(true) => {}
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(tags: &[&str], predicate: &str) -> Option<bool> {
        let meta: Meta = syn::parse_str(predicate).unwrap();
        Tags::new(tags.iter().copied()).eval(&meta)
    }

    #[test]
    fn test_test_predicate_needs_tag() {
        assert_eq!(eval(&[], "test"), Some(false));
        assert_eq!(eval(&["test"], "test"), Some(true));
        assert_eq!(eval(&[], "not(test)"), Some(true));
    }

    #[test]
    fn test_features() {
        assert_eq!(eval(&[], r#"feature = "web""#), Some(true));
        assert_eq!(eval(&["web"], r#"feature = "web""#), Some(true));
        assert_eq!(eval(&["cli"], r#"feature = "web""#), Some(false));
    }

    #[test]
    fn test_unknown_predicates() {
        assert_eq!(eval(&[], "unix"), None);
        assert_eq!(eval(&["unix"], "unix"), Some(true));
        assert_eq!(eval(&[], r#"target_os = "linux""#), None);
        assert_eq!(eval(&[], "not(windows)"), None);
    }

    #[test]
    fn test_three_valued_combinators() {
        assert_eq!(eval(&[], "any(test, unix)"), None);
        assert_eq!(eval(&["test"], "any(test, unix)"), Some(true));
        assert_eq!(eval(&[], "all(test, unix)"), Some(false));
        assert_eq!(eval(&["test"], "all(test, unix)"), None);
        assert_eq!(eval(&[], "any()"), Some(false));
        assert_eq!(eval(&[], "all()"), Some(true));
    }

    #[test]
    fn test_enabled_attributes() {
        let item: syn::ItemFn = syn::parse_str("#[inline] #[cfg(test)] fn f() {}").unwrap();
        assert!(!Tags::default().enabled(&item.attrs));
        assert!(Tags::new(["test"]).enabled(&item.attrs));
    }
}
