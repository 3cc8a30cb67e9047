//! Source scanning.
//!
//! A file is scanned in two passes over its syntax tree. The first pass
//! collects how the runtime library is brought into scope: qualifiers that
//! prefix lookups (`zipbox::get`, `zb::get`) and bare function names
//! (`get`, `fetch`). The second pass records every lookup call site and
//! every out-of-line `mod` declaration.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::visit::{self, Visit};
use syn::{
    Attribute, Block, Expr, ExprCall, ExprClosure, ExprForLoop, ExprMethodCall, ImplItem,
    ImplItemFn, Item, ItemExternCrate, ItemFn, ItemMod, ItemUse, Lit, Local, Macro, Meta, Pat,
    PatIdent, StmtMacro, Token, TraitItem, TraitItemFn, UseTree,
};

use crate::cfg::Tags;
use crate::config::BuildConfig;
use crate::{Error, Result};

/// Function looked up on the runtime library.
const LOOKUP_FN: &str = "get";

/// Methods that unwrap a handle without changing what it refers to.
const PASSTHROUGH_METHODS: &[&str] = &["unwrap", "expect", "clone", "as_ref"];

/// A box lookup call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub name: String,
    pub line: usize,
}

/// Out-of-line `mod name;` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDecl {
    /// Directory segments of the enclosing inline modules.
    pub inline: Vec<String>,
    pub name: String,
    /// Value of a `#[path = ".."]` attribute.
    pub path: Option<String>,
}

/// Everything found in one source file.
#[derive(Debug, Clone, Default)]
pub struct SourceScan {
    pub lookups: Vec<Lookup>,
    pub modules: Vec<ModuleDecl>,
}

/// Scanner for a given import and set of build tags.
#[derive(Debug, Clone)]
pub struct Scanner {
    name: String,
    segments: Vec<String>,
    tags: Tags,
}

impl Scanner {
    pub fn new(config: &BuildConfig) -> Self {
        Self {
            name: config.import.name().to_string(),
            segments: config
                .import
                .segments()
                .into_iter()
                .map(str::to_string)
                .collect(),
            tags: Tags::new(config.tags.iter().cloned()),
        }
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Read and scan a source file.
    pub fn scan_file(&self, path: &Path) -> Result<SourceScan> {
        tracing::info!(file = %path.display(), "scanning file");
        let source = fs::read_to_string(path)?;
        self.scan_source(path, &source)
    }

    /// Scan source text; `path` is only used for reporting.
    pub fn scan_source(&self, path: &Path, source: &str) -> Result<SourceScan> {
        let file = syn::parse_file(source).map_err(|err| Error::Parse {
            file: path.to_path_buf(),
            line: err.span().start().line,
            message: err.to_string(),
        })?;

        if !self.tags.enabled(&file.attrs) {
            return Ok(SourceScan::default());
        }

        let mut imports = ImportVisitor {
            scanner: self,
            qualifiers: HashSet::from([self.name.clone()]),
            functions: HashSet::new(),
        };
        imports.visit_file(&file);

        let mut calls = CallVisitor {
            scanner: self,
            file: path.to_path_buf(),
            qualifiers: imports.qualifiers,
            functions: imports.functions,
            scopes: vec![HashMap::new()],
            inline: Vec::new(),
            scan: SourceScan::default(),
            error: None,
        };
        calls.visit_file(&file);

        match calls.error {
            Some(err) => Err(err),
            None => Ok(calls.scan),
        }
    }

    // Internal methods

    fn is_import_path(&self, path: &[String]) -> bool {
        path == self.segments.as_slice()
    }

    fn is_lookup_fn_path(&self, path: &[String]) -> bool {
        match path.split_last() {
            Some((last, prefix)) => last == LOOKUP_FN && self.is_import_path(prefix),
            None => false,
        }
    }
}

/// First pass: how the library is named in this file.
struct ImportVisitor<'s> {
    scanner: &'s Scanner,
    qualifiers: HashSet<String>,
    functions: HashSet<String>,
}

impl ImportVisitor<'_> {
    fn collect(&mut self, tree: &UseTree, prefix: &mut Vec<String>) {
        match tree {
            UseTree::Path(path) => {
                prefix.push(path.ident.to_string());
                self.collect(&path.tree, prefix);
                prefix.pop();
            }
            UseTree::Name(name) => {
                let ident = name.ident.to_string();
                self.bind(prefix, &ident, &ident);
            }
            UseTree::Rename(rename) => {
                self.bind(prefix, &rename.ident.to_string(), &rename.rename.to_string());
            }
            UseTree::Glob(_) => {
                if self.scanner.is_import_path(prefix) {
                    self.functions.insert(LOOKUP_FN.to_string());
                }
            }
            UseTree::Group(group) => {
                for item in &group.items {
                    self.collect(item, prefix);
                }
            }
        }
    }

    fn bind(&mut self, prefix: &[String], ident: &str, local: &str) {
        if local == "_" {
            return;
        }

        let mut full = prefix.to_vec();
        let local = if ident == "self" {
            match (local, prefix.last()) {
                ("self", Some(last)) => last.clone(),
                ("self", None) => return,
                (renamed, _) => renamed.to_string(),
            }
        } else {
            full.push(ident.to_string());
            local.to_string()
        };

        if self.scanner.is_import_path(&full) {
            self.qualifiers.insert(local);
        } else if self.scanner.is_lookup_fn_path(&full) {
            self.functions.insert(local);
        }
    }
}

impl<'ast> Visit<'ast> for ImportVisitor<'_> {
    fn visit_item(&mut self, node: &'ast Item) {
        if self.scanner.tags.enabled(item_attrs(node)) {
            visit::visit_item(self, node);
        }
    }

    fn visit_item_use(&mut self, node: &'ast ItemUse) {
        self.collect(&node.tree, &mut Vec::new());
    }

    fn visit_item_extern_crate(&mut self, node: &'ast ItemExternCrate) {
        let ident = node.ident.to_string();
        let local = match &node.rename {
            Some((_, rename)) => rename.to_string(),
            None => ident.clone(),
        };
        if local != "_" && self.scanner.is_import_path(&[ident]) {
            self.qualifiers.insert(local);
        }
    }
}

/// Second pass: lookup call sites and module declarations.
struct CallVisitor<'s> {
    scanner: &'s Scanner,
    file: PathBuf,
    qualifiers: HashSet<String>,
    functions: HashSet<String>,
    /// Let-bound names per block, innermost last. `true` marks a value
    /// obtained from the library.
    scopes: Vec<HashMap<String, bool>>,
    inline: Vec<String>,
    scan: SourceScan,
    error: Option<Error>,
}

impl CallVisitor<'_> {
    fn record(&mut self, args: &Punctuated<Expr, Token![,]>, call_line: usize) {
        if self.error.is_some() {
            return;
        }

        match args.first() {
            Some(Expr::Lit(lit)) => match &lit.lit {
                Lit::Str(name) => {
                    let line = lit.span().start().line;
                    let name = name.value();
                    if !is_inside_package(&name) {
                        self.error = Some(Error::InvalidBoxName {
                            file: self.file.clone(),
                            line,
                            name,
                        });
                        return;
                    }
                    tracing::info!(file = %self.file.display(), line, name = %name, "box found");
                    self.scan.lookups.push(Lookup { name, line });
                }
                other => self.literal_required(other.span().start().line),
            },
            Some(arg) => self.literal_required(arg.span().start().line),
            None => self.literal_required(call_line),
        }
    }

    fn literal_required(&mut self, line: usize) {
        self.error = Some(Error::ScanLiteralRequired {
            file: self.file.clone(),
            line,
        });
    }

    fn is_handle(&self, name: &str) -> bool {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .copied()
            .unwrap_or(false)
    }

    fn bind(&mut self, pat: &Pat, handle: bool) {
        if let Some(scope) = self.scopes.last_mut() {
            for ident in pat_idents(pat) {
                scope.insert(ident, handle);
            }
        }
    }

    /// Visit a function body with none of the enclosing locals in scope.
    fn visit_fn_body(&mut self, body: &Block) {
        let outer = std::mem::replace(&mut self.scopes, vec![HashMap::new()]);
        self.visit_block(body);
        self.scopes = outer;
    }

    fn is_lookup_fn(&self, path: &syn::Path) -> bool {
        let segments = path_segments(path);
        match segments.as_slice() {
            [function] => self.functions.contains(function),
            [qualifier, function] if self.qualifiers.contains(qualifier) => function == LOOKUP_FN,
            _ => self.scanner.is_lookup_fn_path(&segments),
        }
    }

    /// Whether `path` names an item of the library, like `zipbox::Registry`.
    fn is_rooted(&self, path: &syn::Path) -> bool {
        let segments = path_segments(path);
        match segments.first() {
            Some(first) if segments.len() > 1 && self.qualifiers.contains(first) => true,
            _ => segments.starts_with(&self.scanner.segments) && segments.len() > 1,
        }
    }

    /// Whether `expr` evaluates to a value obtained from the library.
    fn is_handle_expr(&self, expr: &Expr) -> bool {
        match peel(expr) {
            Expr::Call(call) => match &*call.func {
                Expr::Path(func) => self.is_rooted(&func.path),
                _ => false,
            },
            Expr::Struct(value) => self.is_rooted(&value.path),
            Expr::Path(value) => {
                self.is_rooted(&value.path)
                    || value
                        .path
                        .get_ident()
                        .is_some_and(|ident| self.is_handle(&ident.to_string()))
            }
            _ => false,
        }
    }
}

impl<'ast> Visit<'ast> for CallVisitor<'_> {
    fn visit_item(&mut self, node: &'ast Item) {
        if self.scanner.tags.enabled(item_attrs(node)) {
            visit::visit_item(self, node);
        }
    }

    fn visit_impl_item(&mut self, node: &'ast ImplItem) {
        let attrs: &[Attribute] = match node {
            ImplItem::Const(item) => &item.attrs,
            ImplItem::Fn(item) => &item.attrs,
            ImplItem::Type(item) => &item.attrs,
            ImplItem::Macro(item) => &item.attrs,
            _ => &[],
        };
        if self.scanner.tags.enabled(attrs) {
            visit::visit_impl_item(self, node);
        }
    }

    fn visit_trait_item(&mut self, node: &'ast TraitItem) {
        let attrs: &[Attribute] = match node {
            TraitItem::Const(item) => &item.attrs,
            TraitItem::Fn(item) => &item.attrs,
            TraitItem::Type(item) => &item.attrs,
            TraitItem::Macro(item) => &item.attrs,
            _ => &[],
        };
        if self.scanner.tags.enabled(attrs) {
            visit::visit_trait_item(self, node);
        }
    }

    fn visit_arm(&mut self, node: &'ast syn::Arm) {
        if self.scanner.tags.enabled(&node.attrs) {
            self.scopes.push(HashMap::new());
            self.bind(&node.pat, false);
            visit::visit_arm(self, node);
            self.scopes.pop();
        }
    }

    fn visit_block(&mut self, node: &'ast Block) {
        self.scopes.push(HashMap::new());
        visit::visit_block(self, node);
        self.scopes.pop();
    }

    fn visit_item_fn(&mut self, node: &'ast ItemFn) {
        self.visit_fn_body(&node.block);
    }

    fn visit_impl_item_fn(&mut self, node: &'ast ImplItemFn) {
        self.visit_fn_body(&node.block);
    }

    fn visit_trait_item_fn(&mut self, node: &'ast TraitItemFn) {
        if let Some(body) = &node.default {
            self.visit_fn_body(body);
        }
    }

    fn visit_expr_closure(&mut self, node: &'ast ExprClosure) {
        self.scopes.push(HashMap::new());
        for input in &node.inputs {
            self.bind(input, false);
        }
        self.visit_expr(&node.body);
        self.scopes.pop();
    }

    fn visit_expr_for_loop(&mut self, node: &'ast ExprForLoop) {
        self.visit_expr(&node.expr);
        self.scopes.push(HashMap::new());
        self.bind(&node.pat, false);
        self.visit_block(&node.body);
        self.scopes.pop();
    }

    fn visit_stmt_macro(&mut self, node: &'ast StmtMacro) {
        if self.scanner.tags.enabled(&node.attrs) {
            visit::visit_stmt_macro(self, node);
        }
    }

    fn visit_item_mod(&mut self, node: &'ast ItemMod) {
        let path = path_attr(&node.attrs);
        let name = node.ident.to_string();

        if node.content.is_none() {
            self.scan.modules.push(ModuleDecl {
                inline: self.inline.clone(),
                name,
                path,
            });
            return;
        }

        self.inline.push(path.unwrap_or(name));
        visit::visit_item_mod(self, node);
        self.inline.pop();
    }

    fn visit_local(&mut self, node: &'ast Local) {
        if !self.scanner.tags.enabled(&node.attrs) {
            return;
        }

        // The initializer still sees the bindings this statement shadows.
        let handle = match (pat_ident(&node.pat), &node.init) {
            (Some(ident), Some(init)) if self.is_handle_expr(&init.expr) => {
                tracing::info!(
                    file = %self.file.display(),
                    line = node.span().start().line,
                    variable = %ident,
                    "handle variable found"
                );
                true
            }
            _ => false,
        };
        visit::visit_local(self, node);
        self.bind(&node.pat, handle);
    }

    fn visit_expr_call(&mut self, node: &'ast ExprCall) {
        if let Expr::Path(func) = &*node.func {
            if self.is_lookup_fn(&func.path) {
                self.record(&node.args, node.span().start().line);
            }
        }
        visit::visit_expr_call(self, node);
    }

    fn visit_expr_method_call(&mut self, node: &'ast ExprMethodCall) {
        if node.method == LOOKUP_FN && self.is_handle_expr(&node.receiver) {
            self.record(&node.args, node.method.span().start().line);
        }
        visit::visit_expr_method_call(self, node);
    }

    fn visit_macro(&mut self, node: &'ast Macro) {
        let parser = Punctuated::<Expr, Token![,]>::parse_terminated;
        if let Ok(exprs) = node.parse_body_with(parser) {
            for expr in &exprs {
                Visit::visit_expr(self, expr);
            }
        }
    }
}

fn path_segments(path: &syn::Path) -> Vec<String> {
    path.segments
        .iter()
        .map(|segment| segment.ident.to_string())
        .collect()
}

/// Strip `?`, parentheses, references and unwrapping method calls.
fn peel(expr: &Expr) -> &Expr {
    match expr {
        Expr::Try(inner) => peel(&inner.expr),
        Expr::Paren(inner) => peel(&inner.expr),
        Expr::Reference(inner) => peel(&inner.expr),
        Expr::MethodCall(call) if PASSTHROUGH_METHODS.contains(&call.method.to_string().as_str()) => {
            peel(&call.receiver)
        }
        _ => expr,
    }
}

fn pat_ident(pat: &Pat) -> Option<String> {
    match pat {
        Pat::Ident(ident) => Some(ident.ident.to_string()),
        Pat::Type(typed) => pat_ident(&typed.pat),
        _ => None,
    }
}

/// Box directories are resolved against the package root.
fn is_inside_package(name: &str) -> bool {
    Path::new(name)
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

/// Every name a pattern binds.
fn pat_idents(pat: &Pat) -> Vec<String> {
    struct Idents(Vec<String>);

    impl<'ast> Visit<'ast> for Idents {
        fn visit_pat_ident(&mut self, node: &'ast PatIdent) {
            self.0.push(node.ident.to_string());
            visit::visit_pat_ident(self, node);
        }
    }

    let mut idents = Idents(Vec::new());
    idents.visit_pat(pat);
    idents.0
}

fn path_attr(attrs: &[Attribute]) -> Option<String> {
    attrs.iter().find_map(|attr| match &attr.meta {
        Meta::NameValue(pair) if pair.path.is_ident("path") => match &pair.value {
            Expr::Lit(lit) => match &lit.lit {
                Lit::Str(value) => Some(value.value()),
                _ => None,
            },
            _ => None,
        },
        _ => None,
    })
}

fn item_attrs(item: &Item) -> &[Attribute] {
    match item {
        Item::Const(item) => &item.attrs,
        Item::Enum(item) => &item.attrs,
        Item::ExternCrate(item) => &item.attrs,
        Item::Fn(item) => &item.attrs,
        Item::ForeignMod(item) => &item.attrs,
        Item::Impl(item) => &item.attrs,
        Item::Macro(item) => &item.attrs,
        Item::Mod(item) => &item.attrs,
        Item::Static(item) => &item.attrs,
        Item::Struct(item) => &item.attrs,
        Item::Trait(item) => &item.attrs,
        Item::TraitAlias(item) => &item.attrs,
        Item::Type(item) => &item.attrs,
        Item::Union(item) => &item.attrs,
        Item::Use(item) => &item.attrs,
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImportSpec;

    fn scan_with(config: &BuildConfig, source: &str) -> Result<Vec<String>> {
        let scan = Scanner::new(config).scan_source(Path::new("main.rs"), source)?;
        Ok(scan.lookups.into_iter().map(|l| l.name).collect())
    }

    fn scan(source: &str) -> Vec<String> {
        scan_with(&BuildConfig::default(), source).unwrap()
    }

    #[test]
    fn test_qualified_lookups() {
        let names = scan(
            r#"
            fn main() {
                let public = zipbox::get("public").unwrap();
                let css = ::zipbox::get("static/css")?;
                let other = other::get("nope");
            }
            "#,
        );
        assert_eq!(names, ["public", "static/css"]);
    }

    #[test]
    fn test_renamed_imports() {
        let names = scan(
            r#"
            use zipbox as zb;
            use zipbox::get as fetch;
            extern crate zipbox as boxes;

            fn main() {
                zb::get("a");
                fetch("b");
                boxes::get("c");
                get("not-imported");
            }
            "#,
        );
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_grouped_and_glob_imports() {
        assert_eq!(
            scan("use zipbox::{self, get}; fn f() { get(\"a\"); zipbox::get(\"b\"); }"),
            ["a", "b"]
        );
        assert_eq!(scan("use zipbox::*; fn f() { get(\"a\"); }"), ["a"]);
        assert_eq!(
            scan("use zipbox::{self as z}; fn f() { z::get(\"a\"); }"),
            ["a"]
        );
    }

    #[test]
    fn test_underscore_import_does_not_count() {
        assert!(scan("use zipbox::get as _; fn f() { get(\"a\"); }").is_empty());
    }

    #[test]
    fn test_custom_import_path() {
        let config = BuildConfig {
            import: ImportSpec::new("assets", "my_app::assets").unwrap(),
            tags: Vec::new(),
        };
        let names = scan_with(
            &config,
            r#"
            use my_app::assets::get as load;
            fn f() {
                assets::get("a");
                my_app::assets::get("b");
                load("c");
                zipbox::get("ignored");
            }
            "#,
        )
        .unwrap();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_handle_variables() {
        let names = scan(
            r#"
            fn main() -> zipbox::Result<()> {
                let registry = zipbox::init();
                let opened: &zipbox::Registry = &zipbox::Registry::open("app")?;
                let map = std::collections::HashMap::new();
                registry.get("public")?;
                opened.get("docs")?;
                zipbox::init().get("inline")?;
                map.get("not-a-box");
                Ok(())
            }
            "#,
        );
        assert_eq!(names, ["public", "docs", "inline"]);
    }

    #[test]
    fn test_rebinding_drops_handle() {
        let source = "fn main() {\n    let v = zipbox::init();\n    v.get(\"public\");\n    let v = vec![1, 2];\n    v.get(0);\n}\n";
        assert_eq!(scan(source), ["public"]);
    }

    #[test]
    fn test_handles_follow_scopes() {
        let names = scan(
            r#"
            fn main() {
                let v = vec![1];
                {
                    let v = zipbox::init();
                    v.get("inner");
                }
                v.get(0);

                let registry = zipbox::init();
                let first = |registry: Vec<u8>| registry.get(0).copied();
                for registry in [vec![1u8]] {
                    registry.get(0);
                }
                match vec![2u8] {
                    registry => registry.get(1),
                };
                let registry = registry.get("outer");
                registry.get(2);
            }

            fn other(registry: Vec<u8>) {
                registry.get(0);
            }
            "#,
        );
        assert_eq!(names, ["inner", "outer"]);
    }

    #[test]
    fn test_lookups_inside_macros() {
        let names = scan(
            r#"
            fn main() {
                println!("{}", zipbox::get("public").unwrap().name());
                let all = vec![zipbox::get("a"), zipbox::get("b")];
                assert!(zipbox::get("c").is_ok(), "missing box");
            }
            "#,
        );
        assert_eq!(names, ["public", "a", "b", "c"]);
    }

    #[test]
    fn test_non_literal_reports_line() {
        let source = "fn main() {\n    let name = \"public\";\n    zipbox::get(name);\n}\n";
        let err = scan_with(&BuildConfig::default(), source).unwrap_err();
        match err {
            Error::ScanLiteralRequired { file, line } => {
                assert_eq!(file, Path::new("main.rs"));
                assert_eq!(line, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_box_name_must_stay_inside_package() {
        for name in ["/etc", "../secrets", "public/../../x"] {
            let source = format!("fn main() {{\n    zipbox::get({name:?});\n}}\n");
            match scan_with(&BuildConfig::default(), &source).unwrap_err() {
                Error::InvalidBoxName {
                    line, name: found, ..
                } => {
                    assert_eq!(line, 2);
                    assert_eq!(found, name);
                }
                other => panic!("unexpected error for {name}: {other}"),
            }
        }

        assert_eq!(
            scan(r#"fn f() { zipbox::get("./public/"); zipbox::get("a..b"); }"#),
            ["./public/", "a..b"]
        );
    }

    #[test]
    fn test_parse_error() {
        let err = scan_with(&BuildConfig::default(), "fn main( {").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_cfg_gates_lookups() {
        let source = r#"
            fn main() { zipbox::get("app"); }

            #[cfg(test)]
            mod tests {
                fn t() { zipbox::get("fixtures"); }
            }

            #[cfg(feature = "docs")]
            fn docs() { zipbox::get("docs"); }

            #[cfg(unix)]
            fn unix() { zipbox::get("unix"); }
        "#;

        assert_eq!(scan(source), ["app", "docs", "unix"]);

        let config = BuildConfig::new(ImportSpec::default(), ["test"]);
        assert_eq!(
            scan_with(&config, source).unwrap(),
            ["app", "fixtures", "unix"]
        );
    }

    #[test]
    fn test_file_level_cfg() {
        assert!(scan("#![cfg(test)]\nfn f() { zipbox::get(\"a\"); }").is_empty());
    }

    #[test]
    fn test_module_declarations() {
        let scan = Scanner::new(&BuildConfig::default())
            .scan_source(
                Path::new("lib.rs"),
                r#"
                mod assets;
                #[path = "other.rs"]
                mod renamed;
                mod outer {
                    mod inner;
                }
                #[cfg(test)]
                mod tests;
                "#,
            )
            .unwrap();

        assert_eq!(
            scan.modules,
            [
                ModuleDecl {
                    inline: vec![],
                    name: "assets".into(),
                    path: None
                },
                ModuleDecl {
                    inline: vec![],
                    name: "renamed".into(),
                    path: Some("other.rs".into())
                },
                ModuleDecl {
                    inline: vec!["outer".into()],
                    name: "inner".into(),
                    path: None
                },
            ]
        );
    }
}
