// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Rust boundary detector.
//!
//! Finds:
//! - `fn` items, including methods inside `impl` and `trait` blocks
//! - `struct`, `enum`, `union`, `trait` and `type` items
//! - `#[test]` functions (also inside `mod tests { ... }`)
//! - `use` statements and `mod name;` declarations

use regex::Regex;
use std::path::{Path, PathBuf};

use super::{
    brace_block_end, leading_block_start, line_number, lookup_known, parent_dir, signature_until,
    BoundaryDetector, CodeUnit, ImportKind, ImportRef, KnownFiles, Quotes, UnitKind,
};
use crate::model::Language;

/// Detector for Rust source files.
pub struct RustDetector {
    /// Regex for `use` statements
    use_regex: Regex,
    /// Regex for `mod name;` declarations
    mod_decl_regex: Regex,
    /// Regex for inline `mod name {` blocks
    mod_block_regex: Regex,
    /// Regex for `fn` items
    fn_regex: Regex,
    /// Regex for type items
    type_regex: Regex,
    /// Regex for `impl` headers
    impl_regex: Regex,
}

impl RustDetector {
    /// Create a new Rust detector.
    pub fn new() -> Self {
        Self {
            // Match: use path::to::module; or use path::to::{item1, item2};
            use_regex: Regex::new(
                r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?use\s+((?:crate|super|self|[a-zA-Z_][a-zA-Z0-9_]*)(?:::[a-zA-Z_][a-zA-Z0-9_]*)*(?:::\{[^}]+\}|::\*)?)\s*;"
            ).unwrap(),

            // Match: mod name;
            mod_decl_regex: Regex::new(
                r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?mod\s+([a-zA-Z_][a-zA-Z0-9_]*)\s*;"
            ).unwrap(),

            // Match: mod name {
            mod_block_regex: Regex::new(
                r"^\s*(?:pub(?:\([^)]*\))?\s+)?mod\s+[a-zA-Z_][a-zA-Z0-9_]*\s*\{"
            ).unwrap(),

            // Match: pub async unsafe extern "C" fn name
            fn_regex: Regex::new(
                r#"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:(?:const|async|unsafe|default|extern(?:\s+"[^"]*")?)\s+)*fn\s+([a-zA-Z_][a-zA-Z0-9_]*)"#
            ).unwrap(),

            // Match: pub struct Name / enum / union / trait / type
            type_regex: Regex::new(
                r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:unsafe\s+)?(struct|enum|union|trait|type)\s+([a-zA-Z_][a-zA-Z0-9_]*)"
            ).unwrap(),

            // Match: impl<T> Trait for Type / impl Type
            impl_regex: Regex::new(r"^\s*(?:unsafe\s+)?impl\b(.*)$").unwrap(),
        }
    }

    /// Split an `impl` header into (trait, self type).
    fn parse_impl_header(rest: &str) -> Option<(Option<String>, String)> {
        let mut rest = rest.trim_start();

        // Skip generic parameters: impl<T: Into<String>> ...
        if rest.starts_with('<') {
            let mut depth = 0;
            let mut cut = rest.len();
            for (i, c) in rest.char_indices() {
                match c {
                    '<' => depth += 1,
                    '>' => {
                        depth -= 1;
                        if depth == 0 {
                            cut = i + 1;
                            break;
                        }
                    }
                    _ => {}
                }
            }
            rest = rest[cut..].trim_start();
        }

        let header = rest
            .split('{')
            .next()
            .unwrap_or(rest)
            .split(" where")
            .next()
            .unwrap_or(rest)
            .trim();

        let (trait_part, type_part) = match header.split_once(" for ") {
            Some((t, ty)) => (Some(t), ty),
            None => (None, header),
        };

        let type_name = Self::base_name(type_part)?;
        let trait_name = trait_part.and_then(Self::base_name);
        Some((trait_name, type_name))
    }

    /// `&'a mut path::Name<T>` -> `Name`
    fn base_name(text: &str) -> Option<String> {
        let text = text
            .trim()
            .trim_start_matches('&')
            .trim_start_matches('!')
            .trim_start();
        let text = match text.strip_prefix('\'') {
            Some(after) => after.split_once(' ').map(|(_, t)| t).unwrap_or(""),
            None => text,
        };
        let text = text.trim_start().trim_start_matches("mut ").trim_start_matches("dyn ");
        let path = text.split('<').next().unwrap_or(text).trim();
        let name = path.rsplit("::").next().unwrap_or(path);
        let valid = !name.is_empty()
            && name.chars().all(|c| c.is_alphanumeric() || c == '_');
        valid.then(|| name.to_string())
    }

    fn is_leading(line: &str) -> bool {
        line.starts_with("///") || line.starts_with("#[")
    }

    /// Doc comment text and test marker from the lines above an item.
    fn leading_info(lines: &[&str], first: usize, item: usize) -> (Option<String>, bool) {
        let mut docs = Vec::new();
        let mut is_test = false;
        for line in &lines[first..item] {
            let trimmed = line.trim();
            if let Some(doc) = trimmed.strip_prefix("///") {
                docs.push(doc.strip_prefix(' ').unwrap_or(doc).to_string());
            } else if trimmed.starts_with("#[") {
                let attr = trimmed.trim_start_matches("#[").trim_end_matches(']');
                if attr == "test" || attr.ends_with("::test") || attr.starts_with("tokio::test") {
                    is_test = true;
                }
            }
        }
        let docstring = (!docs.is_empty()).then(|| docs.join("\n"));
        (docstring, is_test)
    }

    fn scan(
        &self,
        lines: &[&str],
        from: usize,
        to: usize,
        parent: Option<&str>,
        units: &mut Vec<CodeUnit>,
        impls: &mut Vec<(String, String)>,
    ) {
        let mut i = from;
        while i <= to && i < lines.len() {
            let line = lines[i];

            if let Some(cap) = self.fn_regex.captures(line) {
                let end = brace_block_end(lines, i, Quotes::SingleIsChar).min(to.max(i));
                let first = leading_block_start(lines, i, Self::is_leading);
                let (docstring, is_test) = Self::leading_info(lines, first, i);

                let mut unit = CodeUnit::new(&cap[1], UnitKind::Function, first as u32 + 1, end as u32 + 1);
                unit.signature = signature_until(lines, i, end, '{');
                unit.docstring = docstring;
                unit.parent = parent.map(str::to_string);
                unit.is_test = is_test;
                units.push(unit);

                i = end + 1;
                continue;
            }

            if let Some(cap) = self.type_regex.captures(line) {
                let end = brace_block_end(lines, i, Quotes::SingleIsChar).min(to.max(i));
                let first = leading_block_start(lines, i, Self::is_leading);
                let (docstring, _) = Self::leading_info(lines, first, i);
                let name = cap[2].to_string();

                let mut unit = CodeUnit::new(&name, UnitKind::Class, first as u32 + 1, end as u32 + 1);
                unit.signature = signature_until(lines, i, end, '{');
                unit.docstring = docstring;
                unit.parent = parent.map(str::to_string);

                if &cap[1] == "trait" {
                    if let Some((_, supertraits)) = line.split_once(':') {
                        unit.bases = supertraits
                            .split(['+', '{'])
                            .filter_map(Self::base_name)
                            .collect();
                    }
                }
                units.push(unit);

                if &cap[1] == "trait" && end > i {
                    self.scan(lines, i + 1, end - 1, Some(&name), units, impls);
                }
                i = end + 1;
                continue;
            }

            if let Some(cap) = self.impl_regex.captures(line) {
                let end = brace_block_end(lines, i, Quotes::SingleIsChar).min(to.max(i));
                if let Some((trait_name, type_name)) = Self::parse_impl_header(&cap[1]) {
                    if let Some(trait_name) = trait_name {
                        impls.push((type_name.clone(), trait_name));
                    }
                    if end > i {
                        self.scan(lines, i + 1, end - 1, Some(&type_name), units, impls);
                    }
                }
                i = end + 1;
                continue;
            }

            if self.mod_block_regex.is_match(line) {
                let end = brace_block_end(lines, i, Quotes::SingleIsChar).min(to.max(i));
                if end > i {
                    self.scan(lines, i + 1, end - 1, None, units, impls);
                }
                i = end + 1;
                continue;
            }

            i += 1;
        }
    }

    /// Directory holding the children of the module defined by `file`.
    fn module_dir(file: &Path) -> PathBuf {
        let name = file.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if matches!(name, "mod.rs" | "lib.rs" | "main.rs") {
            parent_dir(file)
        } else {
            let stem = file.file_stem().unwrap_or_default();
            parent_dir(file).join(stem)
        }
    }

    /// The `src` directory of the crate containing `file`.
    fn crate_src(file: &Path) -> PathBuf {
        let mut src = PathBuf::new();
        let mut found = None;
        for component in file.components() {
            src.push(component);
            if component.as_os_str() == "src" {
                found = Some(src.clone());
            }
        }
        found.unwrap_or_else(|| PathBuf::from("src"))
    }

    /// Resolve `a::b::C` under `base_dir`, preferring the deepest module file.
    fn resolve_module_path(module_path: &str, base_dir: &Path, known: &KnownFiles) -> Option<String> {
        let segments: Vec<&str> = module_path
            .split("::")
            .take_while(|s| !s.starts_with('{') && *s != "*")
            .collect();

        for depth in (1..=segments.len()).rev() {
            let mut dir = base_dir.to_path_buf();
            for segment in &segments[..depth - 1] {
                dir.push(segment);
            }
            let last = segments[depth - 1];

            // Try: base_dir/module.rs
            if let Some(found) = lookup_known(known, &dir.join(format!("{}.rs", last))) {
                return Some(found);
            }
            // Try: base_dir/module/mod.rs
            if let Some(found) = lookup_known(known, &dir.join(last).join("mod.rs")) {
                return Some(found);
            }
        }

        None
    }
}

impl Default for RustDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundaryDetector for RustDetector {
    fn extensions(&self) -> &[&str] {
        &["rs"]
    }

    fn language(&self) -> Language {
        Language::Rust
    }

    fn detect_units(&self, content: &str) -> Vec<CodeUnit> {
        let lines: Vec<&str> = content.lines().collect();
        if lines.is_empty() {
            return Vec::new();
        }

        let mut units = Vec::new();
        let mut impls = Vec::new();
        self.scan(&lines, 0, lines.len() - 1, None, &mut units, &mut impls);

        // `impl Trait for Type` makes Trait a base of Type.
        for (type_name, trait_name) in impls {
            if let Some(unit) = units
                .iter_mut()
                .find(|u| u.kind == UnitKind::Class && u.name == type_name && u.parent.is_none())
            {
                if !unit.bases.contains(&trait_name) {
                    unit.bases.push(trait_name);
                }
            }
        }

        units
    }

    fn parse_imports(&self, content: &str) -> Vec<ImportRef> {
        let mut imports = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for cap in self.use_regex.captures_iter(content) {
            if let Some(path_match) = cap.get(1) {
                let path = path_match.as_str();
                if !seen.insert(path.to_string()) {
                    continue;
                }
                let kind = if path.starts_with("crate::") {
                    ImportKind::CrateRoot
                } else if path.starts_with("super::") {
                    ImportKind::Parent
                } else if path.starts_with("self::") {
                    ImportKind::Current
                } else {
                    ImportKind::External
                };
                let line = line_number(content, path_match.start());
                imports.push(ImportRef::new(path, kind, line));
            }
        }

        for cap in self.mod_decl_regex.captures_iter(content) {
            if let Some(name) = cap.get(1) {
                let raw = format!("self::{}", name.as_str());
                if seen.insert(raw.clone()) {
                    let line = line_number(content, name.start());
                    imports.push(ImportRef::new(raw, ImportKind::Current, line));
                }
            }
        }

        imports
    }

    fn resolve_import(
        &self,
        import: &ImportRef,
        from_file: &Path,
        known: &KnownFiles,
    ) -> Option<String> {
        let raw = &import.raw_path;

        match import.kind {
            ImportKind::CrateRoot => {
                let rest = raw.strip_prefix("crate::")?;
                let src = Self::crate_src(from_file);
                Self::resolve_module_path(rest, &src, known)
                    .or_else(|| lookup_known(known, &src.join("lib.rs")))
                    .or_else(|| lookup_known(known, &src.join("main.rs")))
            }
            ImportKind::Parent => {
                let mut rest = raw.as_str();
                let mut base = Self::module_dir(from_file);
                while let Some(next) = rest.strip_prefix("super::") {
                    base = parent_dir(&base);
                    rest = next;
                }
                Self::resolve_module_path(rest, &base, known)
            }
            ImportKind::Current => {
                let rest = raw.strip_prefix("self::")?;
                Self::resolve_module_path(rest, &Self::module_dir(from_file), known)
            }
            // External crates are not part of the project graph.
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(paths: &[&str]) -> KnownFiles {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_detect_functions() {
        let detector = RustDetector::new();
        let content = r#"
/// Adds one.
pub fn a(x: u32) -> u32 {
    b(x) + 1
}

fn b(x: u32) -> u32 {
    x
}
"#;
        let units = detector.detect_units(content);
        assert_eq!(units.len(), 2);

        assert_eq!(units[0].name, "a");
        assert_eq!(units[0].start_line, 2);
        assert_eq!(units[0].end_line, 5);
        assert_eq!(units[0].signature, "pub fn a(x: u32) -> u32");
        assert_eq!(units[0].docstring.as_deref(), Some("Adds one."));

        assert_eq!(units[1].name, "b");
        assert_eq!(units[1].start_line, 7);
        assert_eq!(units[1].end_line, 9);
    }

    #[test]
    fn test_detect_struct_and_impl_methods() {
        let detector = RustDetector::new();
        let content = r#"pub struct Store {
    path: String,
}

impl Store {
    pub fn open(path: &str) -> Self {
        Self { path: path.to_string() }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::open(".")
    }
}
"#;
        let units = detector.detect_units(content);
        let names: Vec<(&str, Option<&str>)> = units
            .iter()
            .map(|u| (u.name.as_str(), u.parent.as_deref()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("Store", None),
                ("open", Some("Store")),
                ("default", Some("Store")),
            ]
        );
        assert_eq!(units[0].kind, UnitKind::Class);
        assert_eq!(units[0].end_line, 3);
        assert_eq!(units[0].bases, vec!["Default".to_string()]);
    }

    #[test]
    fn test_detect_tests_in_mod() {
        let detector = RustDetector::new();
        let content = r#"fn helper() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper() {
        helper();
    }
}
"#;
        let units = detector.detect_units(content);
        assert_eq!(units.len(), 2);
        assert!(!units[0].is_test);
        assert_eq!(units[1].name, "test_helper");
        assert!(units[1].is_test);
        assert_eq!(units[1].start_line, 7);
    }

    #[test]
    fn test_trait_methods_and_supertraits() {
        let detector = RustDetector::new();
        let content = r#"pub trait Detector: Send + Sync {
    fn name(&self) -> &str;
    fn run(&self) {
        self.name();
    }
}
"#;
        let units = detector.detect_units(content);
        assert_eq!(units[0].name, "Detector");
        assert_eq!(units[0].bases, vec!["Send".to_string(), "Sync".to_string()]);
        assert_eq!(units[1].name, "name");
        assert_eq!(units[1].end_line, 2);
        assert_eq!(units[2].name, "run");
        assert_eq!(units[2].parent.as_deref(), Some("Detector"));
    }

    #[test]
    fn test_parse_impl_header() {
        assert_eq!(
            RustDetector::parse_impl_header("<T: Into<String>> From<T> for Wrapper<T> {"),
            Some((Some("From".to_string()), "Wrapper".to_string()))
        );
        assert_eq!(
            RustDetector::parse_impl_header(" crate::store::Store {"),
            Some((None, "Store".to_string()))
        );
        assert_eq!(
            RustDetector::parse_impl_header("<'a> Iterator for &'a mut Cursor where Self: Sized {"),
            Some((Some("Iterator".to_string()), "Cursor".to_string()))
        );
    }

    #[test]
    fn test_parse_use_statements() {
        let detector = RustDetector::new();
        let content = r#"
use std::collections::HashMap;
use crate::utils::helpers;
use super::config::Config;
use self::inner::Thing;
pub use crate::model::{Chunk, Edge};
mod inner;
"#;
        let imports = detector.parse_imports(content);

        assert_eq!(imports.len(), 6);
        assert!(imports
            .iter()
            .any(|i| i.raw_path == "std::collections::HashMap" && i.kind == ImportKind::External));
        assert!(imports.iter().any(|i| i.kind == ImportKind::CrateRoot));
        assert!(imports.iter().any(|i| i.kind == ImportKind::Parent));
        assert!(imports
            .iter()
            .any(|i| i.raw_path == "self::inner" && i.kind == ImportKind::Current));
    }

    #[test]
    fn test_resolve_crate_import() {
        let detector = RustDetector::new();
        let files = known(&["src/lib.rs", "src/utils/mod.rs", "src/utils/helpers.rs"]);

        let import = ImportRef::new("crate::utils::helpers", ImportKind::CrateRoot, 1);
        assert_eq!(
            detector.resolve_import(&import, Path::new("src/main.rs"), &files),
            Some("src/utils/helpers.rs".to_string())
        );

        let import = ImportRef::new("crate::utils::Thing", ImportKind::CrateRoot, 1);
        assert_eq!(
            detector.resolve_import(&import, Path::new("src/main.rs"), &files),
            Some("src/utils/mod.rs".to_string())
        );

        let import = ImportRef::new("crate::Root", ImportKind::CrateRoot, 1);
        assert_eq!(
            detector.resolve_import(&import, Path::new("src/utils/helpers.rs"), &files),
            Some("src/lib.rs".to_string())
        );
    }

    #[test]
    fn test_resolve_workspace_crate_import() {
        let detector = RustDetector::new();
        let files = known(&["crates/core/src/lib.rs", "crates/core/src/graph.rs"]);
        let import = ImportRef::new("crate::graph::Graph", ImportKind::CrateRoot, 1);
        assert_eq!(
            detector.resolve_import(&import, Path::new("crates/core/src/lib.rs"), &files),
            Some("crates/core/src/graph.rs".to_string())
        );
    }

    #[test]
    fn test_resolve_super_and_self() {
        let detector = RustDetector::new();
        let files = known(&[
            "src/indexer/mod.rs",
            "src/indexer/graph.rs",
            "src/indexer/languages/mod.rs",
            "src/indexer/languages/rust.rs",
        ]);

        let import = ImportRef::new("super::graph::Graph", ImportKind::Parent, 1);
        assert_eq!(
            detector.resolve_import(&import, Path::new("src/indexer/languages/mod.rs"), &files),
            Some("src/indexer/graph.rs".to_string())
        );

        let import = ImportRef::new("self::rust", ImportKind::Current, 1);
        assert_eq!(
            detector.resolve_import(&import, Path::new("src/indexer/languages/mod.rs"), &files),
            Some("src/indexer/languages/rust.rs".to_string())
        );

        let import = ImportRef::new("self::languages", ImportKind::Current, 1);
        assert_eq!(
            detector.resolve_import(&import, Path::new("src/indexer/mod.rs"), &files),
            Some("src/indexer/languages/mod.rs".to_string())
        );
    }

    #[test]
    fn test_external_crate_unresolved() {
        let detector = RustDetector::new();
        let import = ImportRef::new("serde::Serialize", ImportKind::External, 1);
        assert_eq!(
            detector.resolve_import(&import, Path::new("src/lib.rs"), &known(&["src/lib.rs"])),
            None
        );
    }
}
