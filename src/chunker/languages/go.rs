// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Go boundary detector.
//!
//! Finds `func` declarations (methods get their receiver type as parent),
//! `type` declarations, `Test*` functions and `import` statements.

use regex::Regex;
use std::path::Path;

use super::{
    brace_block_end, leading_block_start, line_number, signature_until, BoundaryDetector,
    CodeUnit, ImportKind, ImportRef, KnownFiles, Quotes, UnitKind,
};
use crate::model::Language;

// Standard library packages don't contain dots (usually)
// except for some like "net/http", "encoding/json"
const STDLIB_ROOTS: &[&str] = &[
    "archive", "bufio", "bytes", "compress", "container", "context", "crypto", "database",
    "debug", "embed", "encoding", "errors", "expvar", "flag", "fmt", "go", "hash", "html",
    "image", "index", "io", "log", "math", "mime", "net", "os", "path", "plugin", "reflect",
    "regexp", "runtime", "sort", "strconv", "strings", "sync", "syscall", "testing", "text",
    "time", "unicode", "unsafe",
];

/// Detector for Go source files.
pub struct GoDetector {
    /// Regex for single import: import "path"
    import_single_regex: Regex,
    /// Regex for import block: import ( ... )
    import_block_regex: Regex,
    /// Regex for individual imports within a block
    import_line_regex: Regex,
    /// Regex for functions and methods: func (r *Recv) Name(
    func_regex: Regex,
    /// Regex for type declarations
    type_regex: Regex,
}

impl GoDetector {
    /// Create a new Go detector.
    pub fn new() -> Self {
        Self {
            // Match: import "fmt" or import . "fmt" or import alias "fmt"
            import_single_regex: Regex::new(r#"(?m)^\s*import\s+(?:(\w+|\.)\s+)?["']([^"']+)["']"#)
                .unwrap(),

            // Match: import ( ... )
            import_block_regex: Regex::new(r#"(?ms)import\s*\(([^)]+)\)"#).unwrap(),

            // Match: individual imports within block (with optional alias)
            import_line_regex: Regex::new(r#"(?m)^\s*(?:(\w+|\.)\s+)?["']([^"']+)["']"#).unwrap(),

            // Match: func Name( or func (r *Receiver[T]) Name[T any](
            func_regex: Regex::new(
                r"^func\s+(?:\(\s*(?:\w+\s+)?\*?\s*([A-Za-z_]\w*)(?:\[[^\]]*\])?\s*\)\s*)?([A-Za-z_]\w*)\s*[\[(]"
            ).unwrap(),

            // Match: type Name struct / interface / func / = alias
            type_regex: Regex::new(r"^type\s+([A-Za-z_]\w*)(?:\[[^\]]*\])?\s+\S").unwrap(),
        }
    }

    /// Classify an import path.
    fn classify_import(path: &str) -> ImportKind {
        let root = path.split('/').next().unwrap_or(path);
        if STDLIB_ROOTS.contains(&root) || root.contains('.') {
            ImportKind::External
        } else {
            ImportKind::Absolute
        }
    }

    /// `//` comment text directly above a declaration.
    fn doc_comment(lines: &[&str], first: usize, item: usize) -> Option<String> {
        let text: Vec<&str> = lines[first..item]
            .iter()
            .map(|l| l.trim().trim_start_matches("//").trim())
            .collect();
        (!text.is_empty()).then(|| text.join("\n"))
    }
}

impl Default for GoDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundaryDetector for GoDetector {
    fn extensions(&self) -> &[&str] {
        &["go"]
    }

    fn language(&self) -> Language {
        Language::Go
    }

    fn detect_units(&self, content: &str) -> Vec<CodeUnit> {
        let lines: Vec<&str> = content.lines().collect();
        let mut units = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];
            let (name, kind, receiver) = if let Some(cap) = self.func_regex.captures(line) {
                (
                    cap[2].to_string(),
                    UnitKind::Function,
                    cap.get(1).map(|m| m.as_str().to_string()),
                )
            } else if let Some(cap) = self.type_regex.captures(line) {
                (cap[1].to_string(), UnitKind::Class, None)
            } else {
                i += 1;
                continue;
            };

            let end = brace_block_end(&lines, i, Quotes::SingleIsChar);
            let first = leading_block_start(&lines, i, |l| l.starts_with("//"));

            let mut unit = CodeUnit::new(&name, kind, first as u32 + 1, end as u32 + 1);
            unit.signature = signature_until(&lines, i, end, '{');
            unit.docstring = Self::doc_comment(&lines, first, i);
            unit.is_test = kind == UnitKind::Function
                && ["Test", "Benchmark", "Fuzz"].iter().any(|p| name.starts_with(p))
                && unit.signature.contains("*testing.");
            unit.parent = receiver;
            units.push(unit);

            i = end + 1;
        }

        units
    }

    fn parse_imports(&self, content: &str) -> Vec<ImportRef> {
        let mut imports = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for cap in self.import_single_regex.captures_iter(content) {
            if let Some(path_match) = cap.get(2) {
                let path = path_match.as_str();
                if seen.insert(path.to_string()) {
                    let line = line_number(content, path_match.start());
                    imports.push(ImportRef::new(path, Self::classify_import(path), line));
                }
            }
        }

        for block in self.import_block_regex.captures_iter(content) {
            let Some(body) = block.get(1) else { continue };
            for cap in self.import_line_regex.captures_iter(body.as_str()) {
                if let Some(path_match) = cap.get(2) {
                    let path = path_match.as_str();
                    if seen.insert(path.to_string()) {
                        let line = line_number(content, body.start() + path_match.start());
                        imports.push(ImportRef::new(path, Self::classify_import(path), line));
                    }
                }
            }
        }

        imports
    }

    fn resolve_import(
        &self,
        import: &ImportRef,
        _from_file: &Path,
        known: &KnownFiles,
    ) -> Option<String> {
        let path = &import.raw_path;
        let root = path.split('/').next().unwrap_or(path);
        if STDLIB_ROOTS.contains(&root) {
            return None;
        }

        // Packages are directories. Match the longest suffix of the import
        // path against a known directory (this strips the go.mod module prefix).
        let segments: Vec<&str> = path.split('/').collect();
        for skip in 0..segments.len() {
            let dir = segments[skip..].join("/");
            let found = known.iter().find(|file| {
                file.ends_with(".go")
                    && !file.ends_with("_test.go")
                    && Path::new(file.as_str())
                        .parent()
                        .map(|p| p.to_string_lossy() == dir)
                        .unwrap_or(false)
            });
            if let Some(file) = found {
                return Some(file.clone());
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_funcs_and_methods() {
        let detector = GoDetector::new();
        let content = r#"package store

// Store keeps things.
type Store struct {
	items map[string]string
}

type ID string

// Get returns an item.
func (s *Store) Get(id ID) string {
	return s.items[string(id)]
}

func New() *Store {
	return &Store{items: map[string]string{}}
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
                ("ID", None),
                ("Get", Some("Store")),
                ("New", None),
            ]
        );
        assert_eq!(units[0].docstring.as_deref(), Some("Store keeps things."));
        assert_eq!(units[0].start_line, 3);
        assert_eq!(units[0].end_line, 6);
        assert_eq!(units[1].end_line, 8);
        assert_eq!(units[2].signature, "func (s *Store) Get(id ID) string");
        assert_eq!(units[3].end_line, 17);
    }

    #[test]
    fn test_detect_test_functions() {
        let detector = GoDetector::new();
        let content = "func TestGet(t *testing.T) {\n\tNew()\n}\n\nfunc Testify() {}\n";
        let units = detector.detect_units(content);
        assert!(units[0].is_test);
        assert!(!units[1].is_test);
    }

    #[test]
    fn test_parse_imports() {
        let detector = GoDetector::new();
        let content = r#"package main

import "fmt"

import (
	"net/http"
	store "github.com/acme/app/internal/store"
)
"#;
        let imports = detector.parse_imports(content);
        assert_eq!(imports.len(), 3);
        assert!(imports.iter().any(|i| i.raw_path == "fmt" && i.line == 3));
        let store = imports
            .iter()
            .find(|i| i.raw_path.ends_with("store"))
            .unwrap();
        assert_eq!(store.line, 7);
        assert_eq!(store.kind, ImportKind::External);
    }

    #[test]
    fn test_resolve_module_path() {
        let detector = GoDetector::new();
        let known: KnownFiles = [
            "go.mod",
            "internal/store/store.go",
            "internal/store/store_test.go",
            "cmd/app/main.go",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let import = ImportRef::new("github.com/acme/app/internal/store", ImportKind::External, 1);
        assert_eq!(
            detector.resolve_import(&import, Path::new("cmd/app/main.go"), &known),
            Some("internal/store/store.go".to_string())
        );

        let import = ImportRef::new("net/http", ImportKind::External, 1);
        assert_eq!(
            detector.resolve_import(&import, Path::new("cmd/app/main.go"), &known),
            None
        );
    }
}
