// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! TypeScript/JavaScript boundary detector.
//!
//! Finds:
//! - `function` declarations and `const x = (...) =>` / `function` expressions
//! - classes (with their methods), interfaces, type aliases and enums
//! - `it(...)` / `test(...)` blocks, also nested in `describe(...)`
//! - ES module imports, re-exports, dynamic imports and CommonJS `require()`

use regex::Regex;
use std::path::{Path, PathBuf};

use super::{
    brace_block_end, leading_block_start, line_number, lookup_known, parent_dir, signature_until,
    BoundaryDetector, CodeUnit, ImportKind, ImportRef, KnownFiles, Quotes, UnitKind,
};
use crate::model::Language;

const METHOD_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "function", "super", "await", "new",
    "typeof", "else",
];

/// Detector for TypeScript and JavaScript source files.
pub struct TypeScriptDetector {
    /// Import-like statements: ES imports, side-effect imports, dynamic
    /// imports, `require()` and `export ... from`
    import_regexes: Vec<Regex>,
    /// Regex for function declarations
    function_regex: Regex,
    /// Regex for arrow functions and function expressions bound to a name
    arrow_regex: Regex,
    /// Regex for class declarations
    class_regex: Regex,
    /// Regex for interfaces, type aliases and enums
    type_regex: Regex,
    /// Regex for methods inside a class body
    method_regex: Regex,
    /// Regex for `it('...')` / `test('...')`
    test_block_regex: Regex,
    /// Regex for `describe('...')`
    describe_regex: Regex,
}

impl TypeScriptDetector {
    /// Create a new TypeScript/JavaScript detector.
    pub fn new() -> Self {
        Self {
            import_regexes: vec![
                // import x from 'y'; import { x } from 'y'; import * as x from 'y'; import type { x } from 'y'
                Regex::new(
                    r#"(?m)^\s*import\s+(?:type\s+)?(?:(?:\{[^}]*\}|\*\s+as\s+\w+|\w+)(?:\s*,\s*(?:\{[^}]*\}|\*\s+as\s+\w+))?)\s+from\s+['"]([^'"]+)['"]"#
                ).unwrap(),
                // import 'y'
                Regex::new(r#"(?m)^\s*import\s+['"]([^'"]+)['"]"#).unwrap(),
                // import('y')
                Regex::new(r#"import\s*\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap(),
                // require('y')
                Regex::new(r#"require\s*\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap(),
                // export { x } from 'y' or export * from 'y'
                Regex::new(
                    r#"(?m)^\s*export\s+(?:type\s+)?(?:\{[^}]*\}|\*(?:\s+as\s+\w+)?)\s+from\s+['"]([^'"]+)['"]"#
                ).unwrap(),
            ],

            function_regex: Regex::new(
                r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)\s*[<(]"
            ).unwrap(),

            arrow_regex: Regex::new(
                r"^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:function\b|(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*(?::[^=]+)?=>|\($)"
            ).unwrap(),

            class_regex: Regex::new(
                r"^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)(?:\s*<[^>]*>)?(?:\s+extends\s+([A-Za-z_$][\w$.]*))?(?:\s*<[^>]*>)?(?:\s+implements\s+([^{]+))?"
            ).unwrap(),

            type_regex: Regex::new(
                r"^\s*(?:export\s+)?(?:declare\s+)?(?:const\s+)?(interface|type|enum)\s+([A-Za-z_$][\w$]*)(?:\s*<[^>]*>)?(?:\s+extends\s+([^{]+))?"
            ).unwrap(),

            method_regex: Regex::new(
                r"^\s+(?:(?:public|private|protected|static|async|readonly|override|abstract|get|set)\s+)*\*?#?([A-Za-z_$][\w$]*)\s*(?:<[^>]*>)?\s*\("
            ).unwrap(),

            test_block_regex: Regex::new(
                r#"^\s*(?:it|test)(?:\.(?:only|skip))?\s*\(\s*['"`]([^'"`]+)['"`]"#
            ).unwrap(),

            describe_regex: Regex::new(r"^\s*describe(?:\.(?:only|skip))?\s*\(").unwrap(),
        }
    }

    /// Comma-separated type names, reduced to their base identifiers.
    fn split_bases(text: &str) -> Vec<String> {
        text.split(',')
            .filter_map(|part| {
                let name = part.trim().split('<').next().unwrap_or("").trim();
                let name = name.rsplit('.').next().unwrap_or(name);
                (!name.is_empty()).then(|| name.to_string())
            })
            .collect()
    }

    fn is_leading(line: &str) -> bool {
        line.starts_with("/**") || line.starts_with('*') || line.starts_with('@')
    }

    /// JSDoc text from the lines above an item, without comment markers.
    fn jsdoc(lines: &[&str], first: usize, item: usize) -> Option<String> {
        let text: Vec<String> = lines[first..item]
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.starts_with('@'))
            .map(|l| {
                l.trim_start_matches("/**")
                    .trim_end_matches("*/")
                    .trim_start_matches('*')
                    .trim()
                    .to_string()
            })
            .filter(|l| !l.is_empty())
            .collect();
        (!text.is_empty()).then(|| text.join("\n"))
    }

    fn push_unit(
        lines: &[&str],
        i: usize,
        end: usize,
        name: &str,
        kind: UnitKind,
        parent: Option<&str>,
        units: &mut Vec<CodeUnit>,
    ) -> usize {
        let first = leading_block_start(lines, i, Self::is_leading);
        let mut unit = CodeUnit::new(name, kind, first as u32 + 1, end as u32 + 1);
        unit.signature = signature_until(lines, i, end, '{');
        unit.docstring = Self::jsdoc(lines, first, i);
        unit.parent = parent.map(str::to_string);
        units.push(unit);
        units.len() - 1
    }

    fn scan(
        &self,
        lines: &[&str],
        from: usize,
        to: usize,
        class: Option<&str>,
        units: &mut Vec<CodeUnit>,
    ) {
        let mut i = from;
        while i <= to && i < lines.len() {
            let line = lines[i];
            let end = || brace_block_end(lines, i, Quotes::SingleIsString).min(to.max(i));

            if let Some(class_name) = class {
                if let Some(cap) = self.method_regex.captures(line) {
                    let name = &cap[1];
                    if !METHOD_KEYWORDS.contains(&name) && !line.trim_end().ends_with(';') {
                        let end = end();
                        Self::push_unit(lines, i, end, name, UnitKind::Function, Some(class_name), units);
                        i = end + 1;
                        continue;
                    }
                }
                i += 1;
                continue;
            }

            if let Some(cap) = self
                .function_regex
                .captures(line)
                .or_else(|| self.arrow_regex.captures(line))
            {
                let end = end();
                Self::push_unit(lines, i, end, &cap[1], UnitKind::Function, None, units);
                i = end + 1;
                continue;
            }

            if let Some(cap) = self.class_regex.captures(line) {
                let end = end();
                let name = cap[1].to_string();
                let idx = Self::push_unit(lines, i, end, &name, UnitKind::Class, None, units);
                let mut bases = Vec::new();
                if let Some(extends) = cap.get(2) {
                    bases.extend(Self::split_bases(extends.as_str()));
                }
                if let Some(implements) = cap.get(3) {
                    bases.extend(Self::split_bases(implements.as_str()));
                }
                units[idx].bases = bases;

                if end > i {
                    self.scan(lines, i + 1, end - 1, Some(&name), units);
                }
                i = end + 1;
                continue;
            }

            if let Some(cap) = self.type_regex.captures(line) {
                let end = end();
                let idx = Self::push_unit(lines, i, end, &cap[2], UnitKind::Class, None, units);
                if let Some(extends) = cap.get(3) {
                    units[idx].bases = Self::split_bases(extends.as_str());
                }
                i = end + 1;
                continue;
            }

            if let Some(cap) = self.test_block_regex.captures(line) {
                let end = end();
                let idx = Self::push_unit(lines, i, end, cap[1].trim(), UnitKind::Function, None, units);
                units[idx].is_test = true;
                i = end + 1;
                continue;
            }

            if self.describe_regex.is_match(line) {
                let end = end();
                if end > i {
                    self.scan(lines, i + 1, end - 1, None, units);
                }
                i = end + 1;
                continue;
            }

            i += 1;
        }
    }

    /// Check if an import path looks like a local file.
    fn is_local_import(path: &str) -> bool {
        path.starts_with("./") || path.starts_with("../")
    }

    /// Classify import path kind.
    fn classify_import(path: &str) -> ImportKind {
        if Self::is_local_import(path) {
            ImportKind::Relative
        } else if path.starts_with('/') {
            ImportKind::Absolute
        } else {
            // Bare specifier, scoped package or node built-in
            ImportKind::External
        }
    }

    /// Resolve a relative import path against the known files.
    fn resolve_relative_path(import_path: &str, from_file: &Path, known: &KnownFiles) -> Option<String> {
        let mut resolved = parent_dir(from_file);
        for part in import_path.split('/') {
            match part {
                "." | "" => {}
                ".." => {
                    resolved.pop();
                }
                segment => resolved.push(segment),
            }
        }

        // Try various extensions
        let extensions = ["", ".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs"];
        for ext in &extensions {
            let with_ext = PathBuf::from(format!("{}{}", resolved.display(), ext));
            if let Some(found) = lookup_known(known, &with_ext) {
                return Some(found);
            }
        }

        // Try as directory with index file
        let index_files = ["index.ts", "index.tsx", "index.js", "index.jsx"];
        index_files
            .iter()
            .find_map(|index| lookup_known(known, &resolved.join(index)))
    }
}

impl Default for TypeScriptDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundaryDetector for TypeScriptDetector {
    fn extensions(&self) -> &[&str] {
        &["ts", "tsx", "js", "jsx", "mjs", "cjs"]
    }

    fn language(&self) -> Language {
        Language::TypeScript
    }

    fn detect_units(&self, content: &str) -> Vec<CodeUnit> {
        let lines: Vec<&str> = content.lines().collect();
        if lines.is_empty() {
            return Vec::new();
        }
        let mut units = Vec::new();
        self.scan(&lines, 0, lines.len() - 1, None, &mut units);
        units
    }

    fn parse_imports(&self, content: &str) -> Vec<ImportRef> {
        let mut imports = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for regex in &self.import_regexes {
            for cap in regex.captures_iter(content) {
                if let Some(path_match) = cap.get(1) {
                    let path = path_match.as_str().to_string();
                    if seen.insert(path.clone()) {
                        let kind = Self::classify_import(&path);
                        let line = line_number(content, path_match.start());
                        imports.push(ImportRef::new(path, kind, line));
                    }
                }
            }
        }

        imports.sort_by_key(|i| i.line);
        imports
    }

    fn resolve_import(
        &self,
        import: &ImportRef,
        from_file: &Path,
        known: &KnownFiles,
    ) -> Option<String> {
        // Only resolve local imports
        if !Self::is_local_import(&import.raw_path) {
            return None;
        }
        Self::resolve_relative_path(&import.raw_path, from_file, known)
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
        let detector = TypeScriptDetector::new();
        let content = r#"import { x } from './x';

/**
 * Adds numbers.
 */
export function add(a: number, b: number): number {
  return a + b;
}

export const double = (n: number): number => {
  return add(n, n);
};

const inc = async (n) => n + 1;
"#;
        let units = detector.detect_units(content);
        let names: Vec<&str> = units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["add", "double", "inc"]);

        assert_eq!(units[0].start_line, 3);
        assert_eq!(units[0].end_line, 8);
        assert_eq!(units[0].docstring.as_deref(), Some("Adds numbers."));
        assert_eq!(
            units[0].signature,
            "export function add(a: number, b: number): number"
        );
        assert_eq!(units[1].end_line, 12);
        assert_eq!(units[2].start_line, 14);
        assert_eq!(units[2].end_line, 14);
    }

    #[test]
    fn test_detect_class_methods() {
        let detector = TypeScriptDetector::new();
        let content = r#"export class UserService extends BaseService implements Disposable, Loggable {
  private cache = new Map();

  constructor(private db: Db) {
    super();
  }

  async findUser(id: string): Promise<User> {
    if (this.cache.has(id)) {
      return this.cache.get(id);
    }
    return this.db.find(id);
  }
}

interface User extends Base<string> {
  id: string;
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
                ("UserService", None),
                ("constructor", Some("UserService")),
                ("findUser", Some("UserService")),
                ("User", None),
            ]
        );
        assert_eq!(
            units[0].bases,
            vec![
                "BaseService".to_string(),
                "Disposable".to_string(),
                "Loggable".to_string()
            ]
        );
        assert_eq!(units[0].end_line, 14);
        assert_eq!(units[2].start_line, 8);
        assert_eq!(units[2].end_line, 13);
        assert_eq!(units[3].bases, vec!["Base".to_string()]);
    }

    #[test]
    fn test_detect_test_blocks() {
        let detector = TypeScriptDetector::new();
        let content = r#"describe('math', () => {
  it('adds numbers', () => {
    expect(add(1, 2)).toBe(3);
  });

  test("doubles", () => {
    expect(double(2)).toBe(4);
  });
});
"#;
        let units = detector.detect_units(content);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].name, "adds numbers");
        assert!(units[0].is_test);
        assert_eq!(units[0].start_line, 2);
        assert_eq!(units[0].end_line, 4);
        assert_eq!(units[1].name, "doubles");
    }

    #[test]
    fn test_braces_in_strings_do_not_end_blocks() {
        let detector = TypeScriptDetector::new();
        let content = "function a() {\n  const s = '}';\n  const t = `${s}}`;\n  return s;\n}\nfunction b() {}\n";
        let units = detector.detect_units(content);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].end_line, 5);
        assert_eq!(units[1].start_line, 6);
    }

    #[test]
    fn test_parse_imports() {
        let detector = TypeScriptDetector::new();
        let content = r#"
import React from 'react';
import { useState, useEffect } from 'react';
import type { Config } from './config';
import './styles.css';
const fs = require('fs');
const lazy = import('./lazy');
export { helper } from '../utils/helper';
"#;
        let imports = detector.parse_imports(content);
        let paths: Vec<&str> = imports.iter().map(|i| i.raw_path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["react", "./config", "./styles.css", "fs", "./lazy", "../utils/helper"]
        );
        assert_eq!(imports[1].kind, ImportKind::Relative);
        assert_eq!(imports[0].kind, ImportKind::External);
    }

    #[test]
    fn test_resolve_relative_imports() {
        let detector = TypeScriptDetector::new();
        let files = known(&[
            "src/app/main.ts",
            "src/app/config.ts",
            "src/utils/index.ts",
            "src/styles.css",
        ]);

        let import = ImportRef::new("./config", ImportKind::Relative, 1);
        assert_eq!(
            detector.resolve_import(&import, Path::new("src/app/main.ts"), &files),
            Some("src/app/config.ts".to_string())
        );

        let import = ImportRef::new("../utils", ImportKind::Relative, 1);
        assert_eq!(
            detector.resolve_import(&import, Path::new("src/app/main.ts"), &files),
            Some("src/utils/index.ts".to_string())
        );

        let import = ImportRef::new("../styles.css", ImportKind::Relative, 1);
        assert_eq!(
            detector.resolve_import(&import, Path::new("src/app/main.ts"), &files),
            Some("src/styles.css".to_string())
        );

        let import = ImportRef::new("react", ImportKind::External, 1);
        assert_eq!(
            detector.resolve_import(&import, Path::new("src/app/main.ts"), &files),
            None
        );
    }
}
