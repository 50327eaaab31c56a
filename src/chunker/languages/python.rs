// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Python boundary detector.
//!
//! Finds:
//! - top-level `def` and `class` blocks, with decorators
//! - methods one level inside a class
//! - docstrings directly under the declaration
//! - `import` and `from ... import` statements, including relative ones

use regex::Regex;
use std::path::{Path, PathBuf};

use super::{
    indent_block_end, indent_of, leading_block_start, line_number, lookup_known, parent_dir,
    BoundaryDetector, CodeUnit, ImportKind, ImportRef, KnownFiles, UnitKind,
};
use crate::model::Language;

/// Detector for Python source files.
pub struct PythonDetector {
    /// Regex for simple imports: import x, y, z
    import_regex: Regex,
    /// Regex for from imports: from x import y
    from_import_regex: Regex,
    /// Regex for relative from imports: from . import y or from ..x import y
    from_relative_regex: Regex,
    /// Regex for function definitions: def name(
    def_regex: Regex,
    /// Regex for class definitions: class Name(Base):
    class_regex: Regex,
}

impl PythonDetector {
    /// Create a new Python detector.
    pub fn new() -> Self {
        Self {
            // Match: import foo, bar, baz
            import_regex: Regex::new(
                r"(?m)^\s*import\s+([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)*)(?:\s*,\s*([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)*))*"
            ).unwrap(),

            // Match: from foo.bar import x, y, z
            from_import_regex: Regex::new(
                r"(?m)^\s*from\s+([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)*)\s+import\s+"
            ).unwrap(),

            // Match: from . import x or from ..foo import y or from .foo import z
            from_relative_regex: Regex::new(
                r"(?m)^\s*from\s+(\.+)([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)*)?\s+import\s+([a-zA-Z_][a-zA-Z0-9_]*)?"
            ).unwrap(),

            // Match: async def function_name(
            def_regex: Regex::new(
                r"^(\s*)(?:async\s+)?def\s+([a-zA-Z_][a-zA-Z0-9_]*)\s*\("
            ).unwrap(),

            // Match: class ClassName(Base, Mixin):
            class_regex: Regex::new(
                r"^(\s*)class\s+([a-zA-Z_][a-zA-Z0-9_]*)\s*(?:\(([^)]*)\))?\s*:"
            ).unwrap(),
        }
    }

    /// Index of the line ending the declaration (the one ending in `:`).
    fn header_end(lines: &[&str], start: usize, end: usize) -> usize {
        let mut depth: i32 = 0;
        for (i, line) in lines.iter().enumerate().take(end + 1).skip(start) {
            for c in line.chars() {
                match c {
                    '(' | '[' => depth += 1,
                    ')' | ']' => depth -= 1,
                    _ => {}
                }
            }
            let code = line.split('#').next().unwrap_or(line).trim_end();
            if depth <= 0 && code.ends_with(':') {
                return i;
            }
        }
        start
    }

    /// Docstring starting on the first body line, if any.
    fn docstring(lines: &[&str], body_start: usize, end: usize) -> Option<String> {
        let first = lines.get(body_start)?.trim();
        let quote = ["\"\"\"", "'''"].into_iter().find(|q| first.starts_with(*q))?;

        let after = &first[3..];
        if let Some(close) = after.find(quote) {
            return Some(after[..close].trim().to_string());
        }

        let mut parts = vec![after.trim().to_string()];
        for line in lines.iter().take(end + 1).skip(body_start + 1) {
            if let Some(close) = line.find(quote) {
                parts.push(line[..close].trim().to_string());
                break;
            }
            parts.push(line.trim().to_string());
        }
        let text = parts.join("\n").trim().to_string();
        (!text.is_empty()).then_some(text)
    }

    fn build_unit(
        lines: &[&str],
        i: usize,
        name: &str,
        kind: UnitKind,
        indent: usize,
    ) -> CodeUnit {
        let header = Self::header_end(lines, i, lines.len() - 1);
        let end = indent_block_end(lines, header, indent);
        let first = leading_block_start(lines, i, |l| l.starts_with('@'));

        let mut unit = CodeUnit::new(name, kind, first as u32 + 1, end as u32 + 1);
        unit.signature = lines[i..=header]
            .iter()
            .map(|l| l.trim_end())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();
        if header < end {
            unit.docstring = Self::docstring(lines, header + 1, end);
        }
        unit.is_test = kind == UnitKind::Function && name.starts_with("test");
        unit
    }

    fn scan(&self, lines: &[&str], from: usize, to: usize, parent: Option<&str>, units: &mut Vec<CodeUnit>) {
        let mut i = from;
        // Only units at the shallowest indentation of this range are collected.
        let mut level: Option<usize> = None;

        while i <= to && i < lines.len() {
            let line = lines[i];

            if let Some(cap) = self.def_regex.captures(line) {
                let indent = indent_of(&cap[1]);
                if level.map_or(true, |l| indent <= l) {
                    level = Some(indent);
                    let mut unit = Self::build_unit(lines, i, &cap[2], UnitKind::Function, indent);
                    unit.parent = parent.map(str::to_string);
                    let end = unit.end_line as usize - 1;
                    units.push(unit);
                    i = end + 1;
                    continue;
                }
            } else if let Some(cap) = self.class_regex.captures(line) {
                let indent = indent_of(&cap[1]);
                if level.map_or(true, |l| indent <= l) {
                    level = Some(indent);
                    let name = cap[2].to_string();
                    let mut unit = Self::build_unit(lines, i, &name, UnitKind::Class, indent);
                    unit.parent = parent.map(str::to_string);
                    unit.bases = cap
                        .get(3)
                        .map(|m| {
                            m.as_str()
                                .split(',')
                                .map(str::trim)
                                .filter(|b| !b.is_empty() && !b.contains('='))
                                .map(|b| b.rsplit('.').next().unwrap_or(b).to_string())
                                .collect()
                        })
                        .unwrap_or_default();
                    let end = unit.end_line as usize - 1;
                    units.push(unit);

                    if parent.is_none() && end > i {
                        self.scan(lines, i + 1, end, Some(&name), units);
                    }
                    i = end + 1;
                    continue;
                }
            }

            i += 1;
        }
    }

    /// Try `<module>.py`, then `<module>/__init__.py`.
    fn lookup_module(known: &KnownFiles, module_path: &Path) -> Option<String> {
        let py_file = PathBuf::from(format!("{}.py", module_path.display()));
        lookup_known(known, &py_file).or_else(|| lookup_known(known, &module_path.join("__init__.py")))
    }
}

impl Default for PythonDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundaryDetector for PythonDetector {
    fn extensions(&self) -> &[&str] {
        &["py", "pyi"]
    }

    fn language(&self) -> Language {
        Language::Python
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

        // Parse simple imports: import foo, bar
        for cap in self.import_regex.captures_iter(content) {
            let Some(full_match) = cap.get(0) else { continue };
            let line = line_number(content, full_match.start());

            let import_str = full_match.as_str();
            if let Some(start) = import_str.find("import") {
                let modules_str = &import_str[start + 6..];
                for module in modules_str.split(',') {
                    let module = module.trim();
                    // Handle 'as' aliases: import foo as f
                    let module = module.split_whitespace().next().unwrap_or(module);
                    if !module.is_empty() && seen.insert(module.to_string()) {
                        imports.push(ImportRef::new(module, ImportKind::External, line));
                    }
                }
            }
        }

        // Parse from imports: from foo import bar
        for cap in self.from_import_regex.captures_iter(content) {
            if let Some(module_match) = cap.get(1) {
                let module = module_match.as_str();
                if seen.insert(module.to_string()) {
                    let line = line_number(content, module_match.start());
                    imports.push(ImportRef::new(module, ImportKind::External, line));
                }
            }
        }

        // Parse relative imports: from . import x or from ..foo import y
        for cap in self.from_relative_regex.captures_iter(content) {
            let Some(dots_match) = cap.get(1) else { continue };
            let line = line_number(content, dots_match.start());

            let dots = dots_match.as_str();
            // `from . import name` refers to the sibling module `name`.
            let module = match cap.get(2) {
                Some(m) => m.as_str(),
                None => cap.get(3).map(|m| m.as_str()).unwrap_or(""),
            };
            let full_path = format!("{}{}", dots, module);

            if seen.insert(full_path.clone()) {
                imports.push(ImportRef::new(full_path, ImportKind::Relative, line));
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
        let path = &import.raw_path;

        // Handle relative imports
        if path.starts_with('.') {
            let mut resolved = parent_dir(from_file);

            // Go up directories for each dot beyond the first
            let dot_count = path.chars().take_while(|c| *c == '.').count();
            for _ in 1..dot_count {
                resolved.pop();
            }

            let module_part = path.trim_start_matches('.');
            if module_part.is_empty() {
                return lookup_known(known, &resolved.join("__init__.py"));
            }
            for part in module_part.split('.') {
                resolved.push(part);
            }

            return Self::lookup_module(known, &resolved);
        }

        // Absolute imports: from the project root, then from a src/ layout
        let module_path = PathBuf::from(path.replace('.', "/"));
        Self::lookup_module(known, &module_path)
            .or_else(|| Self::lookup_module(known, &Path::new("src").join(&module_path)))
    }
}
