// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Language-specific boundary detectors.
//!
//! A detector finds the structural units (functions, methods, classes and
//! tests) inside a source file and the import statements that link files
//! together. Detection is regex and line based: it is fast and forgiving,
//! not a full parser. Each detector implements the `BoundaryDetector` trait.
//!
//! # Supported Languages
//!
//! - **Rust**: `fn`, `struct`/`enum`/`trait`/`type`, `impl` blocks, `mod`, `use`
//! - **TypeScript/JavaScript**: functions, arrow functions, classes, interfaces,
//!   `it`/`test` blocks, ES module and CommonJS imports
//! - **Python**: `def`, `class`, decorators, docstrings, relative imports
//! - **Go**: `func`, methods with receivers, `type`, `import`
//! - **Generic**: line-heuristic fallback for everything else
//!
//! # Adding a New Language
//!
//! 1. Create a new file in `src/chunker/languages/` (e.g., `ruby.rs`)
//! 2. Implement the `BoundaryDetector` trait
//! 3. Register in `DetectorRegistry::new()`

pub mod generic;
pub mod go;
pub mod python;
pub mod rust;
pub mod typescript;

use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::path::{Component, Path, PathBuf};

use crate::model::Language;

/// A reference to an imported module/file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportRef {
    /// The raw import path as written in source (e.g., "crate::utils::helpers")
    pub raw_path: String,
    /// Import kind for resolution hints
    pub kind: ImportKind,
    /// Line number where import appears (1-indexed)
    pub line: u32,
}

impl ImportRef {
    /// Create a new import reference.
    pub fn new(raw_path: impl Into<String>, kind: ImportKind, line: u32) -> Self {
        Self {
            raw_path: raw_path.into(),
            kind,
            line,
        }
    }
}

/// Kind of import for resolution hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportKind {
    /// Relative to crate root (Rust: `crate::`)
    CrateRoot,
    /// Relative to parent module (Rust: `super::`)
    Parent,
    /// Relative to current module (Rust: `self::`, `mod x;`)
    Current,
    /// External dependency (Rust: external crate, JS: npm package)
    External,
    /// Relative path (JS: `./foo`, Python: `.foo`)
    Relative,
    /// Absolute/unknown
    Absolute,
}

/// Structural role of a detected unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    /// Function, method or test body
    Function,
    /// Class, struct, enum, trait, interface or type alias
    Class,
}

/// A function or class found inside a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeUnit {
    pub name: String,
    pub kind: UnitKind,
    /// First line of the unit, including leading docs/attributes (1-indexed)
    pub start_line: u32,
    /// Last line of the unit (1-indexed, inclusive)
    pub end_line: u32,
    /// Declaration text up to the body opener
    pub signature: String,
    /// Attached documentation, without comment markers
    pub docstring: Option<String>,
    /// Enclosing class/impl/receiver type for methods
    pub parent: Option<String>,
    /// Base classes or implemented traits/interfaces
    pub bases: Vec<String>,
    /// Marked or named as a test
    pub is_test: bool,
}

impl CodeUnit {
    /// Create a unit spanning `start_line..=end_line`.
    pub fn new(name: impl Into<String>, kind: UnitKind, start_line: u32, end_line: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            start_line,
            end_line,
            signature: String::new(),
            docstring: None,
            parent: None,
            bases: Vec::new(),
            is_test: false,
        }
    }
}

/// Project-relative file paths known to the current build.
pub type KnownFiles = BTreeSet<String>;

/// Trait for language-specific boundary and import detection.
///
/// Implementations should be stateless and thread-safe.
pub trait BoundaryDetector: Send + Sync {
    /// File extensions this detector handles.
    fn extensions(&self) -> &[&str];

    /// Language reported in chunk metadata.
    fn language(&self) -> Language;

    /// Find functions, methods, classes and tests in source content.
    fn detect_units(&self, content: &str) -> Vec<CodeUnit>;

    /// Parse import statements from source content.
    fn parse_imports(&self, content: &str) -> Vec<ImportRef>;

    /// Resolve an import to a known project-relative file path.
    ///
    /// # Arguments
    /// * `import` - The import reference to resolve
    /// * `from_file` - The file containing the import (relative to project root)
    /// * `known` - Every file path in the current chunk set
    ///
    /// # Returns
    /// The matching known path, or None if unresolvable
    fn resolve_import(
        &self,
        import: &ImportRef,
        from_file: &Path,
        known: &KnownFiles,
    ) -> Option<String>;

    /// Names invoked inside a unit body.
    fn extract_calls(&self, body: &str) -> Vec<String> {
        extract_calls(body)
    }
}

/// Registry of boundary detectors.
pub struct DetectorRegistry {
    detectors: Vec<Box<dyn BoundaryDetector>>,
}

impl DetectorRegistry {
    /// Create a new registry with all built-in detectors.
    pub fn new() -> Self {
        Self {
            detectors: vec![
                Box::new(rust::RustDetector::new()),
                Box::new(typescript::TypeScriptDetector::new()),
                Box::new(python::PythonDetector::new()),
                Box::new(go::GoDetector::new()),
                Box::new(generic::GenericDetector::new()),
            ],
        }
    }

    /// Get a detector for a file extension.
    pub fn detector_for_extension(&self, ext: &str) -> &dyn BoundaryDetector {
        let ext_lower = ext.to_lowercase();
        for detector in &self.detectors {
            if detector.extensions().iter().any(|e| *e == ext_lower) {
                return detector.as_ref();
            }
        }
        self.fallback()
    }

    /// Get a detector for a file path.
    pub fn detector_for_path(&self, path: &str) -> &dyn BoundaryDetector {
        match Path::new(path).extension().and_then(|e| e.to_str()) {
            Some(ext) => self.detector_for_extension(ext),
            None => self.fallback(),
        }
    }

    /// Parse imports from a file.
    pub fn parse_imports(&self, path: &str, content: &str) -> Vec<ImportRef> {
        self.detector_for_path(path).parse_imports(content)
    }

    fn fallback(&self) -> &dyn BoundaryDetector {
        // The generic detector is registered last and handles any extension.
        self.detectors[self.detectors.len() - 1].as_ref()
    }
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Get line number for a byte offset in content.
pub(crate) fn line_number(content: &str, byte_offset: usize) -> u32 {
    content[..byte_offset].matches('\n').count() as u32 + 1
}

/// Leading whitespace width of a line (tabs count as 4).
pub(crate) fn indent_of(line: &str) -> usize {
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width += 4,
            _ => break,
        }
    }
    width
}

/// Quote handling for [`brace_block_end`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Quotes {
    /// `'` opens a string (JavaScript, Python)
    SingleIsString,
    /// `'` opens a char literal or a lifetime (Rust, Go)
    SingleIsChar,
}

/// Index of the line closing the brace block that starts at `start`.
///
/// A declaration that reaches a `;` before any `{` ends on that line. A
/// declaration that never opens a brace ends where the next top-level line
/// begins. An unterminated block runs to the end of the file.
pub(crate) fn brace_block_end(lines: &[&str], start: usize, quotes: Quotes) -> usize {
    let mut depth: i32 = 0;
    let mut opened = false;
    let mut in_block_comment = false;
    let mut in_backtick = false;

    for (i, line) in lines.iter().enumerate().skip(start) {
        if i > start && !opened && !in_block_comment && !in_backtick {
            let trimmed = line.trim_start();
            let prev = lines[i - 1].trim_end();
            let continues = prev.ends_with(['(', ',', '=', '>', '|', '&', ':'])
                || trimmed.starts_with('{')
                || trimmed.starts_with("where");
            if trimmed.is_empty() || (indent_of(line) == 0 && !continues) {
                return i - 1;
            }
        }

        let chars: Vec<char> = line.chars().collect();
        let mut j = 0;
        while j < chars.len() {
            let c = chars[j];
            let next = chars.get(j + 1).copied();

            if in_block_comment {
                if c == '*' && next == Some('/') {
                    in_block_comment = false;
                    j += 1;
                }
                j += 1;
                continue;
            }
            if in_backtick {
                if c == '\\' {
                    j += 1;
                } else if c == '`' {
                    in_backtick = false;
                }
                j += 1;
                continue;
            }

            match c {
                '/' if next == Some('/') => break,
                '/' if next == Some('*') => {
                    in_block_comment = true;
                    j += 1;
                }
                '`' => in_backtick = true,
                '"' => j = skip_string(&chars, j, '"'),
                '\'' if quotes == Quotes::SingleIsString => j = skip_string(&chars, j, '\''),
                '\'' => {
                    // 'x' or '\n' is a char literal; anything else is a lifetime.
                    if chars.get(j + 2) == Some(&'\'') {
                        j += 2;
                    } else if next == Some('\\') {
                        if let Some(offset) =
                            chars.get(j + 3..).and_then(|rest| rest.iter().position(|ch| *ch == '\''))
                        {
                            j += offset + 3;
                        }
                    }
                }
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' => {
                    depth -= 1;
                    if opened && depth <= 0 {
                        return i;
                    }
                }
                ';' if !opened && depth == 0 => return i,
                _ => {}
            }
            j += 1;
        }
    }

    lines.len().saturating_sub(1)
}

/// Index of the closing quote of a string starting at `start`, or the line end.
fn skip_string(chars: &[char], start: usize, quote: char) -> usize {
    let mut j = start + 1;
    while j < chars.len() {
        if chars[j] == '\\' {
            j += 2;
            continue;
        }
        if chars[j] == quote {
            return j;
        }
        j += 1;
    }
    chars.len()
}

/// Index of the last line of an indentation block started at `start`.
///
/// Trailing blank lines are not part of the block.
pub(crate) fn indent_block_end(lines: &[&str], start: usize, base_indent: usize) -> usize {
    let mut end = start;
    for (i, line) in lines.iter().enumerate().skip(start + 1) {
        if line.trim().is_empty() {
            continue;
        }
        if indent_of(line) <= base_indent {
            break;
        }
        end = i;
    }
    end
}

/// Declaration text from `start` up to the body opener.
pub(crate) fn signature_until(lines: &[&str], start: usize, end: usize, opener: char) -> String {
    let mut parts = Vec::new();
    for line in lines.iter().take(end + 1).skip(start) {
        if let Some(pos) = line.find(opener) {
            let head = line[..pos].trim_end();
            if !head.trim().is_empty() {
                parts.push(head.to_string());
            }
            break;
        }
        parts.push(line.trim_end().to_string());
        if line.trim_end().ends_with(';') {
            break;
        }
    }
    parts.join("\n").trim().to_string()
}

/// Line index of the first line in a run of doc comments/attributes/decorators
/// directly above `start`.
pub(crate) fn leading_block_start(lines: &[&str], start: usize, is_prefix: impl Fn(&str) -> bool) -> usize {
    let mut first = start;
    while first > 0 {
        let above = lines[first - 1].trim();
        if !above.is_empty() && is_prefix(above) {
            first -= 1;
        } else {
            break;
        }
    }
    first
}

/// Normalize a relative path (resolving `.` and `..`) and look it up.
pub(crate) fn lookup_known(known: &KnownFiles, path: &Path) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::Normal(part) => parts.push(part.to_string_lossy().to_string()),
            Component::RootDir | Component::Prefix(_) => {}
        }
    }
    let joined = parts.join("/");
    known.contains(&joined).then_some(joined)
}

/// Parent directory of a project-relative path, as a `PathBuf`.
pub(crate) fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

const CALL_KEYWORDS: &[&str] = &[
    "if", "for", "while", "match", "return", "fn", "def", "func", "function", "switch", "catch",
    "sizeof", "typeof", "await", "yield", "print", "assert", "elif", "with", "loop", "new",
    "super", "self", "Some", "Ok", "Err", "None", "Box", "Vec", "String", "len", "int", "str",
    "range", "isinstance", "lambda", "not", "and", "or", "in", "is", "as", "use", "impl", "where",
    "class", "struct", "enum", "type", "interface", "describe", "it", "test", "expect",
];

/// Identifiers followed by `(` in a body, deduplicated and sorted.
pub(crate) fn extract_calls(body: &str) -> Vec<String> {
    let call_regex = call_regex();
    let keywords: HashSet<&str> = CALL_KEYWORDS.iter().copied().collect();
    let mut calls = BTreeSet::new();

    for line in body.lines() {
        let code = line.trim_start();
        if code.starts_with("//") || code.starts_with('#') || code.starts_with('*') {
            continue;
        }
        for cap in call_regex.captures_iter(line) {
            if let Some(name) = cap.get(1) {
                let name = name.as_str();
                if !keywords.contains(name) && !name.chars().all(|c| c.is_ascii_digit()) {
                    calls.insert(name.to_string());
                }
            }
        }
    }

    calls.into_iter().collect()
}

fn call_regex() -> &'static Regex {
    static CALL: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    CALL.get_or_init(|| Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap())
}
