// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Generic fallback detector.
//!
//! Uses line heuristics common to many languages. A unit starts at a
//! column-0 declaration keyword and runs until the next one.

use regex::Regex;
use std::path::Path;

use super::{
    line_number, lookup_known, parent_dir, BoundaryDetector, CodeUnit, ImportKind, ImportRef,
    KnownFiles, UnitKind,
};
use crate::model::Language;

/// Generic fallback detector using common patterns.
pub struct GenericDetector {
    function_regex: Regex,
    class_regex: Regex,
    /// Common import patterns across languages
    import_patterns: Vec<Regex>,
}

impl GenericDetector {
    /// Create a new generic detector.
    pub fn new() -> Self {
        Self {
            function_regex: Regex::new(
                r"^(?:(?:public|private|protected|static|export|async|pub)\s+)*(?:def|fn|func|function|sub|proc)\s+([A-Za-z_][\w!?]*)",
            )
            .unwrap(),
            class_regex: Regex::new(
                r"^(?:(?:public|abstract|final|export)\s+)*(?:class|struct|interface|module)\s+([A-Za-z_]\w*)",
            )
            .unwrap(),
            import_patterns: vec![
                // C/C++: #include "path"
                Regex::new(r#"(?m)^\s*#\s*include\s*"([^"]+)""#).unwrap(),
                // Ruby: require_relative "path"
                Regex::new(r#"(?m)^\s*require_relative\s+["']([^"']+)["']"#).unwrap(),
                // Shell: source ./path or . ./path
                Regex::new(r#"(?m)^\s*(?:source|\.)\s+["']?(\.{1,2}/[^"'\s]+)["']?"#).unwrap(),
            ],
        }
    }

    fn unit_start(&self, line: &str) -> Option<(String, UnitKind)> {
        if let Some(cap) = self.function_regex.captures(line) {
            return Some((cap[1].to_string(), UnitKind::Function));
        }
        self.class_regex
            .captures(line)
            .map(|cap| (cap[1].to_string(), UnitKind::Class))
    }
}

impl Default for GenericDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundaryDetector for GenericDetector {
    fn extensions(&self) -> &[&str] {
        // Handles everything as fallback
        &[]
    }

    fn language(&self) -> Language {
        Language::Unknown
    }

    fn detect_units(&self, content: &str) -> Vec<CodeUnit> {
        let lines: Vec<&str> = content.lines().collect();
        let starts: Vec<(usize, String, UnitKind)> = lines
            .iter()
            .enumerate()
            .filter_map(|(i, line)| self.unit_start(line).map(|(n, k)| (i, n, k)))
            .collect();

        let mut units = Vec::with_capacity(starts.len());
        for (idx, (start, name, kind)) in starts.iter().enumerate() {
            let limit = starts
                .get(idx + 1)
                .map(|(next, _, _)| *next)
                .unwrap_or(lines.len());
            let mut end = limit.saturating_sub(1).max(*start);
            while end > *start && lines[end].trim().is_empty() {
                end -= 1;
            }

            let mut unit = CodeUnit::new(name, *kind, *start as u32 + 1, end as u32 + 1);
            unit.signature = lines[*start].trim_end().trim_end_matches('{').trim_end().to_string();
            units.push(unit);
        }
        units
    }

    fn parse_imports(&self, content: &str) -> Vec<ImportRef> {
        let mut imports = Vec::new();
        for regex in &self.import_patterns {
            for cap in regex.captures_iter(content) {
                if let Some(m) = cap.get(1) {
                    let line = line_number(content, m.start());
                    imports.push(ImportRef::new(m.as_str(), ImportKind::Relative, line));
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
        let base = parent_dir(from_file).join(&import.raw_path);
        lookup_known(known, &base).or_else(|| {
            // require_relative omits the extension
            let ext = from_file.extension()?;
            lookup_known(known, &base.with_extension(ext))
        })
    }
}
