// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Retrieval requests and hint inference from task text.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::compress::CompressionLevel;
use crate::model::ChunkType;
use crate::storage::search::is_stop_word;

/// Caller-supplied steering for a retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hints {
    /// Symbol names to seed from.
    pub symbols: Vec<String>,
    /// Project-relative paths to seed from.
    pub paths: Vec<String>,
    pub include_tests: bool,
    /// Chunk types that are never included.
    pub exclude_types: Vec<ChunkType>,
    /// List the commits that touched included chunks.
    pub include_history: bool,
}

impl Default for Hints {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            paths: Vec::new(),
            include_tests: true,
            exclude_types: Vec::new(),
            include_history: false,
        }
    }
}

impl Hints {
    /// Whether candidates of this type are filtered out.
    pub fn filters(&self, chunk_type: ChunkType) -> bool {
        (chunk_type == ChunkType::Test && !self.include_tests)
            || self.exclude_types.contains(&chunk_type)
    }
}

/// One retrieval call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalRequest {
    pub task: String,
    pub hints: Hints,
    pub token_budget: usize,
    /// Finest level to try for each candidate.
    pub compression_default: CompressionLevel,
    /// Overrides the configured hop limit.
    pub hop_limit: Option<usize>,
}

impl RetrievalRequest {
    pub fn new(task: impl Into<String>, token_budget: usize) -> Self {
        Self {
            task: task.into(),
            hints: Hints::default(),
            token_budget,
            compression_default: CompressionLevel::Full,
            hop_limit: None,
        }
    }

    pub fn with_hints(mut self, hints: Hints) -> Self {
        self.hints = hints;
        self
    }

    pub fn with_level(mut self, level: CompressionLevel) -> Self {
        self.compression_default = level;
        self
    }

    pub fn with_hop_limit(mut self, hop_limit: usize) -> Self {
        self.hop_limit = Some(hop_limit);
        self
    }
}

/// Symbols and paths mentioned in a task description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InferredHints {
    pub symbols: BTreeSet<String>,
    pub paths: BTreeSet<String>,
}

/// Pulls likely symbols and file paths out of free text.
pub struct TaskParser {
    backtick_regex: Regex,
    path_regex: Regex,
    identifier_regex: Regex,
}

impl Default for TaskParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskParser {
    pub fn new() -> Self {
        Self {
            backtick_regex: Regex::new(r"`([^`]+)`").unwrap(),
            path_regex: Regex::new(
                r#"(?:^|[\s(\[,;:`'"])((?:[A-Za-z0-9_.-]+/)*[A-Za-z0-9_-][A-Za-z0-9_.-]*\.(?:py|pyi|ts|tsx|js|jsx|mjs|rs|go|java|rb|c|h|cc|cpp|hpp|cs|sh|sql|md|toml|ya?ml|json))\b"#,
            )
            .unwrap(),
            identifier_regex: Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap(),
        }
    }

    /// Infer hints from `task`.
    ///
    /// Backtick-quoted spans and path-like tokens with a known extension
    /// become paths. Other backtick-quoted names and identifiers shaped like
    /// code (PascalCase, camelCase, snake_case) become symbols. Plain words
    /// are left to full-text search, unless the whole task is one identifier.
    pub fn infer(&self, task: &str) -> InferredHints {
        let mut hints = InferredHints::default();
        let mut rest = task.to_string();

        for cap in self.backtick_regex.captures_iter(task) {
            let quoted = cap[1].trim();
            if quoted.contains('/') || self.path_regex.is_match(&format!(" {}", quoted)) {
                hints.paths.insert(quoted.trim_start_matches("./").to_string());
            } else if let Some(symbol) = quoted
                .trim_end_matches("()")
                .rsplit(['.', ':'])
                .next()
                .filter(|s| !s.is_empty())
            {
                hints.symbols.insert(symbol.to_string());
            }
        }

        for cap in self.path_regex.captures_iter(task) {
            let Some(m) = cap.get(1) else {
                continue;
            };
            hints
                .paths
                .insert(m.as_str().trim_start_matches("./").to_string());
            // Paths are ASCII, so blanking the span keeps later offsets valid.
            rest.replace_range(m.range(), &" ".repeat(m.len()));
        }

        let words: Vec<&str> = self
            .identifier_regex
            .find_iter(&rest)
            .map(|m| m.as_str())
            .filter(|w| !w.chars().all(|c| c.is_ascii_digit() || c == '_'))
            .filter(|w| !is_stop_word(&w.to_lowercase()))
            .collect();
        let single = words.len() == 1 && task.trim() == words[0];

        for word in words {
            if single || is_code_shaped(word) {
                hints.symbols.insert(word.to_string());
            }
        }

        hints
    }
}

/// Whether a word looks like an identifier rather than prose:
/// snake_case, camelCase or PascalCase with an inner capital.
fn is_code_shaped(word: &str) -> bool {
    if word.trim_matches('_').contains('_') {
        return true;
    }
    let inner_upper = word.chars().skip(1).any(|c| c.is_ascii_uppercase());
    let has_lower = word.chars().any(|c| c.is_ascii_lowercase());
    inner_upper && has_lower
}
