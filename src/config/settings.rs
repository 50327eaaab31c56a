// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings for the context engine
//!
//! Loaded from `<project>/.ted/context.toml`, falling back to
//! `~/.ted/context.toml`, then to built-in defaults. Every section is
//! optional in the file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod io;
mod validation;

/// Main settings structure for one project.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ContextConfig {
    /// Chunking and file selection
    #[serde(default)]
    pub chunker: ChunkerConfig,

    /// Ranking, expansion and budgeting
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Index database location
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Chunker settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Directory names whose immediate child names a feature
    /// (e.g. `features/<name>/...`).
    pub feature_roots: Vec<String>,

    /// Extra glob patterns to ignore, relative to the project root.
    pub ignore_patterns: Vec<String>,

    /// Files larger than this are skipped.
    pub max_file_bytes: u64,

    /// Whether to turn git history into commit chunks.
    pub include_history: bool,

    /// Newest commits to read when `include_history` is on.
    pub max_commits: usize,

    /// Lines kept when a compressed view has no signature to fall back on.
    pub fallback_lines: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            feature_roots: vec![
                "features".to_string(),
                "modules".to_string(),
                "packages".to_string(),
            ],
            ignore_patterns: Vec::new(),
            max_file_bytes: 1024 * 1024,
            include_history: true,
            max_commits: 200,
            fallback_lines: 10,
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Token budget used when a caller does not supply one.
    pub default_budget: usize,

    /// Compression level (0 = full, 3 = signature only) used when a caller
    /// does not supply one.
    pub default_level: u8,

    /// Maximum graph hops from a seed chunk.
    pub hop_limit: usize,

    /// Full-text hits taken as seeds.
    pub fts_limit: usize,

    /// Seed score for explicit symbol/path hints.
    pub hint_score: f64,

    /// Seed score for symbols and paths inferred from the task text.
    pub inferred_score: f64,

    /// Chunks seeded per inferred symbol, highest type priority first.
    pub inferred_per_symbol: usize,

    /// Multiplier for candidates reached over an incoming edge.
    pub incoming_factor: f64,

    /// Score multiplier per hop; hop `n` uses entry `n - 1`.
    pub hop_decay: Vec<f64>,

    /// Multiplier for hops beyond `hop_decay`.
    pub decay_floor: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_budget: 8000,
            default_level: 0,
            hop_limit: 2,
            fts_limit: 50,
            hint_score: 10.0,
            inferred_score: 5.0,
            inferred_per_symbol: 3,
            incoming_factor: 0.5,
            hop_decay: vec![0.9, 0.7, 0.5],
            decay_floor: 0.3,
        }
    }
}

impl RetrievalConfig {
    /// Decay multiplier for a candidate `hop` steps from its seed.
    pub fn decay(&self, hop: usize) -> f64 {
        if hop == 0 {
            return 1.0;
        }
        self.hop_decay
            .get(hop - 1)
            .copied()
            .unwrap_or(self.decay_floor)
    }
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Database path; relative paths resolve against the project root.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".ted").join("context.db"),
        }
    }
}
