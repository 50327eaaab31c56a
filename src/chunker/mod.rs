// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Artifact chunking.
//!
//! Turns project files into immutable [`Chunk`]s:
//!
//! - source files become one whole-file chunk plus one chunk per function,
//!   class, method and test found by the language's boundary detector
//! - contracts, configs and manifests become a single chunk each
//! - commit history becomes one chunk per commit (see [`history`])
//!
//! Chunking a single artifact is a pure function of its bytes. Walking and
//! reading the project happen in parallel with `rayon`, and results are
//! sorted by path before they leave this module.

pub mod classify;
pub mod history;
pub mod languages;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use crate::config::ChunkerConfig;
use crate::error::{ContextError, Result};
use crate::model::{sha256_hex, Chunk, ChunkMetadata, ChunkType, Language};
use languages::{CodeUnit, DetectorRegistry, UnitKind};

/// What an artifact is, which decides how it is chunked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Source,
    Contract,
    Config,
    Metadata,
    History,
}

/// Raw input to the chunker.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub kind: ArtifactKind,
    /// Project-relative path with `/` separators.
    pub path: String,
    pub content: Vec<u8>,
}

impl Artifact {
    pub fn new(kind: ArtifactKind, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Why an artifact produced no chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Binary extension or NUL bytes in the content.
    Binary,
    /// Content is not valid UTF-8.
    NotUtf8,
    /// Larger than `max_file_bytes`.
    TooLarge,
    /// The file could not be read.
    Unreadable(String),
    /// Matched a configured ignore pattern.
    Ignored,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Binary => write!(f, "binary"),
            SkipReason::NotUtf8 => write!(f, "not utf-8"),
            SkipReason::TooLarge => write!(f, "too large"),
            SkipReason::Unreadable(e) => write!(f, "unreadable: {}", e),
            SkipReason::Ignored => write!(f, "ignored"),
        }
    }
}

/// Chunks produced from one file.
#[derive(Debug, Clone)]
pub struct FileChunks {
    pub path: String,
    /// Hex SHA-256 of the file bytes.
    pub content_hash: String,
    pub chunks: Vec<Chunk>,
}

/// Result of chunking a project.
#[derive(Debug, Clone, Default)]
pub struct ChunkRun {
    /// Files that were (re-)chunked, sorted by path.
    pub files: Vec<FileChunks>,
    /// Files whose content hash matched the previous build.
    pub unchanged: Vec<String>,
    /// Files that were found but produced nothing.
    pub skipped: Vec<(String, SkipReason)>,
    /// Content hash of every readable file seen.
    pub hashes: BTreeMap<String, String>,
    /// Commit chunks, newest first.
    pub history: Vec<Chunk>,
}

impl ChunkRun {
    /// Every chunk in the run (files first, then history).
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.files
            .iter()
            .flat_map(|f| f.chunks.iter())
            .chain(self.history.iter())
    }
}

/// Files discovered by a project walk.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub files: Vec<(String, ArtifactKind)>,
    pub skipped: Vec<(String, SkipReason)>,
}

/// Splits project artifacts into chunks.
pub struct Chunker {
    config: ChunkerConfig,
    registry: DetectorRegistry,
    ignore: Vec<glob::Pattern>,
}

impl Chunker {
    /// Create a chunker; fails if an ignore pattern is not a valid glob.
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        let ignore = config
            .ignore_patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p)
                    .map_err(|e| ContextError::Config(format!("Invalid ignore pattern '{}': {}", p, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            config,
            registry: DetectorRegistry::new(),
            ignore,
        })
    }

    /// The chunker's configuration.
    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Detector registry shared with the graph builder.
    pub fn registry(&self) -> &DetectorRegistry {
        &self.registry
    }

    fn is_ignored(&self, relative: &str) -> bool {
        let name = relative.rsplit('/').next().unwrap_or(relative);
        self.ignore
            .iter()
            .any(|p| p.matches(relative) || p.matches(name))
    }

    /// Walk the project and classify every file.
    ///
    /// Only a missing or unreadable root is an error. Anything below it that
    /// cannot be walked is recorded as skipped.
    pub fn discover(&self, root: &Path) -> Result<Discovery> {
        if !root.is_dir() {
            return Err(ContextError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Project root is not a directory: {}", root.display()),
            )));
        }

        let walker = walkdir::WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.depth() == 0 || !e.file_type().is_dir() {
                    return true;
                }
                let name = e.file_name().to_string_lossy();
                !classify::is_skipped_dir(&name) && !self.is_ignored(&relative_path(root, e.path()))
            });
        Ok(self.classify_entries(root, walker))
    }

    fn classify_entries(
        &self,
        root: &Path,
        entries: impl IntoIterator<Item = walkdir::Result<walkdir::DirEntry>>,
    ) -> Discovery {
        let mut discovery = Discovery::default();

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let relative = e
                        .path()
                        .map(|p| relative_path(root, p))
                        .filter(|p| !p.is_empty())
                        .unwrap_or_else(|| ".".to_string());
                    tracing::warn!("Skipping {}: {}", relative, e);
                    discovery
                        .skipped
                        .push((relative, SkipReason::Unreadable(e.to_string())));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = relative_path(root, entry.path());
            if self.is_ignored(&relative) {
                discovery.skipped.push((relative, SkipReason::Ignored));
            } else if classify::is_binary_path(&relative) {
                discovery.skipped.push((relative, SkipReason::Binary));
            } else if let Some(kind) = classify::classify_path(&relative) {
                discovery.files.push((relative, kind));
            }
        }

        discovery.files.sort();
        discovery.skipped.sort_by(|a, b| a.0.cmp(&b.0));
        discovery
    }

    /// Read one file, enforcing the size limit before loading it.
    pub fn load(&self, root: &Path, relative: &str, kind: ArtifactKind) -> std::result::Result<Artifact, SkipReason> {
        let full = root.join(relative);
        let meta = std::fs::metadata(&full).map_err(|e| SkipReason::Unreadable(e.to_string()))?;
        if meta.len() > self.config.max_file_bytes {
            return Err(SkipReason::TooLarge);
        }
        let bytes = std::fs::read(&full).map_err(|e| SkipReason::Unreadable(e.to_string()))?;
        Ok(Artifact::new(kind, relative, bytes))
    }

    /// Chunk every project file whose hash differs from `previous`.
    ///
    /// Pass an empty map for a full build.
    pub fn chunk_project(&self, root: &Path, previous: &HashMap<String, String>) -> Result<ChunkRun> {
        let discovery = self.discover(root)?;
        tracing::debug!("Discovered {} files under {}", discovery.files.len(), root.display());

        enum Outcome {
            Chunked(FileChunks),
            Unchanged(String, String),
            Skipped(String, SkipReason),
        }

        let outcomes: Vec<Outcome> = discovery
            .files
            .par_iter()
            .map(|(path, kind)| {
                let artifact = match self.load(root, path, *kind) {
                    Ok(a) => a,
                    Err(reason) => return Outcome::Skipped(path.clone(), reason),
                };
                let hash = sha256_hex(&artifact.content);
                if previous.get(path) == Some(&hash) {
                    return Outcome::Unchanged(path.clone(), hash);
                }
                match self.chunk_artifact(&artifact) {
                    Ok(chunks) => Outcome::Chunked(FileChunks {
                        path: path.clone(),
                        content_hash: hash,
                        chunks,
                    }),
                    Err(reason) => Outcome::Skipped(path.clone(), reason),
                }
            })
            .collect();

        let mut run = ChunkRun {
            skipped: discovery.skipped,
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                Outcome::Chunked(file) => {
                    run.hashes.insert(file.path.clone(), file.content_hash.clone());
                    run.files.push(file);
                }
                Outcome::Unchanged(path, hash) => {
                    run.hashes.insert(path.clone(), hash);
                    run.unchanged.push(path);
                }
                Outcome::Skipped(path, reason) => {
                    tracing::warn!("Skipping {}: {}", path, reason);
                    run.skipped.push((path, reason));
                }
            }
        }
        run.files.sort_by(|a, b| a.path.cmp(&b.path));
        run.unchanged.sort();
        run.skipped.sort_by(|a, b| a.0.cmp(&b.0));

        if self.config.include_history {
            run.history = match history::read_history(root, self.config.max_commits) {
                Ok(chunks) => chunks,
                Err(e) => {
                    tracing::warn!("Failed to read commit history: {}", e);
                    Vec::new()
                }
            };
        }

        Ok(run)
    }

    /// Chunk a single artifact. Pure: the same artifact always yields equal chunks.
    pub fn chunk_artifact(&self, artifact: &Artifact) -> std::result::Result<Vec<Chunk>, SkipReason> {
        if artifact.content.len() as u64 > self.config.max_file_bytes {
            return Err(SkipReason::TooLarge);
        }
        if artifact.content.contains(&0) {
            return Err(SkipReason::Binary);
        }
        let text = std::str::from_utf8(&artifact.content).map_err(|_| SkipReason::NotUtf8)?;
        let path = artifact.path.as_str();
        let feature = classify::infer_feature(path, &self.config.feature_roots);

        let chunks = match artifact.kind {
            ArtifactKind::Source => self.chunk_source(path, text, feature),
            ArtifactKind::Contract => vec![contract_chunk(path, text, feature)],
            ArtifactKind::Config => vec![single_chunk(ChunkType::Config, path, text, feature)],
            ArtifactKind::Metadata => vec![single_chunk(ChunkType::Metadata, path, text, feature)],
            ArtifactKind::History => {
                let name = path.rsplit('/').next().unwrap_or(path);
                vec![Chunk::new(
                    ChunkType::Commit,
                    path,
                    text,
                    None,
                    ChunkMetadata::named(name),
                )]
            }
        };

        tracing::debug!("Chunked {} into {} chunks", path, chunks.len());
        Ok(chunks)
    }

    fn chunk_source(&self, path: &str, text: &str, feature: Option<String>) -> Vec<Chunk> {
        let language = Language::from_path(path);
        let test_file = classify::is_test_path(path);

        let file_meta = ChunkMetadata {
            language: Some(language.as_str().to_string()),
            ..Default::default()
        };
        let file_type = if test_file {
            ChunkType::Test
        } else {
            ChunkType::SourceFile
        };
        let mut chunks = vec![Chunk::new(file_type, path, text, feature.clone(), file_meta)];

        let detector = self.registry.detector_for_path(path);
        let units = match panic::catch_unwind(AssertUnwindSafe(|| detector.detect_units(text))) {
            Ok(units) => units,
            Err(_) => {
                tracing::warn!("Boundary detection failed for {}, keeping whole file", path);
                return chunks;
            }
        };

        let lines: Vec<&str> = text.lines().collect();
        for unit in units {
            let Some(body) = unit_body(&lines, &unit) else {
                continue;
            };
            let chunk_type = match unit.kind {
                UnitKind::Class => ChunkType::Class,
                UnitKind::Function if unit.is_test || test_file || unit.name.starts_with("test_") => {
                    ChunkType::Test
                }
                UnitKind::Function => ChunkType::Function,
            };

            let mut calls = detector.extract_calls(&body);
            calls.retain(|c| *c != unit.name);

            let metadata = ChunkMetadata {
                name: Some(unit.name.clone()),
                language: Some(language.as_str().to_string()),
                start_line: Some(unit.start_line),
                end_line: Some(unit.end_line),
                signature: Some(unit.signature.clone()).filter(|s| !s.is_empty()),
                docstring: unit.docstring.clone(),
                parent: unit.parent.clone(),
                calls,
                bases: unit.bases.clone(),
                ..Default::default()
            };
            chunks.push(Chunk::new(chunk_type, path, body, feature.clone(), metadata));
        }

        chunks
    }
}

/// Text of a unit's line range, or None for an out-of-range unit.
fn unit_body(lines: &[&str], unit: &CodeUnit) -> Option<String> {
    let start = unit.start_line.max(1) as usize;
    let end = (unit.end_line as usize).min(lines.len());
    (start <= end).then(|| lines[start - 1..end].join("\n"))
}

fn single_chunk(chunk_type: ChunkType, path: &str, text: &str, feature: Option<String>) -> Chunk {
    let metadata = ChunkMetadata {
        language: Some(Language::from_path(path).as_str().to_string()),
        ..Default::default()
    };
    Chunk::new(chunk_type, path, text, feature, metadata)
}

fn contract_chunk(path: &str, text: &str, feature: Option<String>) -> Chunk {
    let name = feature.clone().unwrap_or_else(|| {
        let file = path.rsplit('/').next().unwrap_or(path);
        file.trim_end_matches(".md").trim_end_matches(".contract").to_string()
    });
    let metadata = ChunkMetadata {
        name: Some(name.clone()),
        language: Some(Language::Markdown.as_str().to_string()),
        signature: Some(contract_signature(text)),
        ..Default::default()
    };
    Chunk::new(ChunkType::Contract, path, text, Some(feature.unwrap_or(name)), metadata)
}

/// Interface summary of a contract: its title, the `## Interface` heading
/// and the list items and fences under it. Falls back to the first 10 lines.
pub fn contract_signature(text: &str) -> String {
    let mut picked = Vec::new();
    let mut in_interface = false;

    for line in text.lines() {
        if line.starts_with("# ") || line.starts_with("## Interface") {
            in_interface = true;
            picked.push(line);
        } else if in_interface {
            if line.starts_with("## ") && !line.contains("Interface") {
                break;
            }
            if line.starts_with("- ") || line.starts_with("```") {
                picked.push(line);
            }
        }
    }

    if picked.is_empty() {
        text.lines().take(10).collect::<Vec<_>>().join("\n")
    } else {
        picked.into_iter().take(20).collect::<Vec<_>>().join("\n")
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
