// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Edge construction over a complete chunk set.
//!
//! The builder is a pure function of the chunks it is given: it never touches
//! the filesystem, and import resolution runs against the set of paths that
//! appear in the chunks. References that cannot be resolved to exactly one
//! target produce no edge and are counted in [`GraphStats`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::chunker::classify;
use crate::chunker::languages::{DetectorRegistry, ImportKind, KnownFiles};
use crate::model::{Chunk, ChunkType, Edge, EdgeType};

/// Counters describing one graph build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub edges_by_type: BTreeMap<EdgeType, usize>,
    /// Call names with no definition anywhere.
    pub unresolved_calls: usize,
    /// Call names with several equally good definitions.
    pub ambiguous_calls: usize,
    /// Project-internal imports that matched no known file.
    pub unresolved_imports: usize,
}

impl GraphStats {
    pub fn total_edges(&self) -> usize {
        self.edges_by_type.values().sum()
    }

    /// Every reference that produced no edge.
    pub fn unresolved_references(&self) -> usize {
        self.unresolved_calls + self.ambiguous_calls + self.unresolved_imports
    }
}

/// Edges plus the counters gathered while building them.
#[derive(Debug, Clone, Default)]
pub struct GraphOutput {
    /// Deduplicated edges sorted by `(from, to, type)`.
    pub edges: Vec<Edge>,
    pub stats: GraphStats,
}

/// Whether a chunk stands for a whole code file.
pub fn is_file_chunk(chunk: &Chunk) -> bool {
    match chunk.chunk_type {
        ChunkType::SourceFile => true,
        ChunkType::Test => chunk.metadata.name.is_none(),
        _ => false,
    }
}

/// Lookup tables over one chunk set.
struct Index<'a> {
    files: BTreeMap<&'a str, &'a Chunk>,
    known: KnownFiles,
    symbols_by_path: BTreeMap<&'a str, Vec<&'a Chunk>>,
    functions_by_name: BTreeMap<&'a str, Vec<&'a Chunk>>,
    classes_by_name: BTreeMap<&'a str, Vec<&'a Chunk>>,
    by_path: BTreeMap<&'a str, Vec<&'a Chunk>>,
}

impl<'a> Index<'a> {
    fn new(chunks: &[&'a Chunk]) -> Self {
        let mut index = Index {
            files: BTreeMap::new(),
            known: KnownFiles::new(),
            symbols_by_path: BTreeMap::new(),
            functions_by_name: BTreeMap::new(),
            classes_by_name: BTreeMap::new(),
            by_path: BTreeMap::new(),
        };

        for &chunk in chunks {
            let path = chunk.path.as_str();
            if chunk.chunk_type != ChunkType::Commit {
                index.known.insert(chunk.path.clone());
                index.by_path.entry(path).or_default().push(chunk);
            }
            if is_file_chunk(chunk) {
                index.files.insert(path, chunk);
                continue;
            }
            let Some(name) = chunk.metadata.name.as_deref() else {
                continue;
            };
            if chunk.chunk_type.is_symbol() {
                index.symbols_by_path.entry(path).or_default().push(chunk);
            }
            match chunk.chunk_type {
                ChunkType::Function => index.functions_by_name.entry(name).or_default().push(chunk),
                ChunkType::Class => index.classes_by_name.entry(name).or_default().push(chunk),
                _ => {}
            }
        }

        index
    }

    fn symbols_at(&self, path: &str) -> &[&'a Chunk] {
        self.symbols_by_path.get(path).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Builds typed edges between chunks.
pub struct GraphBuilder {
    registry: DetectorRegistry,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            registry: DetectorRegistry::new(),
        }
    }

    /// Build every edge for a chunk set.
    pub fn build(&self, chunks: &[Chunk]) -> GraphOutput {
        // Ids are unique in storage; tolerate duplicate input anyway.
        let mut seen = BTreeSet::new();
        let mut unique: Vec<&Chunk> = chunks.iter().filter(|c| seen.insert(c.id.as_str())).collect();
        unique.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.id.cmp(&b.id)));

        let index = Index::new(&unique);
        let mut stats = GraphStats::default();
        let mut edges: BTreeMap<(String, String, EdgeType), Edge> = BTreeMap::new();
        let mut add = |edge: Edge| {
            if edge.from_id != edge.to_id {
                edges
                    .entry((edge.from_id.clone(), edge.to_id.clone(), edge.edge_type))
                    .or_insert(edge);
            }
        };

        contains_edges(&index, &mut add);
        call_edges(&unique, &index, &mut stats, &mut add);
        self.import_edges(&index, &mut stats, &mut add);
        tested_by_edges(&index, &mut add);
        feature_edges(&unique, &mut add);
        inherits_edges(&unique, &index, &mut add);
        history_edges(&unique, &index, &mut add);
        configured_by_edges(&unique, &index, &mut add);

        let edges: Vec<Edge> = edges.into_values().collect();
        for edge in &edges {
            *stats.edges_by_type.entry(edge.edge_type).or_insert(0) += 1;
        }

        tracing::debug!(
            "Built {} edges ({} unresolved calls, {} ambiguous calls, {} unresolved imports)",
            edges.len(),
            stats.unresolved_calls,
            stats.ambiguous_calls,
            stats.unresolved_imports
        );

        GraphOutput { edges, stats }
    }

    fn import_edges(&self, index: &Index<'_>, stats: &mut GraphStats, add: &mut impl FnMut(Edge)) {
        for (path, file) in &index.files {
            let detector = self.registry.detector_for_path(path);
            for import in detector.parse_imports(&file.content) {
                match detector.resolve_import(&import, Path::new(path), &index.known) {
                    Some(target) if target != *path => {
                        if let Some(target_chunk) = index.files.get(target.as_str()) {
                            add(Edge::new(&file.id, &target_chunk.id, EdgeType::Imports)
                                .with_meta("line", import.line));
                        }
                    }
                    Some(_) => {}
                    None if import.kind == ImportKind::External => {}
                    None => {
                        tracing::debug!("Unresolved import '{}' in {}", import.raw_path, path);
                        stats.unresolved_imports += 1;
                    }
                }
            }
        }
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// file → top-level symbols; class → its methods.
fn contains_edges(index: &Index<'_>, add: &mut impl FnMut(Edge)) {
    for (path, symbols) in &index.symbols_by_path {
        let classes: Vec<&Chunk> = symbols
            .iter()
            .copied()
            .filter(|c| c.chunk_type == ChunkType::Class)
            .collect();

        for symbol in symbols {
            let owners: Vec<&&Chunk> = match symbol.metadata.parent.as_deref() {
                Some(parent) => classes
                    .iter()
                    .filter(|c| c.metadata.name.as_deref() == Some(parent))
                    .collect(),
                None => Vec::new(),
            };

            for owner in &owners {
                add(Edge::new(&owner.id, &symbol.id, EdgeType::Contains));
            }
            // Methods whose class lives elsewhere hang off the file.
            if owners.is_empty() {
                if let Some(file) = index.files.get(path) {
                    if file.encloses(symbol) {
                        add(Edge::new(&file.id, &symbol.id, EdgeType::Contains));
                    }
                }
            }
        }
    }
}

/// Resolve `calls` names, preferring a unique definition in the same file.
fn call_edges(
    chunks: &[&Chunk],
    index: &Index<'_>,
    stats: &mut GraphStats,
    add: &mut impl FnMut(Edge),
) {
    for caller in chunks.iter().filter(|c| c.chunk_type.is_symbol()) {
        for name in &caller.metadata.calls {
            let candidates: Vec<&Chunk> = index
                .functions_by_name
                .get(name.as_str())
                .map(|v| v.iter().copied().filter(|c| c.id != caller.id).collect())
                .unwrap_or_default();

            let same_file: Vec<&Chunk> = candidates
                .iter()
                .copied()
                .filter(|c| c.path == caller.path)
                .collect();

            let target = match (same_file.len(), candidates.len()) {
                (1, _) => Some(same_file[0]),
                (0, 1) => Some(candidates[0]),
                (0, 0) => {
                    stats.unresolved_calls += 1;
                    None
                }
                _ => {
                    tracing::debug!("Ambiguous call '{}' from {}", name, caller.id);
                    stats.ambiguous_calls += 1;
                    None
                }
            };

            if let Some(target) = target {
                add(Edge::new(&caller.id, &target.id, EdgeType::Calls));
            }
        }
    }
}

/// Stem and extensions of the implementation file a test file exercises.
fn tested_stem(test_path: &str) -> Option<(String, Vec<&'static str>)> {
    let name = test_path.rsplit('/').next().unwrap_or(test_path);

    if let Some(rest) = name.strip_prefix("test_").and_then(|n| n.strip_suffix(".py")) {
        return Some((rest.to_string(), vec!["py"]));
    }
    if let Some(rest) = name.strip_suffix("_test.py") {
        return Some((rest.to_string(), vec!["py"]));
    }
    if let Some(rest) = name.strip_suffix("_test.go") {
        return Some((rest.to_string(), vec!["go"]));
    }
    for marker in [".test.", ".spec."] {
        if let Some(pos) = name.find(marker) {
            return Some((name[..pos].to_string(), vec!["ts", "tsx", "js", "jsx"]));
        }
    }
    // tests/foo.rs and friends
    let (stem, ext) = name.rsplit_once('.')?;
    match ext {
        "rs" => Some((stem.to_string(), vec!["rs"])),
        "py" => Some((stem.to_string(), vec!["py"])),
        "ts" | "tsx" | "js" | "jsx" => Some((stem.to_string(), vec!["ts", "tsx", "js", "jsx"])),
        _ => None,
    }
}

fn dir_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// The single implementation file for a test file, if there is one.
fn implementation_for<'a>(test_path: &str, index: &Index<'a>) -> Option<&'a Chunk> {
    let (stem, exts) = tested_stem(test_path)?;
    let matches: Vec<&Chunk> = index
        .files
        .values()
        .copied()
        .filter(|c| c.chunk_type == ChunkType::SourceFile && !classify::is_test_path(&c.path))
        .filter(|c| {
            let name = c.path.rsplit('/').next().unwrap_or(&c.path);
            name.rsplit_once('.')
                .map(|(s, e)| s == stem && exts.contains(&e))
                .unwrap_or(false)
        })
        .collect();

    let dir = dir_of(test_path);
    let mut preferred = vec![dir];
    if matches!(dir.rsplit('/').next(), Some("__tests__" | "tests" | "test")) {
        preferred.push(dir_of(dir));
    }
    for wanted in preferred {
        let local: Vec<&Chunk> = matches.iter().copied().filter(|c| dir_of(&c.path) == wanted).collect();
        if local.len() == 1 {
            return Some(local[0]);
        }
    }

    (matches.len() == 1).then(|| matches[0])
}

/// Name of the unit a test function exercises (`test_bar` → `bar`, `TestBar` → `Bar`).
fn tested_name(test_name: &str) -> Option<&str> {
    test_name
        .strip_prefix("test_")
        .or_else(|| test_name.strip_prefix("Test"))
        .or_else(|| test_name.strip_prefix("test"))
        .filter(|n| !n.is_empty())
}

fn tested_by_edges(index: &Index<'_>, add: &mut impl FnMut(Edge)) {
    for (path, file) in &index.files {
        if classify::is_test_path(path) {
            let Some(implementation) = implementation_for(path, index) else {
                continue;
            };
            add(Edge::new(&implementation.id, &file.id, EdgeType::TestedBy));
            link_test_symbols(index.symbols_at(path), index.symbols_at(&implementation.path), add);
        } else {
            // Inline tests next to the code they exercise.
            let symbols = index.symbols_at(path);
            link_test_symbols(symbols, symbols, add);
        }
    }
}

fn link_test_symbols(tests: &[&Chunk], targets: &[&Chunk], add: &mut impl FnMut(Edge)) {
    for test in tests.iter().filter(|c| c.chunk_type == ChunkType::Test) {
        let Some(wanted) = test.metadata.name.as_deref().and_then(tested_name) else {
            continue;
        };
        let found: Vec<&&Chunk> = targets
            .iter()
            .filter(|c| matches!(c.chunk_type, ChunkType::Function | ChunkType::Class))
            .filter(|c| c.metadata.name.as_deref() == Some(wanted))
            .collect();
        if found.len() == 1 {
            add(Edge::new(&found[0].id, &test.id, EdgeType::TestedBy));
        }
    }
}

/// implements (code → contract) and validates (rule → code, test → contract).
fn feature_edges(chunks: &[&Chunk], add: &mut impl FnMut(Edge)) {
    let mut contracts: BTreeMap<&str, Vec<&Chunk>> = BTreeMap::new();
    for chunk in chunks.iter().copied().filter(|c| c.chunk_type == ChunkType::Contract) {
        if let Some(feature) = chunk.feature.as_deref() {
            contracts.entry(feature).or_default().push(chunk);
        }
    }

    for chunk in chunks {
        let Some(feature) = chunk.feature.as_deref() else {
            continue;
        };
        let Some(feature_contracts) = contracts.get(feature) else {
            continue;
        };
        let edge_type = match chunk.chunk_type {
            ChunkType::SourceFile | ChunkType::Function | ChunkType::Class => EdgeType::Implements,
            ChunkType::Test => EdgeType::Validates,
            _ => continue,
        };
        for contract in feature_contracts {
            add(Edge::new(&chunk.id, &contract.id, edge_type));
        }
    }

    for rule in chunks.iter().filter(|c| c.chunk_type == ChunkType::BusinessRule) {
        let applies_to: Vec<&str> = rule
            .metadata
            .extra
            .get("applies_to")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();

        for target in chunks.iter().filter(|c| {
            matches!(
                c.chunk_type,
                ChunkType::SourceFile | ChunkType::Function | ChunkType::Class
            )
        }) {
            let same_feature = rule.feature.is_some() && rule.feature == target.feature;
            let named = applies_to.iter().any(|a| {
                target.metadata.name.as_deref() == Some(*a) || target.path == *a
            });
            if same_feature || named {
                add(Edge::new(&rule.id, &target.id, EdgeType::Validates));
            }
        }
    }
}

fn inherits_edges(chunks: &[&Chunk], index: &Index<'_>, add: &mut impl FnMut(Edge)) {
    for class in chunks.iter().filter(|c| c.chunk_type == ChunkType::Class) {
        for base in &class.metadata.bases {
            let candidates: Vec<&Chunk> = index
                .classes_by_name
                .get(base.as_str())
                .map(|v| v.iter().copied().filter(|c| c.id != class.id).collect())
                .unwrap_or_default();
            let local: Vec<&Chunk> = candidates
                .iter()
                .copied()
                .filter(|c| c.path == class.path)
                .collect();
            let target = match (local.len(), candidates.len()) {
                (1, _) => Some(local[0]),
                (0, 1) => Some(candidates[0]),
                _ => None,
            };
            match target {
                Some(target) => add(Edge::new(&class.id, &target.id, EdgeType::Inherits)),
                None => tracing::debug!("Base '{}' of {} not resolved", base, class.id),
            }
        }
    }
}

fn commit_order_key(commit: &Chunk) -> (String, String) {
    (
        commit.metadata.timestamp.clone().unwrap_or_default(),
        commit.id.clone(),
    )
}

/// modified_in (file and its units → commit) and preceded_by (commit → prior commit).
fn history_edges(chunks: &[&Chunk], index: &Index<'_>, add: &mut impl FnMut(Edge)) {
    let mut commits: Vec<&Chunk> = chunks
        .iter()
        .copied()
        .filter(|c| c.chunk_type == ChunkType::Commit)
        .collect();
    commits.sort_by_key(|c| commit_order_key(c));

    for pair in commits.windows(2) {
        add(Edge::new(&pair[1].id, &pair[0].id, EdgeType::PrecededBy));
    }

    for commit in &commits {
        for path in &commit.metadata.files_changed {
            for chunk in index.by_path.get(path.as_str()).into_iter().flatten() {
                add(Edge::new(&chunk.id, &commit.id, EdgeType::ModifiedIn));
            }
        }
    }
}

/// Source file → config in the same directory or the same feature.
fn configured_by_edges(chunks: &[&Chunk], index: &Index<'_>, add: &mut impl FnMut(Edge)) {
    let configs: Vec<&Chunk> = chunks
        .iter()
        .copied()
        .filter(|c| c.chunk_type == ChunkType::Config)
        .collect();
    if configs.is_empty() {
        return;
    }

    for file in index
        .files
        .values()
        .filter(|c| c.chunk_type == ChunkType::SourceFile)
    {
        for config in &configs {
            let same_dir = dir_of(&config.path) == dir_of(&file.path);
            let same_feature = file.feature.is_some() && file.feature == config.feature;
            if same_dir || same_feature {
                add(Edge::new(&file.id, &config.id, EdgeType::ConfiguredBy));
            }
        }
    }
}
