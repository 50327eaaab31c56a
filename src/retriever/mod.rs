// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Budgeted context retrieval over the chunk graph.
//!
//! A retrieval seeds candidates from full-text search and from hints,
//! expands them along graph edges with a per-hop decay, ranks them, and then
//! fills the token budget greedily. Every candidate ends up with exactly one
//! [`Disposition`]: included at some compression level, or omitted with a
//! reason the caller can act on (usually by calling `expand`).

pub mod query;
pub mod related;
pub mod render;

pub use query::{Hints, InferredHints, RetrievalRequest, TaskParser};
pub use related::{ExpansionKind, RelatedChunk, Relation};

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::compress::{estimate_compressed_tokens, CompressionLevel, Compressor};
use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::model::{Chunk, ChunkType, Direction, Edge, EdgeType};
use crate::storage::Store;

/// Why a candidate was left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OmissionReason {
    /// Excluded by type or by `include_tests = false`.
    Filtered,
    /// The budget was already spent when this candidate's turn came.
    RankCutoff,
    /// Even the coarsest level did not fit the remaining budget.
    TokenBudget,
}

impl OmissionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            OmissionReason::Filtered => "filtered",
            OmissionReason::RankCutoff => "rank_cutoff",
            OmissionReason::TokenBudget => "token_budget",
        }
    }
}

impl fmt::Display for OmissionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Disposition {
    Included {
        level: CompressionLevel,
        content: String,
        tokens: usize,
    },
    Omitted {
        reason: OmissionReason,
    },
}

/// A ranked candidate and what happened to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEntry {
    pub chunk_id: String,
    pub chunk_type: ChunkType,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub score: f64,
    pub disposition: Disposition,
}

impl CandidateEntry {
    pub fn is_included(&self) -> bool {
        matches!(self.disposition, Disposition::Included { .. })
    }

    pub fn omission_reason(&self) -> Option<OmissionReason> {
        match self.disposition {
            Disposition::Omitted { reason } => Some(reason),
            Disposition::Included { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalStats {
    pub chunks_considered: usize,
    pub chunks_included: usize,
    pub chunks_omitted: usize,
    pub tokens_used: usize,
    pub token_budget: usize,
}

/// Everything a retrieval decided, in rank order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub task: String,
    pub entries: Vec<CandidateEntry>,
    pub stats: RetrievalStats,
    pub omission_by_type: BTreeMap<ChunkType, usize>,
    pub omission_by_reason: BTreeMap<OmissionReason, usize>,
    pub omission_summary: String,
    /// Omitted chunk ids, in rank order.
    pub available_expansions: Vec<String>,
    /// Edges between included chunks, ordered by `(from, to, type)`.
    pub edges: Vec<Edge>,
    /// Tests covering included chunks that were not included themselves.
    pub related_tests: Vec<String>,
    /// Commits that modified included chunks. Empty unless history was asked for.
    pub related_commits: Vec<String>,
    /// Business rules validating included chunks.
    pub business_rules: Vec<String>,
}

impl RetrievalResult {
    pub fn included(&self) -> impl Iterator<Item = &CandidateEntry> {
        self.entries.iter().filter(|e| e.is_included())
    }

    pub fn omitted(&self) -> impl Iterator<Item = &CandidateEntry> {
        self.entries.iter().filter(|e| !e.is_included())
    }

    /// Entry for a chunk id, if it was a candidate.
    pub fn entry(&self, chunk_id: &str) -> Option<&CandidateEntry> {
        self.entries.iter().find(|e| e.chunk_id == chunk_id)
    }

    fn assemble(task: &str, entries: Vec<CandidateEntry>, token_budget: usize) -> Self {
        let mut stats = RetrievalStats {
            chunks_considered: entries.len(),
            token_budget,
            ..Default::default()
        };
        let mut omission_by_type = BTreeMap::new();
        let mut omission_by_reason = BTreeMap::new();
        let mut available_expansions = Vec::new();

        for entry in &entries {
            match &entry.disposition {
                Disposition::Included { tokens, .. } => {
                    stats.chunks_included += 1;
                    stats.tokens_used += tokens;
                }
                Disposition::Omitted { reason } => {
                    stats.chunks_omitted += 1;
                    *omission_by_type.entry(entry.chunk_type).or_insert(0) += 1;
                    *omission_by_reason.entry(*reason).or_insert(0) += 1;
                    available_expansions.push(entry.chunk_id.clone());
                }
            }
        }

        let omission_summary = summarize(&stats, &omission_by_reason);

        Self {
            task: task.to_string(),
            entries,
            stats,
            omission_by_type,
            omission_by_reason,
            omission_summary,
            available_expansions,
            edges: Vec::new(),
            related_tests: Vec::new(),
            related_commits: Vec::new(),
            business_rules: Vec::new(),
        }
    }
}

fn summarize(stats: &RetrievalStats, by_reason: &BTreeMap<OmissionReason, usize>) -> String {
    if stats.chunks_considered == 0 {
        return "no matches".to_string();
    }
    if stats.chunks_omitted == 0 {
        return format!(
            "all {} candidates included ({} of {} tokens)",
            stats.chunks_considered, stats.tokens_used, stats.token_budget
        );
    }
    let reasons: Vec<String> = by_reason
        .iter()
        .map(|(reason, count)| format!("{} {}", count, reason))
        .collect();
    format!(
        "{} of {} candidates omitted ({}); expand an id to load it",
        stats.chunks_omitted,
        stats.chunks_considered,
        reasons.join(", ")
    )
}

/// Search-score multiplier by chunk type.
pub fn type_boost(chunk_type: ChunkType) -> f64 {
    chunk_type.priority() as f64 / 10.0
}

/// Candidate ordering: score desc, type priority desc, path asc, id asc.
fn rank_order(a: &(Chunk, f64), b: &(Chunk, f64)) -> Ordering {
    b.1.total_cmp(&a.1)
        .then_with(|| b.0.chunk_type.priority().cmp(&a.0.chunk_type.priority()))
        .then_with(|| a.0.path.cmp(&b.0.path))
        .then_with(|| a.0.id.cmp(&b.0.id))
}

/// Scores gathered during seeding and expansion.
#[derive(Default)]
struct Candidates {
    chunks: HashMap<String, Chunk>,
    scores: BTreeMap<String, f64>,
}

impl Candidates {
    /// Record `score` for `chunk`, keeping the maximum. Returns whether it improved.
    fn offer(&mut self, chunk: Chunk, score: f64) -> bool {
        let improved = self
            .scores
            .get(&chunk.id)
            .map(|current| score > *current)
            .unwrap_or(true);
        if improved {
            self.scores.insert(chunk.id.clone(), score);
            self.chunks.entry(chunk.id.clone()).or_insert(chunk);
        }
        improved
    }

    fn ranked(mut self) -> Vec<(Chunk, f64)> {
        let mut ranked: Vec<(Chunk, f64)> = self
            .scores
            .iter()
            .filter_map(|(id, score)| self.chunks.remove(id).map(|c| (c, *score)))
            .collect();
        ranked.sort_by(rank_order);
        ranked
    }
}

/// A frontier node: the seed score it descends from and the product of
/// direction factors along its path.
#[derive(Debug, Clone)]
struct Reach {
    id: String,
    seed_score: f64,
    factor: f64,
}

/// Read-only retrieval over a [`Store`].
pub struct Retriever<'a> {
    store: &'a Store,
    config: RetrievalConfig,
    compressor: Compressor,
    parser: TaskParser,
}

impl<'a> Retriever<'a> {
    pub fn new(store: &'a Store, config: RetrievalConfig) -> Self {
        Self {
            store,
            config,
            compressor: Compressor::default(),
            parser: TaskParser::new(),
        }
    }

    pub fn with_compressor(mut self, compressor: Compressor) -> Self {
        self.compressor = compressor;
        self
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Run a retrieval.
    pub fn retrieve(&self, request: &RetrievalRequest) -> Result<RetrievalResult> {
        let mut candidates = Candidates::default();
        self.seed(request, &mut candidates)?;
        tracing::debug!(
            "Seeded {} candidates for {:?}",
            candidates.scores.len(),
            request.task
        );

        let hop_limit = request.hop_limit.unwrap_or(self.config.hop_limit);
        self.expand_candidates(&mut candidates, hop_limit, ExpansionKind::All)?;

        let ranked = candidates.ranked();
        let entries = self.fill_budget(
            ranked,
            &request.hints,
            request.token_budget,
            request.compression_default,
        );
        let mut result = RetrievalResult::assemble(&request.task, entries, request.token_budget);
        self.attach_relations(&mut result, request.hints.include_history)?;
        tracing::debug!("{}", result.omission_summary);
        Ok(result)
    }

    /// Retrieve around one chunk: it seeds at score 1.0 and expands
    /// `hop_limit` hops along the edges `kind` selects.
    pub fn expand(
        &self,
        chunk_id: &str,
        hop_limit: usize,
        token_budget: usize,
        kind: ExpansionKind,
    ) -> Result<RetrievalResult> {
        let seed = self.store.require_chunk(chunk_id)?;
        let mut candidates = Candidates::default();
        candidates.offer(seed, 1.0);
        self.expand_candidates(&mut candidates, hop_limit, kind)?;

        let level = CompressionLevel::try_from(self.config.default_level).unwrap_or_default();
        let entries = self.fill_budget(
            candidates.ranked(),
            &Hints::default(),
            token_budget,
            level,
        );
        let mut result = RetrievalResult::assemble(chunk_id, entries, token_budget);
        self.attach_relations(&mut result, false)?;
        Ok(result)
    }

    /// Chunks one hop away from `chunk_id`, grouped by relation.
    pub fn related(
        &self,
        chunk_id: &str,
        relations: &[Relation],
    ) -> Result<BTreeMap<Relation, Vec<RelatedChunk>>> {
        related::find_related(self.store, chunk_id, relations)
    }

    /// Fill in the edges among included chunks and the ids related to them.
    fn attach_relations(&self, result: &mut RetrievalResult, include_history: bool) -> Result<()> {
        let included: BTreeSet<&str> = result.included().map(|e| e.chunk_id.as_str()).collect();

        let mut edges = Vec::new();
        for id in &included {
            for edge in self.store.get_edges(id, Direction::Outgoing, None)? {
                if included.contains(edge.to_id.as_str()) {
                    edges.push(edge);
                }
            }
        }
        edges.sort_by(|a, b| a.key().cmp(&b.key()));

        let mut related_tests = related::neighbours_of(
            self.store,
            included.iter().copied(),
            EdgeType::TestedBy,
            Direction::Outgoing,
            |_| true,
        )?;
        related_tests.retain(|id| !included.contains(id.as_str()));

        let related_commits = if include_history {
            related::neighbours_of(
                self.store,
                included.iter().copied(),
                EdgeType::ModifiedIn,
                Direction::Outgoing,
                |_| true,
            )?
        } else {
            Vec::new()
        };

        let rule_prefix = format!("{}:", ChunkType::BusinessRule.as_str());
        let business_rules = related::neighbours_of(
            self.store,
            included.iter().copied(),
            EdgeType::Validates,
            Direction::Incoming,
            |edge| edge.from_id.starts_with(&rule_prefix),
        )?;

        result.edges = edges;
        result.related_tests = related_tests;
        result.related_commits = related_commits;
        result.business_rules = business_rules;
        Ok(())
    }

    fn seed(&self, request: &RetrievalRequest, candidates: &mut Candidates) -> Result<()> {
        let hits = self.store.search(&request.task, self.config.fts_limit)?;
        if let Some(top) = hits.first().map(|h| h.score).filter(|s| *s > 0.0) {
            for hit in hits {
                if let Some(chunk) = self.store.get_live_chunk(&hit.chunk_id)? {
                    let score = hit.score / top * type_boost(chunk.chunk_type);
                    candidates.offer(chunk, score);
                }
            }
        }

        for symbol in &request.hints.symbols {
            for chunk in self.store.search_symbol(symbol)? {
                candidates.offer(chunk, self.config.hint_score);
            }
        }
        for path in &request.hints.paths {
            for chunk in self.store.get_chunks_by_file(path)? {
                candidates.offer(chunk, self.config.hint_score);
            }
        }

        let inferred = self.parser.infer(&request.task);
        for symbol in &inferred.symbols {
            let mut chunks = self.store.search_symbol(symbol)?;
            // Stable: ties keep the store's path order.
            chunks.sort_by_key(|c| std::cmp::Reverse(c.chunk_type.priority()));
            for chunk in chunks.into_iter().take(self.config.inferred_per_symbol) {
                candidates.offer(chunk, self.config.inferred_score);
            }
        }
        for path in &inferred.paths {
            for chunk in self.store.get_chunks_by_file(path)? {
                candidates.offer(chunk, self.config.inferred_score);
            }
        }
        Ok(())
    }

    /// Breadth-first expansion from every current candidate.
    fn expand_candidates(
        &self,
        candidates: &mut Candidates,
        hop_limit: usize,
        kind: ExpansionKind,
    ) -> Result<()> {
        let (direction, edge_type) = kind.edge_filter();
        let mut frontier: Vec<Reach> = candidates
            .scores
            .iter()
            .map(|(id, score)| Reach {
                id: id.clone(),
                seed_score: *score,
                factor: 1.0,
            })
            .collect();

        for hop in 1..=hop_limit {
            if frontier.is_empty() {
                break;
            }
            let decay = self.config.decay(hop);
            let mut next: BTreeMap<String, Reach> = BTreeMap::new();

            for node in &frontier {
                for edge in self.store.get_edges(&node.id, direction, edge_type)? {
                    let (other, direction_factor) = if edge.from_id == node.id {
                        (edge.to_id, 1.0)
                    } else {
                        (edge.from_id, self.config.incoming_factor)
                    };
                    if other == node.id {
                        continue;
                    }

                    let factor = node.factor * direction_factor;
                    let score = node.seed_score * decay * factor;
                    if candidates
                        .scores
                        .get(&other)
                        .map(|current| score <= *current)
                        .unwrap_or(false)
                    {
                        continue;
                    }

                    let chunk = match candidates.chunks.get(&other) {
                        Some(chunk) => chunk.clone(),
                        None => match self.store.get_live_chunk(&other)? {
                            Some(chunk) => chunk,
                            None => continue,
                        },
                    };
                    if candidates.offer(chunk, score) {
                        next.insert(
                            other.clone(),
                            Reach {
                                id: other,
                                seed_score: node.seed_score,
                                factor,
                            },
                        );
                    }
                }
            }

            tracing::debug!("Hop {} reached {} chunks", hop, next.len());
            frontier = next.into_values().collect();
        }
        Ok(())
    }

    fn fill_budget(
        &self,
        ranked: Vec<(Chunk, f64)>,
        hints: &Hints,
        token_budget: usize,
        level: CompressionLevel,
    ) -> Vec<CandidateEntry> {
        let mut remaining = token_budget;
        let mut entries = Vec::with_capacity(ranked.len());

        for (chunk, score) in ranked {
            let disposition = if hints.filters(chunk.chunk_type) {
                Disposition::Omitted {
                    reason: OmissionReason::Filtered,
                }
            } else if token_budget == 0 {
                Disposition::Omitted {
                    reason: OmissionReason::TokenBudget,
                }
            } else if remaining == 0 {
                Disposition::Omitted {
                    reason: OmissionReason::RankCutoff,
                }
            } else {
                match level
                    .and_coarser()
                    .map(|l| (l, estimate_compressed_tokens(&chunk, l)))
                    .find(|(_, tokens)| *tokens <= remaining)
                {
                    Some((level, tokens)) => {
                        remaining -= tokens;
                        Disposition::Included {
                            level,
                            content: self.compressor.compress(&chunk, level),
                            tokens,
                        }
                    }
                    None => Disposition::Omitted {
                        reason: OmissionReason::TokenBudget,
                    },
                }
            };

            entries.push(CandidateEntry {
                chunk_id: chunk.id,
                chunk_type: chunk.chunk_type,
                path: chunk.path,
                name: chunk.metadata.name,
                language: chunk.metadata.language,
                score,
                disposition,
            });
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChunkMetadata, Edge, EdgeType};

    fn function(path: &str, name: &str, content: &str) -> Chunk {
        let mut meta = ChunkMetadata::named(name);
        meta.language = Some("python".into());
        Chunk::new(ChunkType::Function, path, content, None, meta)
    }

    /// `a` calls `b`, a test covers `b`.
    fn fixture() -> (Store, Chunk, Chunk, Chunk) {
        let mut store = Store::open_in_memory().unwrap();
        let a = function("src/m.py", "a", "def a():\n    return b()\n");
        let b = function("src/m.py", "b", "def b():\n    return 42\n");
        let t = Chunk::new(
            ChunkType::Test,
            "tests/test_m.py",
            "def test_b():\n    assert b() == 42\n",
            None,
            ChunkMetadata::named("test_b"),
        );
        store
            .save_chunks(&[a.clone(), b.clone(), t.clone()])
            .unwrap();
        store
            .save_edges(&[
                Edge::new(&a.id, &b.id, EdgeType::Calls),
                Edge::new(&b.id, &t.id, EdgeType::TestedBy),
            ])
            .unwrap();
        (store, a, b, t)
    }

    #[test]
    fn test_caller_reached_through_incoming_edge() {
        let (store, a, b, _) = fixture();
        let retriever = Retriever::new(&store, RetrievalConfig::default());
        let result = retriever
            .retrieve(&RetrievalRequest::new("b", 10_000))
            .unwrap();

        let b_entry = result.entry(&b.id).unwrap();
        assert!(matches!(
            b_entry.disposition,
            Disposition::Included {
                level: CompressionLevel::Full,
                ..
            }
        ));
        let a_entry = result.entry(&a.id).unwrap();
        assert!(a_entry.is_included());
        assert!(a_entry.score < b_entry.score);
        // incoming edge: 5.0 * 0.9 * 0.5
        assert!((a_entry.score - 2.25).abs() < 1e-9);
    }

    #[test]
    fn test_zero_budget_omits_everything() {
        let (store, ..) = fixture();
        let retriever = Retriever::new(&store, RetrievalConfig::default());
        let result = retriever.retrieve(&RetrievalRequest::new("b", 0)).unwrap();
        assert_eq!(result.included().count(), 0);
        assert!(result.omitted().count() > 0);
        assert!(result
            .omitted()
            .all(|e| e.omission_reason() == Some(OmissionReason::TokenBudget)));
        assert_eq!(result.available_expansions.len(), result.stats.chunks_omitted);
    }

    #[test]
    fn test_no_matches() {
        let (store, ..) = fixture();
        let retriever = Retriever::new(&store, RetrievalConfig::default());
        let result = retriever
            .retrieve(&RetrievalRequest::new("nothing relevant whatsoever", 100))
            .unwrap();
        assert!(result.entries.is_empty());
        assert_eq!(result.omission_summary, "no matches");
    }

    #[test]
    fn test_tests_filtered_when_excluded() {
        let (store, _, _, t) = fixture();
        let retriever = Retriever::new(&store, RetrievalConfig::default());
        let hints = Hints {
            include_tests: false,
            ..Default::default()
        };
        let result = retriever
            .retrieve(&RetrievalRequest::new("b", 10_000).with_hints(hints))
            .unwrap();
        assert_eq!(
            result.entry(&t.id).unwrap().omission_reason(),
            Some(OmissionReason::Filtered)
        );
        assert_eq!(result.omission_by_reason.get(&OmissionReason::Filtered), Some(&1));
        assert_eq!(result.omission_by_type.get(&ChunkType::Test), Some(&1));
    }

    #[test]
    fn test_budget_is_conserved_and_partition_complete() {
        let (store, ..) = fixture();
        let retriever = Retriever::new(&store, RetrievalConfig::default());
        for budget in [1, 3, 5, 8, 13, 50] {
            let result = retriever
                .retrieve(&RetrievalRequest::new("b", budget))
                .unwrap();
            assert!(result.stats.tokens_used <= budget);
            assert_eq!(
                result.stats.chunks_included + result.stats.chunks_omitted,
                result.entries.len()
            );
        }
    }

    #[test]
    fn test_rank_cutoff_after_budget_spent() {
        let (store, _, b, _) = fixture();
        let retriever = Retriever::new(&store, RetrievalConfig::default());
        let exact = b.token_estimate;
        let result = retriever
            .retrieve(&RetrievalRequest::new("b", exact))
            .unwrap();
        assert!(result.entry(&b.id).unwrap().is_included());
        assert!(result
            .omitted()
            .all(|e| e.omission_reason() == Some(OmissionReason::RankCutoff)));
    }

    #[test]
    fn test_expand_hop_zero_is_seed_only() {
        let (store, _, b, _) = fixture();
        let retriever = Retriever::new(&store, RetrievalConfig::default());
        let result = retriever.expand(&b.id, 0, 10_000, ExpansionKind::All).unwrap();
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].chunk_id, b.id);
        assert!(result.entries[0].is_included());
        assert_eq!(result.stats.chunks_omitted, 0);
    }

    #[test]
    fn test_expand_follows_edges() {
        let (store, a, b, t) = fixture();
        let retriever = Retriever::new(&store, RetrievalConfig::default());
        let result = retriever.expand(&b.id, 1, 10_000, ExpansionKind::All).unwrap();
        let ids: Vec<&str> = result.entries.iter().map(|e| e.chunk_id.as_str()).collect();
        assert_eq!(ids[0], b.id);
        assert!(ids.contains(&a.id.as_str()));
        assert!(ids.contains(&t.id.as_str()));
        // outgoing beats incoming
        assert!(result.entry(&t.id).unwrap().score > result.entry(&a.id).unwrap().score);
    }

    #[test]
    fn test_expand_unknown_id() {
        let (store, ..) = fixture();
        let retriever = Retriever::new(&store, RetrievalConfig::default());
        assert!(matches!(
            retriever.expand("function:nope", 1, 100, ExpansionKind::All),
            Err(crate::error::ContextError::NotFound(_))
        ));
    }

    #[test]
    fn test_dangling_edges_are_skipped() {
        let (mut store, _, b, _) = fixture();
        store
            .save_edges(&[Edge::new(&b.id, "function:gone@000000000000", EdgeType::Calls)])
            .unwrap();
        let retriever = Retriever::new(&store, RetrievalConfig::default());
        let result = retriever.expand(&b.id, 2, 10_000, ExpansionKind::All).unwrap();
        assert!(result.entry("function:gone@000000000000").is_none());
    }

    #[test]
    fn test_retrieval_is_deterministic() {
        let (store, ..) = fixture();
        let retriever = Retriever::new(&store, RetrievalConfig::default());
        let request = RetrievalRequest::new("b returns 42", 20);
        let first = retriever.retrieve(&request).unwrap();
        let second = retriever.retrieve(&request).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_falls_back_to_coarser_level() {
        let mut store = Store::open_in_memory().unwrap();
        let mut meta = ChunkMetadata::named("big");
        meta.signature = Some("def big():".into());
        let body = format!("def big():\n{}", "    x = 1\n".repeat(100));
        let big = Chunk::new(ChunkType::Function, "src/big.py", body, None, meta);
        store.save_chunk(&big).unwrap();

        let retriever = Retriever::new(&store, RetrievalConfig::default());
        let result = retriever
            .retrieve(&RetrievalRequest::new("big", 10))
            .unwrap();
        match &result.entry(&big.id).unwrap().disposition {
            Disposition::Included { level, content, tokens } => {
                assert_eq!(*level, CompressionLevel::SignatureDocstring);
                assert_eq!(content, "def big():\n    ...");
                assert!(*tokens <= 10);
            }
            other => panic!("expected inclusion, got {:?}", other),
        }
    }

    #[test]
    fn test_expand_kinds_pick_edges() {
        let (store, a, b, t) = fixture();
        let retriever = Retriever::new(&store, RetrievalConfig::default());
        let ids = |kind| -> Vec<String> {
            retriever
                .expand(&b.id, 2, 10_000, kind)
                .unwrap()
                .entries
                .into_iter()
                .map(|e| e.chunk_id)
                .collect()
        };

        assert_eq!(ids(ExpansionKind::Dependencies), vec![b.id.clone(), t.id.clone()]);
        assert_eq!(ids(ExpansionKind::Dependents), vec![b.id.clone(), a.id.clone()]);
        assert_eq!(ids(ExpansionKind::Tests), vec![b.id.clone(), t.id.clone()]);
        assert_eq!(ids(ExpansionKind::All).len(), 3);

        let from_a = retriever.expand(&a.id, 2, 10_000, ExpansionKind::Tests).unwrap();
        assert_eq!(from_a.entries.len(), 1);
    }

    #[test]
    fn test_result_lists_edges_and_related_chunks() {
        let (mut store, a, b, t) = fixture();
        let rule = Chunk::new(
            ChunkType::BusinessRule,
            "docs/rules.md",
            "b always returns 42",
            None,
            ChunkMetadata::named("answer"),
        );
        let commit = Chunk::new(
            ChunkType::Commit,
            "src/m.py",
            "Make b return 42",
            None,
            ChunkMetadata::named("abc1234"),
        );
        store.save_chunks(&[rule.clone(), commit.clone()]).unwrap();
        store
            .save_edges(&[
                Edge::new(&rule.id, &b.id, EdgeType::Validates),
                Edge::new(&b.id, &commit.id, EdgeType::ModifiedIn),
            ])
            .unwrap();
        let retriever = Retriever::new(&store, RetrievalConfig::default());

        let hints = Hints {
            include_tests: false,
            ..Default::default()
        };
        let result = retriever
            .retrieve(&RetrievalRequest::new("b", 10_000).with_hints(hints.clone()))
            .unwrap();
        assert!(result
            .edges
            .iter()
            .any(|e| e.from_id == a.id && e.to_id == b.id && e.edge_type == EdgeType::Calls));
        assert!(result.edges.iter().all(|e| e.to_id != t.id));
        assert_eq!(result.related_tests, vec![t.id.clone()]);
        assert_eq!(result.business_rules, vec![rule.id.clone()]);
        assert!(result.related_commits.is_empty());

        let with_history = Hints {
            include_history: true,
            ..hints
        };
        let result = retriever
            .retrieve(&RetrievalRequest::new("b", 10_000).with_hints(with_history))
            .unwrap();
        assert_eq!(result.related_commits, vec![commit.id.clone()]);

        // An included test is not listed again.
        let result = retriever
            .retrieve(&RetrievalRequest::new("b", 10_000))
            .unwrap();
        assert!(result.entry(&t.id).unwrap().is_included());
        assert!(result.related_tests.is_empty());
        assert!(result
            .edges
            .iter()
            .any(|e| e.from_id == b.id && e.to_id == t.id && e.edge_type == EdgeType::TestedBy));
    }

    #[test]
    fn test_related_groups_by_relation() {
        let (store, a, b, t) = fixture();
        let retriever = Retriever::new(&store, RetrievalConfig::default());
        let related = retriever.related(&b.id, &[]).unwrap();
        assert_eq!(related[&Relation::Tests][0].chunk_id, t.id);
        assert_eq!(related[&Relation::Dependents][0].chunk_id, a.id);
        assert!(!related.contains_key(&Relation::Dependencies));
    }

    #[test]
    fn test_plain_words_in_task_do_not_seed_symbols() {
        let mut store = Store::open_in_memory().unwrap();
        let mut chunks: Vec<Chunk> = (0..8)
            .map(|i| {
                function(
                    &format!("src/client{}.py", i),
                    "get",
                    &format!("def get(self):\n    return self.items[{}]\n", i),
                )
            })
            .collect();
        let auth = function(
            "src/auth.py",
            "authenticate_user",
            "def authenticate_user(token):\n    return check(token)\n",
        );
        chunks.push(auth.clone());
        store.save_chunks(&chunks).unwrap();

        let config = RetrievalConfig::default();
        let inferred = config.inferred_score;
        let retriever = Retriever::new(&store, config);
        let result = retriever
            .retrieve(&RetrievalRequest::new(
                "fix authenticate_user so we get the token",
                10_000,
            ))
            .unwrap();

        assert_eq!(result.entries[0].chunk_id, auth.id);
        assert!((result.entries[0].score - inferred).abs() < 1e-9);
        assert!(result
            .entries
            .iter()
            .filter(|e| e.name.as_deref() == Some("get"))
            .all(|e| e.score < inferred));
    }

    #[test]
    fn test_inferred_symbol_seeds_are_capped() {
        let mut store = Store::open_in_memory().unwrap();
        let mut chunks: Vec<Chunk> = (0..4)
            .map(|i| function(&format!("src/g{}.py", i), "g", "def g():\n    return 1\n"))
            .collect();
        // Sorts first by path but has the lowest priority.
        chunks.push(Chunk::new(
            ChunkType::Test,
            "a/test_g.py",
            "def g():\n    assert True\n",
            None,
            ChunkMetadata::named("g"),
        ));
        store.save_chunks(&chunks).unwrap();

        let retriever = Retriever::new(&store, RetrievalConfig::default());
        let result = retriever
            .retrieve(&RetrievalRequest::new("g", 10_000))
            .unwrap();
        let paths: Vec<&str> = result.entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["src/g0.py", "src/g1.py", "src/g2.py"]);
    }
}
