// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Project session: the handle that ties chunking, graph building, storage
//! and retrieval together for one project root.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::chunker::{Chunker, SkipReason};
use crate::compress::{CompressionLevel, Compressor};
use crate::config::ContextConfig;
use crate::error::Result;
use crate::graph::{GraphBuilder, GraphStats};
use crate::model::Chunk;
use crate::retriever::{
    ExpansionKind, Hints, RelatedChunk, Relation, RetrievalRequest, RetrievalResult, Retriever,
};
use crate::storage::{Store, StoreStats, WriteBatch};

/// Metadata key holding the time of the last completed build.
pub const LAST_BUILD_KEY: &str = "last_build";

/// What a build changed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub chunks_written: usize,
    pub chunks_superseded: usize,
    pub edges_written: usize,
    pub edges_removed: usize,
    pub files_scanned: usize,
    pub files_changed: usize,
    pub files_removed: usize,
    pub skipped: Vec<(String, SkipReason)>,
    pub unresolved_references: usize,
    pub graph: GraphStats,
    pub duration: Duration,
}

/// An open project.
pub struct ContextSession {
    root: PathBuf,
    config: ContextConfig,
    store: Store,
    chunker: Chunker,
    graph: GraphBuilder,
}

impl ContextSession {
    /// Open the store for `project_root`, creating it if needed.
    pub fn open(project_root: impl AsRef<Path>, config: ContextConfig) -> Result<Self> {
        config.validate()?;
        let root = project_root.as_ref().to_path_buf();
        let store = Store::open(config.storage_path(&root))?;
        let chunker = Chunker::new(config.chunker.clone())?;
        Ok(Self {
            root,
            config,
            store,
            chunker,
            graph: GraphBuilder::new(),
        })
    }

    /// Open with the project's configuration file, if any.
    pub fn open_default(project_root: impl AsRef<Path>) -> Result<Self> {
        let config = ContextConfig::load(project_root.as_ref())?;
        Self::open(project_root, config)
    }

    pub fn close(self) -> Result<()> {
        self.store.close()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Chunk the project, rebuild the graph and commit both atomically.
    ///
    /// In incremental mode only files whose content hash changed are
    /// re-chunked. Either way, files that disappeared since the last build
    /// are superseded and the graph is rebuilt over every live chunk.
    pub fn build(&mut self, incremental: bool) -> Result<BuildReport> {
        let start = Instant::now();
        let stored = self.store.file_hashes()?;
        let previous = if incremental {
            stored.clone()
        } else {
            HashMap::new()
        };

        let run = self.chunker.chunk_project(&self.root, &previous)?;

        let mut removed: Vec<String> = stored
            .keys()
            .filter(|path| !run.hashes.contains_key(*path))
            .cloned()
            .collect();
        removed.sort();
        let replaced: Vec<String> = run.files.iter().map(|f| f.path.clone()).collect();

        let new_chunks: Vec<Chunk> = run.chunks().cloned().collect();
        let graph_input = self.graph_input(&new_chunks, &replaced, &removed)?;
        let graph = self.graph.build(&graph_input);

        let batch = WriteBatch {
            chunks: new_chunks,
            edges: graph.edges,
            replaced_paths: replaced,
            removed_paths: removed.clone(),
            file_hashes: run.hashes.clone(),
            replace_edges: true,
        };
        let summary = self.store.write_batch(&batch)?;
        self.store
            .set_metadata(LAST_BUILD_KEY, &chrono::Utc::now().to_rfc3339())?;

        let report = BuildReport {
            chunks_written: summary.chunks_written,
            chunks_superseded: summary.chunks_superseded,
            edges_written: summary.edges_written,
            edges_removed: summary.edges_removed,
            files_scanned: run.files.len() + run.unchanged.len(),
            files_changed: run.files.len(),
            files_removed: removed.len(),
            skipped: run.skipped,
            unresolved_references: graph.stats.unresolved_references(),
            graph: graph.stats,
            duration: start.elapsed(),
        };

        tracing::info!(
            "Built {}: {} files scanned, {} changed, {} removed, {} chunks and {} edges written in {:?}",
            self.root.display(),
            report.files_scanned,
            report.files_changed,
            report.files_removed,
            report.chunks_written,
            report.edges_written,
            report.duration
        );
        Ok(report)
    }

    /// The live chunk set as it will be after this build commits.
    fn graph_input(
        &self,
        new_chunks: &[Chunk],
        replaced: &[String],
        removed: &[String],
    ) -> Result<Vec<Chunk>> {
        let dropped: BTreeSet<&str> = replaced
            .iter()
            .chain(removed.iter())
            .map(String::as_str)
            .collect();

        let mut chunks: Vec<Chunk> = self
            .store
            .live_chunks()?
            .into_iter()
            .filter(|c| !dropped.contains(c.path.as_str()))
            .collect();
        chunks.extend(new_chunks.iter().cloned());
        Ok(chunks)
    }

    fn retriever(&self) -> Retriever<'_> {
        Retriever::new(&self.store, self.config.retrieval.clone())
            .with_compressor(Compressor::new(self.config.chunker.fallback_lines))
    }

    /// Retrieve context for a task description.
    pub fn retrieve(
        &self,
        task: &str,
        hints: Hints,
        token_budget: usize,
        compression_default: CompressionLevel,
    ) -> Result<RetrievalResult> {
        let request = RetrievalRequest::new(task, token_budget)
            .with_hints(hints)
            .with_level(compression_default);
        self.retrieve_request(&request)
    }

    pub fn retrieve_request(&self, request: &RetrievalRequest) -> Result<RetrievalResult> {
        self.retriever().retrieve(request)
    }

    /// Expand around a chunk along every edge, with the configured default budget.
    pub fn expand(&self, chunk_id: &str, hop_limit: usize) -> Result<RetrievalResult> {
        self.expand_with_budget(
            chunk_id,
            hop_limit,
            self.config.retrieval.default_budget,
            ExpansionKind::All,
        )
    }

    pub fn expand_with_budget(
        &self,
        chunk_id: &str,
        hop_limit: usize,
        token_budget: usize,
        kind: ExpansionKind,
    ) -> Result<RetrievalResult> {
        self.retriever().expand(chunk_id, hop_limit, token_budget, kind)
    }

    /// One-hop neighbours of a chunk by relation; every relation when `relations` is empty.
    pub fn related(
        &self,
        chunk_id: &str,
        relations: &[Relation],
    ) -> Result<BTreeMap<Relation, Vec<RelatedChunk>>> {
        self.retriever().related(chunk_id, relations)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.store.stats()
    }
}
