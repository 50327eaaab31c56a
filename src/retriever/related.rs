// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Typed neighbourhood lookups: which edges an expansion follows and which
//! relation a one-hop lookup asks for.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{ContextError, Result};
use crate::model::{Chunk, ChunkType, Direction, Edge, EdgeType};
use crate::storage::Store;

/// Which edges `expand` follows from each reached chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionKind {
    /// Every edge, both directions.
    #[default]
    All,
    /// Outgoing edges: what the chunk uses.
    Dependencies,
    /// Incoming edges: what uses the chunk.
    Dependents,
    /// `tested_by` edges only.
    Tests,
}

impl ExpansionKind {
    pub const ALL: [ExpansionKind; 4] = [
        ExpansionKind::All,
        ExpansionKind::Dependencies,
        ExpansionKind::Dependents,
        ExpansionKind::Tests,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpansionKind::All => "all",
            ExpansionKind::Dependencies => "dependencies",
            ExpansionKind::Dependents => "dependents",
            ExpansionKind::Tests => "tests",
        }
    }

    /// Edge direction and optional type filter for one traversal step.
    pub fn edge_filter(&self) -> (Direction, Option<EdgeType>) {
        match self {
            ExpansionKind::All => (Direction::Both, None),
            ExpansionKind::Dependencies => (Direction::Outgoing, None),
            ExpansionKind::Dependents => (Direction::Incoming, None),
            ExpansionKind::Tests => (Direction::Outgoing, Some(EdgeType::TestedBy)),
        }
    }
}

impl fmt::Display for ExpansionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpansionKind {
    type Err = ContextError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ContextError::InvalidInput(format!("Unknown expansion kind: {}", s)))
    }
}

/// A named one-hop relation between chunks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Tests,
    Dependencies,
    Dependents,
    Imports,
    ImportedBy,
    Commits,
    Rules,
    Contracts,
    Contains,
    ContainedBy,
}

impl Relation {
    pub const ALL: [Relation; 10] = [
        Relation::Tests,
        Relation::Dependencies,
        Relation::Dependents,
        Relation::Imports,
        Relation::ImportedBy,
        Relation::Commits,
        Relation::Rules,
        Relation::Contracts,
        Relation::Contains,
        Relation::ContainedBy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Tests => "tests",
            Relation::Dependencies => "dependencies",
            Relation::Dependents => "dependents",
            Relation::Imports => "imports",
            Relation::ImportedBy => "imported_by",
            Relation::Commits => "commits",
            Relation::Rules => "rules",
            Relation::Contracts => "contracts",
            Relation::Contains => "contains",
            Relation::ContainedBy => "contained_by",
        }
    }

    /// The edge type this relation reads and the side the chunk is on.
    pub fn edge(&self) -> (EdgeType, Direction) {
        match self {
            Relation::Tests => (EdgeType::TestedBy, Direction::Outgoing),
            Relation::Dependencies => (EdgeType::Calls, Direction::Outgoing),
            Relation::Dependents => (EdgeType::Calls, Direction::Incoming),
            Relation::Imports => (EdgeType::Imports, Direction::Outgoing),
            Relation::ImportedBy => (EdgeType::Imports, Direction::Incoming),
            Relation::Commits => (EdgeType::ModifiedIn, Direction::Outgoing),
            Relation::Rules => (EdgeType::Validates, Direction::Incoming),
            Relation::Contracts => (EdgeType::Implements, Direction::Outgoing),
            Relation::Contains => (EdgeType::Contains, Direction::Outgoing),
            Relation::ContainedBy => (EdgeType::Contains, Direction::Incoming),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relation {
    type Err = ContextError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| ContextError::InvalidInput(format!("Unknown relation: {}", s)))
    }
}

/// Summary of a chunk found through a relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedChunk {
    pub chunk_id: String,
    pub chunk_type: ChunkType,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub token_estimate: usize,
}

impl From<Chunk> for RelatedChunk {
    fn from(chunk: Chunk) -> Self {
        Self {
            chunk_id: chunk.id,
            chunk_type: chunk.chunk_type,
            path: chunk.path,
            name: chunk.metadata.name,
            token_estimate: chunk.token_estimate,
        }
    }
}

/// Chunks one hop from `chunk_id` for each relation in `relations`
/// (every relation when empty). Relations with no live neighbour are left out.
pub fn find_related(
    store: &Store,
    chunk_id: &str,
    relations: &[Relation],
) -> Result<BTreeMap<Relation, Vec<RelatedChunk>>> {
    store.require_chunk(chunk_id)?;
    let wanted: &[Relation] = if relations.is_empty() {
        &Relation::ALL
    } else {
        relations
    };

    let mut found = BTreeMap::new();
    for relation in wanted {
        let (edge_type, direction) = relation.edge();
        let mut chunks = Vec::new();
        for edge in store.get_edges(chunk_id, direction, Some(edge_type))? {
            if let Some(chunk) = store.get_live_chunk(edge.other_end(chunk_id))? {
                chunks.push(RelatedChunk::from(chunk));
            }
        }
        if !chunks.is_empty() {
            found.insert(*relation, chunks);
        }
    }
    Ok(found)
}

/// Other end of each `edge_type` edge on `direction` of the given chunks, sorted and deduplicated.
pub(crate) fn neighbours_of<'a>(
    store: &Store,
    chunk_ids: impl IntoIterator<Item = &'a str>,
    edge_type: EdgeType,
    direction: Direction,
    keep: impl Fn(&Edge) -> bool,
) -> Result<Vec<String>> {
    let mut ids = std::collections::BTreeSet::new();
    for chunk_id in chunk_ids {
        for edge in store.get_edges(chunk_id, direction, Some(edge_type))? {
            if keep(&edge) {
                ids.insert(edge.other_end(chunk_id).to_string());
            }
        }
    }
    Ok(ids.into_iter().collect())
}
