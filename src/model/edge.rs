// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Typed, directed relationships between chunks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ContextError;

/// Kind of relationship an edge expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Calls,
    Imports,
    Inherits,
    Contains,
    TestedBy,
    Implements,
    Validates,
    ModifiedIn,
    PrecededBy,
    ConfiguredBy,
    FailedAt,
}

impl EdgeType {
    pub const ALL: [EdgeType; 11] = [
        EdgeType::Calls,
        EdgeType::Imports,
        EdgeType::Inherits,
        EdgeType::Contains,
        EdgeType::TestedBy,
        EdgeType::Implements,
        EdgeType::Validates,
        EdgeType::ModifiedIn,
        EdgeType::PrecededBy,
        EdgeType::ConfiguredBy,
        EdgeType::FailedAt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Calls => "calls",
            EdgeType::Imports => "imports",
            EdgeType::Inherits => "inherits",
            EdgeType::Contains => "contains",
            EdgeType::TestedBy => "tested_by",
            EdgeType::Implements => "implements",
            EdgeType::Validates => "validates",
            EdgeType::ModifiedIn => "modified_in",
            EdgeType::PrecededBy => "preceded_by",
            EdgeType::ConfiguredBy => "configured_by",
            EdgeType::FailedAt => "failed_at",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeType {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EdgeType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ContextError::InvalidInput(format!("Unknown edge type: {}", s)))
    }
}

/// Which side of a chunk's edges to traverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Edges whose `from_id` is the chunk.
    Outgoing,
    /// Edges whose `to_id` is the chunk.
    Incoming,
    Both,
}

/// A directed, typed link between two chunk ids.
///
/// Identity is `(from_id, to_id, edge_type)`; metadata does not participate
/// in ordering so duplicate edges collapse regardless of call-site detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from_id: String,
    pub to_id: String,
    pub edge_type: EdgeType,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Edge {
    /// Create an edge without metadata.
    pub fn new(from_id: impl Into<String>, to_id: impl Into<String>, edge_type: EdgeType) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
            edge_type,
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata value.
    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// The identity triple.
    pub fn key(&self) -> (&str, &str, EdgeType) {
        (&self.from_id, &self.to_id, self.edge_type)
    }

    /// The chunk on the other side of this edge from `chunk_id`.
    pub fn other_end(&self, chunk_id: &str) -> &str {
        if self.from_id == chunk_id {
            &self.to_id
        } else {
            &self.from_id
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_type_roundtrip() {
        for t in EdgeType::ALL {
            assert_eq!(t.as_str().parse::<EdgeType>().unwrap(), t);
        }
        assert!("linked".parse::<EdgeType>().is_err());
    }

    #[test]
    fn test_edge_key_ignores_metadata() {
        let a = Edge::new("x", "y", EdgeType::Calls).with_meta("line", 3);
        let b = Edge::new("x", "y", EdgeType::Calls);
        assert_eq!(a.key(), b.key());
        assert_ne!(a, b);
    }

    #[test]
    fn test_other_end() {
        let edge = Edge::new("x", "y", EdgeType::Contains);
        assert_eq!(edge.other_end("x"), "y");
        assert_eq!(edge.other_end("y"), "x");
    }

    #[test]
    fn test_edge_serde() {
        let edge = Edge::new("x", "y", EdgeType::TestedBy);
        let json = serde_json::to_string(&edge).unwrap();
        assert!(json.contains("\"tested_by\""));
        assert!(!json.contains("metadata"));
    }
}
