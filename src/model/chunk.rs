// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! The chunk: an immutable, content-addressed unit of context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::{estimate_tokens, sha256_hex, Language};
use crate::error::ContextError;

/// Kind of content a chunk holds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    /// A whole source file.
    #[default]
    SourceFile,
    /// A function or method.
    Function,
    /// A class, struct, trait, interface or other type definition.
    Class,
    /// A test function or a whole test file.
    Test,
    /// An interface contract document.
    Contract,
    /// A configuration artifact.
    Config,
    /// Project metadata (package manifests).
    Metadata,
    /// A history entry.
    Commit,
    /// An inferred or documented business rule.
    BusinessRule,
    /// A point-in-time snapshot.
    Snapshot,
    /// A captured error.
    Error,
    /// A captured log excerpt.
    Log,
}

impl ChunkType {
    /// Every chunk type, in declaration order.
    pub const ALL: [ChunkType; 12] = [
        ChunkType::SourceFile,
        ChunkType::Function,
        ChunkType::Class,
        ChunkType::Test,
        ChunkType::Contract,
        ChunkType::Config,
        ChunkType::Metadata,
        ChunkType::Commit,
        ChunkType::BusinessRule,
        ChunkType::Snapshot,
        ChunkType::Error,
        ChunkType::Log,
    ];

    /// Stable name used for storage and ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::SourceFile => "source_file",
            ChunkType::Function => "function",
            ChunkType::Class => "class",
            ChunkType::Test => "test",
            ChunkType::Contract => "contract",
            ChunkType::Config => "config",
            ChunkType::Metadata => "metadata",
            ChunkType::Commit => "commit",
            ChunkType::BusinessRule => "business_rule",
            ChunkType::Snapshot => "snapshot",
            ChunkType::Error => "error",
            ChunkType::Log => "log",
        }
    }

    /// Ranking priority used to break score ties (higher first).
    pub fn priority(&self) -> u8 {
        match self {
            ChunkType::Contract | ChunkType::BusinessRule => 10,
            ChunkType::Function | ChunkType::Class => 9,
            ChunkType::Test => 8,
            ChunkType::Config => 7,
            ChunkType::Metadata => 6,
            ChunkType::SourceFile => 5,
            ChunkType::Snapshot => 4,
            ChunkType::Commit => 3,
            ChunkType::Error | ChunkType::Log => 2,
        }
    }

    /// Whether this type holds a code unit (file, function, class or test).
    pub fn is_code(&self) -> bool {
        matches!(
            self,
            ChunkType::SourceFile | ChunkType::Function | ChunkType::Class | ChunkType::Test
        )
    }

    /// Whether this type is a named symbol inside a file.
    pub fn is_symbol(&self) -> bool {
        matches!(
            self,
            ChunkType::Function | ChunkType::Class | ChunkType::Test
        )
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkType {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChunkType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ContextError::InvalidInput(format!("Unknown chunk type: {}", s)))
    }
}

/// Structured attributes captured at chunk time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkMetadata {
    /// Symbol name (function/class name, short commit hash).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// First line in the source file (1-indexed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    /// Last line in the source file (1-indexed, inclusive).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    /// Declaration text, possibly spanning several lines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Attached documentation text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    /// Enclosing class for methods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Names called from this unit.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub calls: Vec<String>,
    /// Base classes or implemented traits.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// RFC 3339 timestamp for history chunks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Paths touched by a history entry.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files_changed: Vec<String>,
    /// Anything else.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ChunkMetadata {
    /// Metadata with only a name set.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Parsed language, if recorded.
    pub fn language(&self) -> Language {
        self.language
            .as_deref()
            .map(Language::parse)
            .unwrap_or_default()
    }

    /// Line span if both ends are known.
    pub fn span(&self) -> Option<(u32, u32)> {
        match (self.start_line, self.end_line) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }
}

/// An indexed, immutable content unit.
///
/// The `id` is derived from `(path, type, name, content hash)`, so chunking
/// identical input always reproduces identical ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub chunk_type: ChunkType,
    pub content: String,
    /// Project-relative path, or a synthetic path for non-file chunks.
    pub path: String,
    pub feature: Option<String>,
    pub metadata: ChunkMetadata,
    pub token_estimate: usize,
    /// Hex SHA-256 of `content`.
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Chunk {
    /// Create a chunk, deriving its hash, id and token estimate.
    pub fn new(
        chunk_type: ChunkType,
        path: impl Into<String>,
        content: impl Into<String>,
        feature: Option<String>,
        metadata: ChunkMetadata,
    ) -> Self {
        let path = path.into();
        let content = content.into();
        let content_hash = sha256_hex(content.as_bytes());
        let qualified = match (&metadata.parent, &metadata.name) {
            (Some(parent), Some(name)) => Some(format!("{}.{}", parent, name)),
            (_, name) => name.clone(),
        };
        let id = Self::derive_id(chunk_type, &path, qualified.as_deref(), &content_hash);
        let token_estimate = estimate_tokens(&content);

        Self {
            id,
            chunk_type,
            content,
            path,
            feature,
            metadata,
            token_estimate,
            content_hash,
            created_at: Utc::now(),
        }
    }

    /// Compute the id for a `(type, path, name, content hash)` tuple.
    pub fn derive_id(
        chunk_type: ChunkType,
        path: &str,
        name: Option<&str>,
        content_hash: &str,
    ) -> String {
        let mut key = Vec::with_capacity(path.len() + content_hash.len() + 32);
        key.extend_from_slice(path.as_bytes());
        key.push(0);
        key.extend_from_slice(chunk_type.as_str().as_bytes());
        key.push(0);
        key.extend_from_slice(name.unwrap_or("").as_bytes());
        key.push(0);
        key.extend_from_slice(content_hash.as_bytes());
        let digest = sha256_hex(&key);

        match name {
            // Contracts are addressed by the feature they describe.
            Some(name) if chunk_type == ChunkType::Contract => {
                format!("{}:{}@{}", chunk_type, name, &digest[..12])
            }
            Some(name) => format!("{}:{}#{}@{}", chunk_type, path, name, &digest[..12]),
            None => format!("{}:{}@{}", chunk_type, path, &digest[..12]),
        }
    }

    /// Logical slot this chunk occupies: re-chunking the same slot with new
    /// content supersedes the previous occupant.
    pub fn slot(&self) -> String {
        match (&self.metadata.parent, &self.metadata.name) {
            (Some(parent), Some(name)) => {
                format!("{}|{}|{}.{}", self.chunk_type, self.path, parent, name)
            }
            (None, Some(name)) => format!("{}|{}|{}", self.chunk_type, self.path, name),
            (_, None) => format!("{}|{}", self.chunk_type, self.path),
        }
    }

    /// Symbol name, falling back to the file name for whole-file chunks.
    pub fn display_name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_else(|| {
            self.path
                .rsplit('/')
                .next()
                .filter(|s| !s.is_empty())
                .unwrap_or(&self.path)
        })
    }

    /// Whether `other` falls inside this chunk's line span in the same file.
    pub fn encloses(&self, other: &Chunk) -> bool {
        if self.path != other.path || self.id == other.id {
            return false;
        }
        match (self.metadata.span(), other.metadata.span()) {
            (Some((s0, e0)), Some((s1, e1))) => s0 <= s1 && e1 <= e0,
            (None, Some(_)) => self.chunk_type.is_code(),
            _ => false,
        }
    }
}

impl PartialEq for Chunk {
    // `created_at` is capture bookkeeping, not identity.
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.chunk_type == other.chunk_type
            && self.content == other.content
            && self.path == other.path
            && self.feature == other.feature
            && self.metadata == other.metadata
            && self.token_estimate == other.token_estimate
    }
}

impl Eq for Chunk {}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(path: &str, name: &str, content: &str) -> Chunk {
        Chunk::new(
            ChunkType::Function,
            path,
            content,
            None,
            ChunkMetadata::named(name),
        )
    }

    #[test]
    fn test_chunk_type_roundtrip() {
        for t in ChunkType::ALL {
            assert_eq!(t.as_str().parse::<ChunkType>().unwrap(), t);
        }
        assert!("nonsense".parse::<ChunkType>().is_err());
    }

    #[test]
    fn test_chunk_type_serde_names() {
        let json = serde_json::to_string(&ChunkType::BusinessRule).unwrap();
        assert_eq!(json, "\"business_rule\"");
    }

    #[test]
    fn test_priority_ordering() {
        assert!(ChunkType::Contract.priority() > ChunkType::Function.priority());
        assert!(ChunkType::SourceFile.priority() > ChunkType::Commit.priority());
    }

    #[test]
    fn test_id_is_deterministic() {
        let a = function("src/a.rs", "a", "fn a() {}");
        let b = function("src/a.rs", "a", "fn a() {}");
        assert_eq!(a.id, b.id);
        assert_eq!(a, b);
        assert!(a.id.starts_with("function:src/a.rs#a@"));
    }

    #[test]
    fn test_id_changes_with_content() {
        let a = function("src/a.rs", "a", "fn a() {}");
        let b = function("src/a.rs", "a", "fn a() { b() }");
        assert_ne!(a.id, b.id);
        assert_eq!(a.slot(), b.slot());
    }

    #[test]
    fn test_id_distinguishes_same_content_names() {
        let a = function("src/a.rs", "one", "fn x() {}");
        let b = function("src/a.rs", "two", "fn x() {}");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_contract_id_uses_feature() {
        let contract = Chunk::new(
            ChunkType::Contract,
            "contracts/auth.contract.md",
            "# Auth",
            Some("auth".to_string()),
            ChunkMetadata::named("auth"),
        );
        assert!(contract.id.starts_with("contract:auth@"));
    }

    #[test]
    fn test_methods_qualified_by_parent() {
        let mut one = ChunkMetadata::named("new");
        one.parent = Some("A".into());
        let mut two = ChunkMetadata::named("new");
        two.parent = Some("B".into());
        let a = Chunk::new(ChunkType::Function, "src/x.rs", "fn new() {}", None, one);
        let b = Chunk::new(ChunkType::Function, "src/x.rs", "fn new() {}", None, two);
        assert_ne!(a.id, b.id);
        assert_ne!(a.slot(), b.slot());
        assert!(a.id.starts_with("function:src/x.rs#A.new@"));
    }

    #[test]
    fn test_token_estimate() {
        let chunk = function("src/a.rs", "a", "0123456789");
        assert_eq!(chunk.token_estimate, 3);
    }

    #[test]
    fn test_encloses() {
        let file = Chunk::new(
            ChunkType::SourceFile,
            "src/a.rs",
            "fn a() {}\nfn b() {}\n",
            None,
            ChunkMetadata::default(),
        );
        let mut meta = ChunkMetadata::named("a");
        meta.start_line = Some(1);
        meta.end_line = Some(1);
        let func = Chunk::new(ChunkType::Function, "src/a.rs", "fn a() {}", None, meta);
        assert!(file.encloses(&func));
        assert!(!func.encloses(&file));

        let elsewhere = function("src/b.rs", "a", "fn a() {}");
        assert!(!file.encloses(&elsewhere));
    }

    #[test]
    fn test_display_name() {
        let file = Chunk::new(
            ChunkType::SourceFile,
            "src/lib.rs",
            "",
            None,
            ChunkMetadata::default(),
        );
        assert_eq!(file.display_name(), "lib.rs");
        assert_eq!(function("src/a.rs", "a", "x").display_name(), "a");
    }

    #[test]
    fn test_metadata_serializes_sparse() {
        let json = serde_json::to_string(&ChunkMetadata::named("a")).unwrap();
        assert_eq!(json, r#"{"name":"a"}"#);
        let back: ChunkMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name.as_deref(), Some("a"));
    }
}
