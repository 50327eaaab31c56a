// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! SQLite schema for the chunk graph.

use rusqlite::Connection;
use std::time::Duration;

use crate::error::{ContextError, Result};

/// Schema version recorded in `graph_metadata`.
pub const SCHEMA_VERSION: &str = "1";

const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    chunk_type TEXT NOT NULL,
    path TEXT NOT NULL,
    name TEXT,
    slot TEXT NOT NULL,
    feature TEXT,
    content TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    metadata TEXT NOT NULL,
    token_estimate INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    superseded_by TEXT
);
CREATE INDEX IF NOT EXISTS idx_chunks_path ON chunks(path);
CREATE INDEX IF NOT EXISTS idx_chunks_type ON chunks(chunk_type);
CREATE INDEX IF NOT EXISTS idx_chunks_feature ON chunks(feature);
CREATE INDEX IF NOT EXISTS idx_chunks_name ON chunks(name);
CREATE INDEX IF NOT EXISTS idx_chunks_slot ON chunks(slot);

CREATE TABLE IF NOT EXISTS edges (
    from_id TEXT NOT NULL,
    to_id TEXT NOT NULL,
    edge_type TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    PRIMARY KEY (from_id, to_id, edge_type)
);
CREATE INDEX IF NOT EXISTS idx_edges_to ON edges(to_id);

CREATE TABLE IF NOT EXISTS postings (
    term TEXT NOT NULL,
    chunk_id TEXT NOT NULL,
    tf INTEGER NOT NULL,
    weight REAL NOT NULL,
    PRIMARY KEY (term, chunk_id)
);
CREATE INDEX IF NOT EXISTS idx_postings_chunk ON postings(chunk_id);

CREATE TABLE IF NOT EXISTS doc_lengths (
    chunk_id TEXT PRIMARY KEY,
    length INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS file_hashes (
    path TEXT PRIMARY KEY,
    content_hash TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS graph_metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

/// Configure the connection and create any missing tables.
pub fn init(conn: &Connection) -> Result<()> {
    // journal_mode returns the resulting mode as a row
    conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
        .map_err(|e| ContextError::Storage(format!("Failed to enable WAL: {}", e)))?;
    conn.execute_batch("PRAGMA foreign_keys = OFF; PRAGMA synchronous = NORMAL;")
        .map_err(|e| ContextError::Storage(format!("Failed to configure connection: {}", e)))?;
    conn.busy_timeout(Duration::from_secs(5))
        .map_err(|e| ContextError::Storage(format!("Failed to set busy timeout: {}", e)))?;

    conn.execute_batch(CREATE_TABLES)
        .map_err(|e| ContextError::Storage(format!("Failed to create schema: {}", e)))?;

    conn.execute(
        "INSERT OR IGNORE INTO graph_metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION],
    )
    .map_err(|e| ContextError::Storage(format!("Failed to record schema version: {}", e)))?;

    Ok(())
}
