// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Persistent chunk graph with full-text search.
//!
//! A [`Store`] owns one SQLite connection. Chunks are never updated in
//! place: a new chunk for an occupied `(type, path, name)` slot marks the
//! previous occupant `superseded_by` the new id, and superseded rows drop out
//! of every scan and of the search index. A build writes through
//! [`Store::write_batch`], which commits everything in one transaction so
//! readers on other connections see either the old or the new graph.

pub mod schema;
pub mod search;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use crate::error::{ContextError, Result};
use crate::model::{Chunk, ChunkType, Direction, Edge, EdgeType};

/// `superseded_by` marker for chunks whose file disappeared.
pub const DELETED: &str = "deleted";

const CHUNK_COLUMNS: &str =
    "id, chunk_type, path, feature, content, content_hash, metadata, token_estimate, created_at";

/// A ranked full-text match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub score: f64,
}

/// Counts over the live graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub chunks_by_type: BTreeMap<ChunkType, usize>,
    pub edges_by_type: BTreeMap<EdgeType, usize>,
    pub total_chunks: usize,
    pub total_edges: usize,
    pub superseded_chunks: usize,
}

/// Everything one build pass writes.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub chunks: Vec<Chunk>,
    pub edges: Vec<Edge>,
    /// Files that were re-chunked: live chunks at these paths that are not
    /// in `chunks` are superseded.
    pub replaced_paths: Vec<String>,
    /// Files that disappeared: every live chunk at these paths is superseded.
    pub removed_paths: Vec<String>,
    pub file_hashes: BTreeMap<String, String>,
    /// Treat `edges` as the complete edge set and drop stored edges not in it.
    pub replace_edges: bool,
}

/// What a batch changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub chunks_written: usize,
    pub chunks_superseded: usize,
    pub edges_written: usize,
    pub edges_removed: usize,
}

fn conversion_error(
    column: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
}

/// Parse a DateTime from a database RFC3339 string.
fn parse_datetime_from_db(timestamp: &str, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e))
}

fn chunk_from_row(row: &Row<'_>) -> rusqlite::Result<Chunk> {
    let chunk_type: String = row.get(1)?;
    let metadata: String = row.get(6)?;
    let token_estimate: i64 = row.get(7)?;
    let created_at: String = row.get(8)?;

    Ok(Chunk {
        id: row.get(0)?,
        chunk_type: chunk_type
            .parse()
            .map_err(|e: ContextError| conversion_error(1, e))?,
        path: row.get(2)?,
        feature: row.get(3)?,
        content: row.get(4)?,
        content_hash: row.get(5)?,
        metadata: serde_json::from_str(&metadata).map_err(|e| conversion_error(6, e))?,
        token_estimate: token_estimate.max(0) as usize,
        created_at: parse_datetime_from_db(&created_at, 8)?,
    })
}

fn edge_from_row(row: &Row<'_>) -> rusqlite::Result<Edge> {
    let edge_type: String = row.get(2)?;
    let metadata: String = row.get(3)?;
    Ok(Edge {
        from_id: row.get(0)?,
        to_id: row.get(1)?,
        edge_type: edge_type
            .parse()
            .map_err(|e: ContextError| conversion_error(2, e))?,
        metadata: serde_json::from_str(&metadata).map_err(|e| conversion_error(3, e))?,
    })
}

/// Mark a chunk superseded and drop it from the search index.
fn supersede(conn: &Connection, id: &str, by: &str) -> Result<()> {
    conn.execute(
        "UPDATE chunks SET superseded_by = ?2 WHERE id = ?1",
        params![id, by],
    )?;
    conn.execute("DELETE FROM postings WHERE chunk_id = ?1", [id])?;
    conn.execute("DELETE FROM doc_lengths WHERE chunk_id = ?1", [id])?;
    Ok(())
}

/// Add a chunk's terms to the search index.
fn index_chunk(conn: &Connection, chunk: &Chunk) -> Result<()> {
    let doc = search::document_terms(chunk);
    let mut stmt = conn.prepare_cached(
        "INSERT OR REPLACE INTO postings (term, chunk_id, tf, weight) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (term, stats) in &doc.terms {
        stmt.execute(params![term, chunk.id, stats.tf, stats.weight])?;
    }
    conn.execute(
        "INSERT OR REPLACE INTO doc_lengths (chunk_id, length) VALUES (?1, ?2)",
        params![chunk.id, doc.length as i64],
    )?;
    Ok(())
}

fn live_ids_in_slot(conn: &Connection, slot: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id FROM chunks WHERE slot = ?1 AND superseded_by IS NULL ORDER BY id",
    )?;
    let ids = stmt
        .query_map([slot], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(ids)
}

/// Supersede live chunks that share a slot with one of `chunks` but are not
/// themselves part of the write. Chunks written together never supersede each
/// other, so two units sharing a slot (say `fmt` in two impl blocks) both stay
/// live. Returns how many were superseded.
fn supersede_slots(conn: &Connection, chunks: &[Chunk]) -> Result<usize> {
    let incoming: BTreeSet<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
    let mut superseded = 0;
    for chunk in chunks {
        for old in live_ids_in_slot(conn, &chunk.slot())? {
            if !incoming.contains(old.as_str()) {
                supersede(conn, &old, &chunk.id)?;
                superseded += 1;
            }
        }
    }
    Ok(superseded)
}

/// Insert a chunk unless it is already live.
///
/// A previously superseded chunk with the same id is revived. Returns whether
/// anything was written.
fn insert_chunk(conn: &Connection, chunk: &Chunk) -> Result<bool> {
    let existing: Option<Option<String>> = conn
        .query_row(
            "SELECT superseded_by FROM chunks WHERE id = ?1",
            [&chunk.id],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(None) = existing {
        return Ok(false);
    }

    let slot = chunk.slot();
    if existing.is_some() {
        conn.execute(
            "UPDATE chunks SET superseded_by = NULL WHERE id = ?1",
            [&chunk.id],
        )?;
    } else {
        let metadata = serde_json::to_string(&chunk.metadata)?;
        conn.execute(
            "INSERT INTO chunks (id, chunk_type, path, name, slot, feature, content, content_hash,
                metadata, token_estimate, created_at, superseded_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, NULL)",
            params![
                chunk.id,
                chunk.chunk_type.as_str(),
                chunk.path,
                chunk.metadata.name,
                slot,
                chunk.feature,
                chunk.content,
                chunk.content_hash,
                metadata,
                chunk.token_estimate as i64,
                chunk.created_at.to_rfc3339(),
            ],
        )?;
    }

    index_chunk(conn, chunk)?;
    Ok(true)
}

fn insert_edge(conn: &Connection, edge: &Edge) -> Result<bool> {
    let metadata = serde_json::to_string(&edge.metadata)?;
    let changed = conn.execute(
        "INSERT OR IGNORE INTO edges (from_id, to_id, edge_type, metadata) VALUES (?1, ?2, ?3, ?4)",
        params![edge.from_id, edge.to_id, edge.edge_type.as_str(), metadata],
    )?;
    Ok(changed > 0)
}

/// SQLite-backed chunk graph.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a store at `path`, creating parent directories.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                ContextError::Storage(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        let conn = Connection::open(path)
            .map_err(|e| ContextError::Storage(format!("Failed to open chunk store: {}", e)))?;
        schema::init(&conn)?;
        tracing::debug!("Opened chunk store at {}", path.display());
        Ok(Self { conn })
    }

    /// Open a throwaway in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ContextError::Storage(format!("Failed to open chunk store: {}", e)))?;
        schema::init(&conn)?;
        Ok(Self { conn })
    }

    /// Close the connection, surfacing any error SQLite reports on close.
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| ContextError::Storage(format!("Failed to close chunk store: {}", e)))
    }

    /// Save one chunk, superseding the live occupant of its slot. Returns
    /// false if it was already stored and live.
    pub fn save_chunk(&mut self, chunk: &Chunk) -> Result<bool> {
        Ok(self.save_chunks(std::slice::from_ref(chunk))? > 0)
    }

    /// Save chunks in one transaction. Returns how many were written.
    ///
    /// Stored chunks that share a slot with an incoming chunk are superseded.
    /// Incoming chunks never supersede each other, the same rule
    /// [`Store::write_batch`] applies.
    pub fn save_chunks(&mut self, chunks: &[Chunk]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        supersede_slots(&tx, chunks)?;
        let mut written = 0;
        for chunk in chunks {
            if insert_chunk(&tx, chunk)? {
                written += 1;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    /// Insert edges, ignoring ones already stored. Returns how many were new.
    pub fn save_edges(&mut self, edges: &[Edge]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut written = 0;
        for edge in edges {
            if insert_edge(&tx, edge)? {
                written += 1;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    /// Apply a whole build pass atomically.
    ///
    /// Slot supersession follows [`Store::save_chunks`]: chunks in the batch
    /// supersede stored occupants of their slots but not each other.
    pub fn write_batch(&mut self, batch: &WriteBatch) -> Result<BatchSummary> {
        let tx = self.conn.transaction()?;
        let mut summary = BatchSummary::default();

        for path in &batch.removed_paths {
            let ids = live_ids_at(&tx, path)?;
            for id in &ids {
                supersede(&tx, id, DELETED)?;
            }
            summary.chunks_superseded += ids.len();
            tx.execute("DELETE FROM file_hashes WHERE path = ?1", [path])?;
        }

        if !batch.replaced_paths.is_empty() {
            let incoming: BTreeSet<&str> = batch.chunks.iter().map(|c| c.id.as_str()).collect();
            let by_slot: HashMap<String, &str> = batch
                .chunks
                .iter()
                .map(|c| (c.slot(), c.id.as_str()))
                .collect();

            for path in &batch.replaced_paths {
                for old in live_chunks_at(&tx, path)? {
                    if incoming.contains(old.id.as_str()) {
                        continue;
                    }
                    let by = by_slot.get(&old.slot()).copied().unwrap_or(DELETED);
                    supersede(&tx, &old.id, by)?;
                    summary.chunks_superseded += 1;
                }
            }
        }

        summary.chunks_superseded += supersede_slots(&tx, &batch.chunks)?;
        for chunk in &batch.chunks {
            if insert_chunk(&tx, chunk)? {
                summary.chunks_written += 1;
            }
        }

        if batch.replace_edges {
            let wanted: BTreeSet<(&str, &str, &str)> = batch
                .edges
                .iter()
                .map(|e| (e.from_id.as_str(), e.to_id.as_str(), e.edge_type.as_str()))
                .collect();
            let stored = {
                let mut stmt = tx.prepare("SELECT from_id, to_id, edge_type FROM edges")?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            };
            for (from, to, ty) in &stored {
                if !wanted.contains(&(from.as_str(), to.as_str(), ty.as_str())) {
                    tx.execute(
                        "DELETE FROM edges WHERE from_id = ?1 AND to_id = ?2 AND edge_type = ?3",
                        params![from, to, ty],
                    )?;
                    summary.edges_removed += 1;
                }
            }
        }

        for edge in &batch.edges {
            if insert_edge(&tx, edge)? {
                summary.edges_written += 1;
            }
        }

        for (path, hash) in &batch.file_hashes {
            tx.execute(
                "INSERT OR REPLACE INTO file_hashes (path, content_hash) VALUES (?1, ?2)",
                params![path, hash],
            )?;
        }

        tx.commit()?;
        tracing::debug!(
            "Batch wrote {} chunks, {} edges; superseded {} chunks, removed {} edges",
            summary.chunks_written,
            summary.edges_written,
            summary.chunks_superseded,
            summary.edges_removed
        );
        Ok(summary)
    }

    /// Fetch a chunk by id, live or superseded.
    pub fn get_chunk(&self, id: &str) -> Result<Option<Chunk>> {
        let sql = format!("SELECT {} FROM chunks WHERE id = ?1", CHUNK_COLUMNS);
        let chunk = self
            .conn
            .query_row(&sql, [id], chunk_from_row)
            .optional()?;
        Ok(chunk)
    }

    /// Fetch a chunk by id if it has not been superseded.
    pub fn get_live_chunk(&self, id: &str) -> Result<Option<Chunk>> {
        let sql = format!(
            "SELECT {} FROM chunks WHERE id = ?1 AND superseded_by IS NULL",
            CHUNK_COLUMNS
        );
        let chunk = self
            .conn
            .query_row(&sql, [id], chunk_from_row)
            .optional()?;
        Ok(chunk)
    }

    /// Fetch a chunk by id or fail with `NotFound`.
    pub fn require_chunk(&self, id: &str) -> Result<Chunk> {
        self.get_chunk(id)?
            .ok_or_else(|| ContextError::NotFound(format!("chunk {}", id)))
    }

    fn query_chunks(&self, filter: &str, args: &[&str]) -> Result<Vec<Chunk>> {
        let sql = format!(
            "SELECT {} FROM chunks WHERE superseded_by IS NULL {} ORDER BY path, id",
            CHUNK_COLUMNS, filter
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let chunks = stmt
            .query_map(params_from_iter(args.iter()), chunk_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(chunks)
    }

    /// Live chunks of one type.
    pub fn get_chunks_by_type(&self, chunk_type: ChunkType) -> Result<Vec<Chunk>> {
        self.query_chunks("AND chunk_type = ?1", &[chunk_type.as_str()])
    }

    /// Live chunks at a path.
    pub fn get_chunks_by_file(&self, path: &str) -> Result<Vec<Chunk>> {
        self.query_chunks("AND path = ?1", &[path])
    }

    /// Live chunks of a feature.
    pub fn get_chunks_by_feature(&self, feature: &str) -> Result<Vec<Chunk>> {
        self.query_chunks("AND feature = ?1", &[feature])
    }

    /// Every live chunk.
    pub fn live_chunks(&self) -> Result<Vec<Chunk>> {
        self.query_chunks("", &[])
    }

    /// Live functions, classes and tests with exactly this name.
    pub fn search_symbol(&self, name: &str) -> Result<Vec<Chunk>> {
        self.query_chunks(
            "AND name = ?1 AND chunk_type IN ('function', 'class', 'test')",
            &[name],
        )
    }

    /// Edges touching a chunk, ordered by `(from, to, type)`.
    pub fn get_edges(
        &self,
        chunk_id: &str,
        direction: Direction,
        edge_type: Option<EdgeType>,
    ) -> Result<Vec<Edge>> {
        let mut sql = String::from("SELECT from_id, to_id, edge_type, metadata FROM edges WHERE ");
        sql.push_str(match direction {
            Direction::Outgoing => "from_id = ?1",
            Direction::Incoming => "to_id = ?1",
            Direction::Both => "(from_id = ?1 OR to_id = ?1)",
        });
        let mut args = vec![chunk_id.to_string()];
        if let Some(edge_type) = edge_type {
            sql.push_str(" AND edge_type = ?2");
            args.push(edge_type.as_str().to_string());
        }
        sql.push_str(" ORDER BY from_id, to_id, edge_type");

        let mut stmt = self.conn.prepare(&sql)?;
        let edges = stmt
            .query_map(params_from_iter(args.iter()), edge_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
    }

    /// Rank live chunks against a free-text query with BM25.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let terms = search::query_terms(query);
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let (total_docs, avg_len): (i64, Option<f64>) = self.conn.query_row(
            "SELECT COUNT(*), AVG(length) FROM doc_lengths",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        if total_docs == 0 {
            return Ok(Vec::new());
        }
        let avg_len = avg_len.unwrap_or(1.0);

        let mut stmt = self.conn.prepare_cached(
            "SELECT p.chunk_id, p.tf, p.weight, d.length
             FROM postings p JOIN doc_lengths d ON d.chunk_id = p.chunk_id
             WHERE p.term = ?1",
        )?;

        let mut scores: HashMap<String, f64> = HashMap::new();
        for term in &terms {
            let rows = stmt
                .query_map([term], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            if rows.is_empty() {
                continue;
            }

            let idf = search::idf(total_docs as usize, rows.len());
            for (chunk_id, tf, weight, length) in rows {
                let stats = search::TermStats {
                    tf: tf.max(0) as u32,
                    weight,
                };
                *scores.entry(chunk_id).or_insert(0.0) +=
                    search::term_score(stats, length.max(0) as usize, avg_len, idf);
            }
        }

        let mut hits: Vec<SearchHit> = scores
            .into_iter()
            .map(|(chunk_id, score)| SearchHit { chunk_id, score })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    /// Hard-delete every chunk at a path with its edges and postings.
    pub fn delete_chunks_by_file(&mut self, path: &str) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let ids = {
            let mut stmt = tx.prepare("SELECT id FROM chunks WHERE path = ?1")?;
            let ids = stmt
                .query_map([path], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            ids
        };
        for id in &ids {
            tx.execute("DELETE FROM edges WHERE from_id = ?1 OR to_id = ?1", [id])?;
            tx.execute("DELETE FROM postings WHERE chunk_id = ?1", [id])?;
            tx.execute("DELETE FROM doc_lengths WHERE chunk_id = ?1", [id])?;
        }
        tx.execute("DELETE FROM chunks WHERE path = ?1", [path])?;
        tx.execute("DELETE FROM file_hashes WHERE path = ?1", [path])?;
        tx.commit()?;
        Ok(ids.len())
    }

    /// Content hash of every file recorded by the last build.
    pub fn file_hashes(&self) -> Result<HashMap<String, String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT path, content_hash FROM file_hashes")?;
        let hashes = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<HashMap<String, String>>>()?;
        Ok(hashes)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO graph_metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM graph_metadata WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Counts over live chunks and all edges.
    pub fn stats(&self) -> Result<StoreStats> {
        let mut stats = StoreStats::default();

        let mut stmt = self.conn.prepare(
            "SELECT chunk_type, COUNT(*) FROM chunks WHERE superseded_by IS NULL GROUP BY chunk_type",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for (name, count) in rows {
            let chunk_type: ChunkType = name.parse()?;
            stats.chunks_by_type.insert(chunk_type, count as usize);
            stats.total_chunks += count as usize;
        }

        let mut stmt = self
            .conn
            .prepare("SELECT edge_type, COUNT(*) FROM edges GROUP BY edge_type")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for (name, count) in rows {
            let edge_type: EdgeType = name.parse()?;
            stats.edges_by_type.insert(edge_type, count as usize);
            stats.total_edges += count as usize;
        }

        let superseded: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE superseded_by IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        stats.superseded_chunks = superseded as usize;

        Ok(stats)
    }
}

fn live_ids_at(conn: &Connection, path: &str) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare_cached("SELECT id FROM chunks WHERE path = ?1 AND superseded_by IS NULL ORDER BY id")?;
    let ids = stmt
        .query_map([path], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(ids)
}

fn live_chunks_at(conn: &Connection, path: &str) -> Result<Vec<Chunk>> {
    let sql = format!(
        "SELECT {} FROM chunks WHERE path = ?1 AND superseded_by IS NULL ORDER BY id",
        CHUNK_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let chunks = stmt
        .query_map([path], chunk_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChunkMetadata;
    use tempfile::TempDir;

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
    fn test_save_and_get_chunk() {
        let mut store = Store::open_in_memory().unwrap();
        let chunk = function("src/a.py", "login", "def login():\n    pass");
        assert!(store.save_chunk(&chunk).unwrap());
        // Re-saving is a no-op
        assert!(!store.save_chunk(&chunk).unwrap());

        let loaded = store.get_chunk(&chunk.id).unwrap().unwrap();
        assert_eq!(loaded, chunk);
        assert!(store.get_chunk("missing").unwrap().is_none());
        assert!(matches!(
            store.require_chunk("missing"),
            Err(ContextError::NotFound(_))
        ));
    }

    #[test]
    fn test_new_content_supersedes_slot() {
        let mut store = Store::open_in_memory().unwrap();
        let old = function("src/a.py", "login", "def login():\n    pass");
        let new = function("src/a.py", "login", "def login():\n    return True");
        store.save_chunk(&old).unwrap();
        store.save_chunk(&new).unwrap();

        let live = store.get_chunks_by_file("src/a.py").unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, new.id);

        // The old row is kept, but not searchable.
        assert!(store.get_chunk(&old.id).unwrap().is_some());
        let hits = store.search("pass", 10).unwrap();
        assert!(hits.is_empty());
        assert_eq!(store.stats().unwrap().superseded_chunks, 1);
    }

    #[test]
    fn test_superseded_chunk_is_revived() {
        let mut store = Store::open_in_memory().unwrap();
        let a = function("src/a.py", "f", "def f():\n    return 1");
        let b = function("src/a.py", "f", "def f():\n    return 2");
        store.save_chunk(&a).unwrap();
        store.save_chunk(&b).unwrap();
        assert!(store.save_chunk(&a).unwrap());

        let live = store.get_chunks_by_file("src/a.py").unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, a.id);
    }

    #[test]
    fn test_chunks_written_together_share_a_slot() {
        let display = |body: &str| {
            Chunk::new(
                ChunkType::Function,
                "src/fmt.rs",
                body,
                None,
                ChunkMetadata::named("fmt"),
            )
        };
        let first = display("fn fmt() { write!(f, \"a\") }");
        let second = display("fn fmt() { write!(f, \"b\") }");

        let mut saved = Store::open_in_memory().unwrap();
        assert_eq!(saved.save_chunks(&[first.clone(), second.clone()]).unwrap(), 2);

        let mut batched = Store::open_in_memory().unwrap();
        let summary = batched
            .write_batch(&WriteBatch {
                chunks: vec![first.clone(), second.clone()],
                ..Default::default()
            })
            .unwrap();
        assert_eq!(summary.chunks_written, 2);
        assert_eq!(summary.chunks_superseded, 0);

        for store in [&saved, &batched] {
            let live: BTreeSet<String> = store
                .get_chunks_by_file("src/fmt.rs")
                .unwrap()
                .into_iter()
                .map(|c| c.id)
                .collect();
            assert_eq!(live, [first.id.clone(), second.id.clone()].into_iter().collect());
        }

        // A later write still replaces both occupants.
        let third = display("fn fmt() { write!(f, \"c\") }");
        let summary = batched
            .write_batch(&WriteBatch {
                chunks: vec![third.clone()],
                ..Default::default()
            })
            .unwrap();
        assert_eq!(summary.chunks_superseded, 2);
        saved.save_chunk(&third).unwrap();
        for store in [&saved, &batched] {
            let live = store.get_chunks_by_file("src/fmt.rs").unwrap();
            assert_eq!(live.len(), 1);
            assert_eq!(live[0].id, third.id);
        }
    }

    #[test]
    fn test_edges_are_idempotent_and_directional() {
        let mut store = Store::open_in_memory().unwrap();
        let edges = vec![
            Edge::new("a", "b", EdgeType::Calls).with_meta("line", 3),
            Edge::new("c", "a", EdgeType::Imports),
        ];
        assert_eq!(store.save_edges(&edges).unwrap(), 2);
        assert_eq!(store.save_edges(&edges).unwrap(), 0);

        let out = store.get_edges("a", Direction::Outgoing, None).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to_id, "b");
        assert_eq!(out[0].metadata.get("line"), Some(&serde_json::json!(3)));

        let incoming = store.get_edges("a", Direction::Incoming, None).unwrap();
        assert_eq!(incoming[0].from_id, "c");

        let both = store.get_edges("a", Direction::Both, None).unwrap();
        assert_eq!(both.len(), 2);

        let calls_only = store
            .get_edges("a", Direction::Both, Some(EdgeType::Imports))
            .unwrap();
        assert_eq!(calls_only.len(), 1);
    }

    #[test]
    fn test_search_ranks_by_bm25() {
        let mut store = Store::open_in_memory().unwrap();
        let login = function("src/auth.py", "login", "def login(user):\n    return check_password(user)");
        let logout = function("src/auth.py", "logout", "def logout(user):\n    session.clear()");
        let other = function("src/math.py", "add", "def add(a, b):\n    return a + b");
        store
            .save_chunks(&[login.clone(), logout.clone(), other.clone()])
            .unwrap();

        let hits = store.search("login password", 10).unwrap();
        assert_eq!(hits[0].chunk_id, login.id);
        assert!(hits.iter().all(|h| h.chunk_id != other.id));

        assert!(store.search("", 10).unwrap().is_empty());
        assert!(store.search("zzzz", 10).unwrap().is_empty());
        assert_eq!(store.search("user", 1).unwrap().len(), 1);
    }

    #[test]
    fn test_search_matches_camel_case_parts() {
        let mut store = Store::open_in_memory().unwrap();
        let chunk = function("src/config.ts", "parseConfig", "function parseConfig() {}");
        store.save_chunk(&chunk).unwrap();
        let hits = store.search("parse", 5).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_search_symbol() {
        let mut store = Store::open_in_memory().unwrap();
        let a = function("src/a.py", "login", "def login(): pass");
        let file = Chunk::new(
            ChunkType::SourceFile,
            "src/login",
            "login",
            None,
            ChunkMetadata::default(),
        );
        store.save_chunks(&[a.clone(), file]).unwrap();
        let found = store.search_symbol("login").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, a.id);
    }

    #[test]
    fn test_write_batch_replaces_and_removes() {
        let mut store = Store::open_in_memory().unwrap();
        let a = function("src/a.py", "a", "def a(): pass");
        let b = function("src/a.py", "b", "def b(): pass");
        let c = function("src/c.py", "c", "def c(): pass");
        let mut hashes = BTreeMap::new();
        hashes.insert("src/a.py".to_string(), "h1".to_string());
        hashes.insert("src/c.py".to_string(), "h2".to_string());

        let first = store
            .write_batch(&WriteBatch {
                chunks: vec![a.clone(), b.clone(), c.clone()],
                edges: vec![Edge::new(&a.id, &b.id, EdgeType::Calls)],
                file_hashes: hashes,
                replace_edges: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(first.chunks_written, 3);
        assert_eq!(first.edges_written, 1);

        // a.py now only defines `a`; c.py is gone.
        let second = store
            .write_batch(&WriteBatch {
                chunks: vec![a.clone()],
                edges: Vec::new(),
                replaced_paths: vec!["src/a.py".to_string()],
                removed_paths: vec!["src/c.py".to_string()],
                replace_edges: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(second.chunks_written, 0);
        assert_eq!(second.chunks_superseded, 2);
        assert_eq!(second.edges_removed, 1);

        let live: Vec<String> = store.live_chunks().unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(live, vec![a.id.clone()]);
        assert!(!store.file_hashes().unwrap().contains_key("src/c.py"));
    }

    #[test]
    fn test_delete_chunks_by_file() {
        let mut store = Store::open_in_memory().unwrap();
        let a = function("src/a.py", "a", "def a(): pass");
        let b = function("src/b.py", "b", "def b(): pass");
        store.save_chunks(&[a.clone(), b.clone()]).unwrap();
        store
            .save_edges(&[Edge::new(&a.id, &b.id, EdgeType::Calls)])
            .unwrap();

        assert_eq!(store.delete_chunks_by_file("src/a.py").unwrap(), 1);
        assert!(store.get_chunk(&a.id).unwrap().is_none());
        assert!(store.get_edges(&b.id, Direction::Both, None).unwrap().is_empty());
        let hits = store.search("def", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, b.id);
    }

    #[test]
    fn test_metadata_and_stats() {
        let mut store = Store::open_in_memory().unwrap();
        store.set_metadata("last_build", "now").unwrap();
        assert_eq!(
            store.get_metadata("last_build").unwrap().as_deref(),
            Some("now")
        );
        assert!(store.get_metadata("missing").unwrap().is_none());

        store
            .save_chunks(&[
                function("src/a.py", "a", "def a(): pass"),
                Chunk::new(ChunkType::Config, "app.yaml", "x: 1", None, ChunkMetadata::default()),
            ])
            .unwrap();
        store
            .save_edges(&[Edge::new("x", "y", EdgeType::Calls)])
            .unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.total_chunks, 2);
        assert_eq!(stats.chunks_by_type.get(&ChunkType::Config), Some(&1));
        assert_eq!(stats.edges_by_type.get(&EdgeType::Calls), Some(&1));
        assert_eq!(stats.total_edges, 1);
    }

    #[test]
    fn test_open_on_disk_persists() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/context.db");
        let chunk = function("src/a.py", "a", "def a(): pass");
        {
            let mut store = Store::open(&path).unwrap();
            store.save_chunk(&chunk).unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert!(store.get_chunk(&chunk.id).unwrap().is_some());
    }

    #[test]
    fn test_open_failure_is_storage_error() {
        let temp = TempDir::new().unwrap();
        // A directory cannot be opened as a database file.
        let err = Store::open(temp.path()).err().unwrap();
        assert!(err.is_fatal());
    }
}
