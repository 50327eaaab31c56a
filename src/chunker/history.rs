// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Commit history as chunks.
//!
//! Each commit reachable from HEAD becomes one `commit` chunk whose content
//! is the message plus the list of changed files.

use chrono::{TimeZone, Utc};
use git2::{ErrorCode, Repository, RepositoryOpenFlags, Sort};
use std::path::{Path, PathBuf};

use crate::error::{ContextError, Result};
use crate::model::{Chunk, ChunkMetadata, ChunkType};

/// Synthetic path prefix for commit chunks.
pub const COMMIT_PATH_PREFIX: &str = ".git/commits/";

/// Reads commit history from a git repository.
pub struct HistoryReader {
    repo: Repository,
    /// Project root relative to the repository work dir ("" when equal).
    prefix: PathBuf,
}

impl HistoryReader {
    /// Open the repository containing `project_root`.
    pub fn open(project_root: &Path) -> Result<Self> {
        Self::open_within(project_root, &[])?.ok_or_else(|| {
            ContextError::Git(format!("Not a git repository: {}", project_root.display()))
        })
    }

    /// Open the repository containing `project_root` without searching at or
    /// above any of `ceilings`. `None` when there is no repository.
    fn open_within(project_root: &Path, ceilings: &[&Path]) -> Result<Option<Self>> {
        let repo = match Repository::open_ext(
            project_root,
            RepositoryOpenFlags::empty(),
            ceilings.iter().copied(),
        ) {
            Ok(repo) => repo,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => {
                return Err(ContextError::Git(format!(
                    "Failed to open git repository: {}",
                    e
                )))
            }
        };

        let workdir = repo
            .workdir()
            .ok_or_else(|| ContextError::Git("Bare repositories not supported".into()))?
            .to_path_buf();

        let workdir = workdir.canonicalize().unwrap_or(workdir);
        let root = project_root
            .canonicalize()
            .unwrap_or_else(|_| project_root.to_path_buf());
        let prefix = root
            .strip_prefix(&workdir)
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(Some(Self { repo, prefix }))
    }

    /// Produce up to `max_commits` commit chunks, newest first.
    pub fn commit_chunks(&self, max_commits: usize) -> Result<Vec<Chunk>> {
        let mut revwalk = self
            .repo
            .revwalk()
            .map_err(|e| ContextError::Git(format!("Failed to create revwalk: {}", e)))?;

        // An empty repository has no HEAD
        if revwalk.push_head().is_err() {
            return Ok(Vec::new());
        }
        revwalk.set_sorting(Sort::TIME).ok();

        let mut chunks = Vec::new();
        for oid in revwalk.flatten().take(max_commits) {
            let commit = match self.repo.find_commit(oid) {
                Ok(c) => c,
                Err(_) => continue,
            };

            let files = self.changed_files(&commit);
            let hash = oid.to_string();
            let short = hash[..8.min(hash.len())].to_string();
            let message = commit.message().unwrap_or("").trim().to_string();

            let mut content = message;
            if !files.is_empty() {
                content.push_str("\n\nFiles:\n");
                for file in &files {
                    content.push_str("- ");
                    content.push_str(file);
                    content.push('\n');
                }
            }

            let mut metadata = ChunkMetadata::named(&short);
            let author = commit.author();
            metadata.author = match (author.name(), author.email()) {
                (Some(name), Some(email)) => Some(format!("{} <{}>", name, email)),
                (Some(name), None) => Some(name.to_string()),
                (None, Some(email)) => Some(email.to_string()),
                (None, None) => None,
            };
            metadata.timestamp = Utc
                .timestamp_opt(commit.time().seconds(), 0)
                .single()
                .map(|dt| dt.to_rfc3339());
            metadata.files_changed = files;
            metadata
                .extra
                .insert("hash".to_string(), serde_json::Value::String(hash));

            chunks.push(Chunk::new(
                ChunkType::Commit,
                format!("{}{}", COMMIT_PATH_PREFIX, short),
                content,
                None,
                metadata,
            ));
        }

        tracing::debug!("Read {} commits", chunks.len());
        Ok(chunks)
    }

    /// Project-relative paths touched by a commit, compared to its first parent.
    fn changed_files(&self, commit: &git2::Commit) -> Vec<String> {
        let tree = match commit.tree() {
            Ok(t) => t,
            Err(_) => return Vec::new(),
        };
        let parent_tree = commit.parent(0).ok().and_then(|p| p.tree().ok());

        let diff = match self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)
        {
            Ok(d) => d,
            Err(_) => return Vec::new(),
        };

        let mut files = Vec::new();
        diff.foreach(
            &mut |delta, _| {
                let path = delta.new_file().path().or_else(|| delta.old_file().path());
                if let Some(relative) = path.and_then(|p| p.strip_prefix(&self.prefix).ok()) {
                    files.push(relative.to_string_lossy().replace('\\', "/"));
                }
                true
            },
            None,
            None,
            None,
        )
        .ok();

        files.sort();
        files.dedup();
        files
    }
}

/// Commit chunks for a project, or none when it is not a git repository.
pub fn read_history(project_root: &Path, max_commits: usize) -> Result<Vec<Chunk>> {
    read_history_within(project_root, max_commits, &[])
}

fn read_history_within(
    project_root: &Path,
    max_commits: usize,
    ceilings: &[&Path],
) -> Result<Vec<Chunk>> {
    match HistoryReader::open_within(project_root, ceilings)? {
        Some(reader) => reader.commit_chunks(max_commits),
        None => {
            tracing::debug!("No git repository at {}", project_root.display());
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;
    use std::fs;
    use tempfile::TempDir;

    fn commit_file(repo: &Repository, dir: &Path, name: &str, body: &str, message: &str, when: i64) {
        fs::write(dir.join(name), body).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = Signature::new("Dev", "dev@example.com", &git2::Time::new(when, 0)).unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap();
    }

    #[test]
    fn test_not_a_repository_yields_nothing() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("project");
        fs::create_dir_all(&project).unwrap();

        // Stop the search at the temp dir so an enclosing checkout is not found.
        let chunks = read_history_within(&project, 10, &[temp.path()]).unwrap();
        assert!(chunks.is_empty());
        assert!(HistoryReader::open_within(&project, &[temp.path()])
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_commit_chunks() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        commit_file(&repo, temp.path(), "a.py", "def a():\n    pass\n", "Add a", 1_700_000_000);
        commit_file(&repo, temp.path(), "b.py", "def b():\n    pass\n", "Add b", 1_700_000_100);

        let reader = HistoryReader::open(temp.path()).unwrap();
        let chunks = reader.commit_chunks(10).unwrap();
        assert_eq!(chunks.len(), 2);

        let newest = &chunks[0];
        assert_eq!(newest.chunk_type, ChunkType::Commit);
        assert!(newest.path.starts_with(COMMIT_PATH_PREFIX));
        assert!(newest.content.starts_with("Add b"));
        assert_eq!(newest.metadata.files_changed, vec!["b.py".to_string()]);
        assert_eq!(
            newest.metadata.author.as_deref(),
            Some("Dev <dev@example.com>")
        );
        assert!(newest.metadata.timestamp.is_some());
        assert!(newest.metadata.extra.contains_key("hash"));

        assert_eq!(chunks[1].metadata.files_changed, vec!["a.py".to_string()]);
    }

    #[test]
    fn test_max_commits_limits_walk() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        commit_file(&repo, temp.path(), "a.txt", "1", "one", 1_700_000_000);
        commit_file(&repo, temp.path(), "a.txt", "2", "two", 1_700_000_100);
        commit_file(&repo, temp.path(), "a.txt", "3", "three", 1_700_000_200);

        let reader = HistoryReader::open(temp.path()).unwrap();
        assert_eq!(reader.commit_chunks(2).unwrap().len(), 2);
    }

    #[test]
    fn test_empty_repository() {
        let temp = TempDir::new().unwrap();
        Repository::init(temp.path()).unwrap();
        let reader = HistoryReader::open(temp.path()).unwrap();
        assert!(reader.commit_chunks(10).unwrap().is_empty());
    }
}
