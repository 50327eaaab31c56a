// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! ted-context - budgeted code context retrieval for local projects.
//!
//! A project is split into immutable, content-addressed chunks (files,
//! functions, classes, tests, contracts, configs, commits), linked into a
//! typed graph, stored in SQLite with a BM25 index, and served back under a
//! token budget with every omission accounted for.
//!
//! Architecture highlights:
//! - `chunker`: project walk, boundary detectors per language, git history
//! - `graph`: edge resolution (calls, imports, contains, tested_by, ...)
//! - `storage`: SQLite chunk graph with supersession and full-text search
//! - `compress`: four-level progressive disclosure with token estimates
//! - `retriever`: seed, expand, rank and budget-fill
//! - `session`: the project handle used by the `ted-context` binary

pub mod chunker;
pub mod cli;
pub mod compress;
pub mod config;
pub mod error;
pub mod graph;
pub mod model;
pub mod retriever;
pub mod session;
pub mod storage;

pub use error::{ContextError, Result};
pub use session::{BuildReport, ContextSession};
