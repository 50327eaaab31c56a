// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap
//!
//! Defines all command-line arguments and subcommands for ted-context.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::model::ChunkType;
use crate::retriever::{ExpansionKind, Relation};

/// ted-context - code context retrieval for your project
#[derive(Parser, Debug)]
#[command(name = "ted-context")]
#[command(version, about = "Index a project and retrieve budgeted code context")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Project directory (defaults to current)
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<PathBuf>,

    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chunk the project and rebuild the graph
    Build(BuildArgs),

    /// Retrieve context for a task description
    #[command(alias = "q")]
    Query(QueryArgs),

    /// Load a chunk and its neighbourhood
    Expand(ExpandArgs),

    /// List a chunk's direct neighbours by relation
    Related(RelatedArgs),

    /// Show chunk and edge counts
    Stats,
}

/// Arguments for the build subcommand
#[derive(clap::Args, Debug, Default)]
pub struct BuildArgs {
    /// Only re-chunk files whose content changed
    #[arg(short, long)]
    pub incremental: bool,
}

/// Arguments for the query subcommand
#[derive(clap::Args, Debug)]
pub struct QueryArgs {
    /// What you are working on
    pub task: String,

    /// Token budget (defaults to the configured budget)
    #[arg(short, long)]
    pub budget: Option<usize>,

    /// Finest compression level to use (0 = full, 3 = signature only)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=3))]
    pub level: Option<u8>,

    /// Symbol to seed from (repeatable)
    #[arg(short, long = "symbol")]
    pub symbols: Vec<String>,

    /// File to seed from (repeatable)
    #[arg(short, long = "path")]
    pub paths: Vec<String>,

    /// Leave test chunks out
    #[arg(long)]
    pub no_tests: bool,

    /// Chunk type to leave out (repeatable)
    #[arg(long = "exclude", value_parser = parse_chunk_type)]
    pub exclude: Vec<ChunkType>,

    /// Graph hops to expand (defaults to the configured limit)
    #[arg(long)]
    pub hops: Option<usize>,

    /// List commits that touched the included chunks
    #[arg(long)]
    pub history: bool,
}

/// Arguments for the expand subcommand
#[derive(clap::Args, Debug)]
pub struct ExpandArgs {
    /// Chunk id, as listed in a query result
    pub id: String,

    /// Graph hops to expand
    #[arg(long, default_value_t = 1)]
    pub hops: usize,

    /// Token budget (defaults to the configured budget)
    #[arg(short, long)]
    pub budget: Option<usize>,

    /// Edges to follow: all, dependencies, dependents or tests
    #[arg(short, long, default_value = "all", value_parser = parse_expansion_kind)]
    pub kind: ExpansionKind,
}

/// Arguments for the related subcommand
#[derive(clap::Args, Debug)]
pub struct RelatedArgs {
    /// Chunk id, as listed in a query result
    pub id: String,

    /// Relation to list (repeatable; all when omitted)
    #[arg(short, long = "relation", value_parser = parse_relation)]
    pub relations: Vec<Relation>,
}

fn parse_expansion_kind(value: &str) -> Result<ExpansionKind, String> {
    value.parse().map_err(|e: crate::error::ContextError| e.to_string())
}

fn parse_relation(value: &str) -> Result<Relation, String> {
    value.parse().map_err(|e: crate::error::ContextError| e.to_string())
}

fn parse_chunk_type(value: &str) -> Result<ChunkType, String> {
    value.parse().map_err(|e: crate::error::ContextError| e.to_string())
}

/// Output format for responses
#[derive(ValueEnum, Clone, Debug, Default, PartialEq)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Text,

    /// JSON output
    Json,

    /// Markdown output
    Markdown,
}
