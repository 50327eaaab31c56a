// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! ted-context - index a project and retrieve budgeted code context
//!
//! Entry point for the ted-context CLI application.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use ted_context::cli::{Cli, Commands};
use ted_context::config::ContextConfig;
use ted_context::ContextSession;

#[path = "main/cli_commands.rs"]
mod cli_commands;

use cli_commands::{run_build, run_expand, run_query, run_related, run_stats};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    // `-v` turns on build and retrieval diagnostics; `RUST_LOG` still takes precedence.
    if cli.verbose > 0 {
        let directive = if cli.verbose > 1 {
            "ted_context=trace"
        } else {
            "ted_context=debug"
        };
        if let Ok(parsed) = directive.parse() {
            env_filter = env_filter.add_directive(parsed);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let root = match &cli.directory {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to resolve current directory")?,
    };
    let config = load_config(&root, cli.config.as_ref())?;

    let mut session = ContextSession::open(&root, config)
        .with_context(|| format!("Failed to open context store for {}", root.display()))?;

    match cli.command {
        Commands::Build(args) => run_build(&mut session, args, &cli.format)?,
        Commands::Query(args) => run_query(&session, args, &cli.format)?,
        Commands::Expand(args) => run_expand(&session, args, &cli.format)?,
        Commands::Related(args) => run_related(&session, args, &cli.format)?,
        Commands::Stats => run_stats(&session, &cli.format)?,
    }

    session.close()?;
    Ok(())
}

fn load_config(root: &std::path::Path, explicit: Option<&PathBuf>) -> Result<ContextConfig> {
    let config = match explicit {
        Some(path) => ContextConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ContextConfig::load(root)?,
    };
    Ok(config)
}
