// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use anyhow::Result;

use ted_context::cli::{BuildArgs, ExpandArgs, OutputFormat, QueryArgs, RelatedArgs};
use ted_context::compress::CompressionLevel;
use ted_context::retriever::{Hints, RetrievalRequest, RetrievalResult};
use ted_context::session::LAST_BUILD_KEY;
use ted_context::{BuildReport, ContextSession};

pub(super) fn run_build(
    session: &mut ContextSession,
    args: BuildArgs,
    format: &OutputFormat,
) -> Result<()> {
    let report = session.build(args.incremental)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text | OutputFormat::Markdown => print_build_report(&report, format),
    }
    Ok(())
}

fn print_build_report(report: &BuildReport, format: &OutputFormat) {
    let rows = [
        ("Files scanned", report.files_scanned),
        ("Files changed", report.files_changed),
        ("Files removed", report.files_removed),
        ("Files skipped", report.skipped.len()),
        ("Chunks written", report.chunks_written),
        ("Chunks superseded", report.chunks_superseded),
        ("Edges written", report.edges_written),
        ("Edges removed", report.edges_removed),
        ("Unresolved references", report.unresolved_references),
    ];

    if *format == OutputFormat::Markdown {
        println!("| | |\n|---|---:|");
        for (label, value) in rows {
            println!("| {} | {} |", label, value);
        }
        return;
    }

    println!("\nBuild finished in {:.2?}", report.duration);
    println!("─────────────────────────────────────");
    for (label, value) in rows {
        println!("  {:<24}{}", format!("{}:", label), value);
    }
    for (path, reason) in &report.skipped {
        println!("  skipped {} ({})", path, reason);
    }
    println!("─────────────────────────────────────\n");
}

pub(super) fn run_query(
    session: &ContextSession,
    args: QueryArgs,
    format: &OutputFormat,
) -> Result<()> {
    let retrieval = &session.config().retrieval;
    let level = CompressionLevel::try_from(args.level.unwrap_or(retrieval.default_level))?;
    let hints = Hints {
        symbols: args.symbols,
        paths: args.paths,
        include_tests: !args.no_tests,
        exclude_types: args.exclude,
        include_history: args.history,
    };

    let mut request = RetrievalRequest::new(args.task, args.budget.unwrap_or(retrieval.default_budget))
        .with_hints(hints)
        .with_level(level);
    if let Some(hops) = args.hops {
        request = request.with_hop_limit(hops);
    }

    let result = session.retrieve_request(&request)?;
    print_result(&result, format)
}

pub(super) fn run_expand(
    session: &ContextSession,
    args: ExpandArgs,
    format: &OutputFormat,
) -> Result<()> {
    let budget = args
        .budget
        .unwrap_or(session.config().retrieval.default_budget);
    let result = session.expand_with_budget(&args.id, args.hops, budget, args.kind)?;
    print_result(&result, format)
}

pub(super) fn run_related(
    session: &ContextSession,
    args: RelatedArgs,
    format: &OutputFormat,
) -> Result<()> {
    let related = session.related(&args.id, &args.relations)?;
    if *format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&related)?);
        return Ok(());
    }
    if related.is_empty() {
        println!("No related chunks for {}", args.id);
        return Ok(());
    }

    let markdown = *format == OutputFormat::Markdown;
    for (relation, chunks) in &related {
        if markdown {
            println!("## {} ({})\n", relation, chunks.len());
        } else {
            println!("{} ({}):", relation, chunks.len());
        }
        for chunk in chunks {
            let bullet = if markdown { "-" } else { " " };
            println!(
                "{} {} [{}] {} ~{} tokens",
                bullet,
                chunk.name.as_deref().unwrap_or(&chunk.path),
                chunk.chunk_type,
                chunk.chunk_id,
                chunk.token_estimate
            );
        }
        println!();
    }
    Ok(())
}

fn print_result(result: &RetrievalResult, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
        OutputFormat::Markdown => print!("{}", result.to_markdown()),
        OutputFormat::Text => print!("{}", result.to_text()),
    }
    Ok(())
}

pub(super) fn run_stats(session: &ContextSession, format: &OutputFormat) -> Result<()> {
    let stats = session.stats()?;
    if *format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("\nContext Graph Statistics");
    println!("─────────────────────────────────────");
    println!("  Chunks:          {}", stats.total_chunks);
    for (chunk_type, count) in &stats.chunks_by_type {
        println!("    {:<15}{}", chunk_type.as_str(), count);
    }
    println!("  Edges:           {}", stats.total_edges);
    for (edge_type, count) in &stats.edges_by_type {
        println!("    {:<15}{}", edge_type.as_str(), count);
    }
    println!("  Superseded:      {}", stats.superseded_chunks);
    if let Some(last) = session.store().get_metadata(LAST_BUILD_KEY)? {
        println!("  Last build:      {}", last);
    }
    println!("─────────────────────────────────────\n");
    Ok(())
}
