// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Text renderings of a retrieval result.

use std::fmt::Write;

use super::{CandidateEntry, Disposition, RetrievalResult};

fn label(entry: &CandidateEntry) -> String {
    match &entry.name {
        Some(name) => format!("{} `{}` in {}", entry.chunk_type, name, entry.path),
        None => format!("{} {}", entry.chunk_type, entry.path),
    }
}

impl RetrievalResult {
    /// Markdown for handing to a model: included chunks in rank order, then
    /// a "Not loaded" section with every omission.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Context: {}\n", self.task);
        let _ = writeln!(
            out,
            "_{} of {} tokens used, {} of {} candidates included_\n",
            self.stats.tokens_used,
            self.stats.token_budget,
            self.stats.chunks_included,
            self.stats.chunks_considered
        );

        for entry in self.included() {
            if let Disposition::Included {
                level,
                content,
                tokens,
            } = &entry.disposition
            {
                let _ = writeln!(out, "## {}\n", label(entry));
                let _ = writeln!(
                    out,
                    "`{}` ({}, {} tokens, score {:.3})\n",
                    entry.chunk_id, level, tokens, entry.score
                );
                let fence = if content.contains("```") { "````" } else { "```" };
                let _ = writeln!(
                    out,
                    "{}{}\n{}\n{}\n",
                    fence,
                    entry.language.as_deref().unwrap_or(""),
                    content.trim_end(),
                    fence
                );
            }
        }

        if self.stats.chunks_omitted > 0 {
            let _ = writeln!(out, "## Not loaded\n");
            let _ = writeln!(out, "{}\n", self.omission_summary);
            for entry in self.omitted() {
                if let Some(reason) = entry.omission_reason() {
                    let _ = writeln!(out, "- `{}` ({}): {}", entry.chunk_id, reason, label(entry));
                }
            }
        } else if self.stats.chunks_considered == 0 {
            let _ = writeln!(out, "{}", self.omission_summary);
        }

        for (heading, ids) in [
            ("Related tests", &self.related_tests),
            ("Business rules", &self.business_rules),
            ("Recent commits", &self.related_commits),
        ] {
            if ids.is_empty() {
                continue;
            }
            let _ = writeln!(out, "\n## {}\n", heading);
            for id in ids {
                let _ = writeln!(out, "- `{}`", id);
            }
        }

        out
    }

    /// Compact one-line-per-candidate listing.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            match &entry.disposition {
                Disposition::Included { level, tokens, .. } => {
                    let _ = writeln!(
                        out,
                        "+ {:>7.3} {:<20} {:>6} tok  {}",
                        entry.score,
                        level.as_str(),
                        tokens,
                        entry.chunk_id
                    );
                }
                Disposition::Omitted { reason } => {
                    let _ = writeln!(
                        out,
                        "- {:>7.3} {:<20} {:>6}      {}",
                        entry.score,
                        reason.as_str(),
                        "",
                        entry.chunk_id
                    );
                }
            }
        }
        let _ = writeln!(out, "{}", self.omission_summary);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::CompressionLevel;
    use crate::model::ChunkType;
    use crate::retriever::{OmissionReason, RetrievalStats};
    use std::collections::BTreeMap;

    fn sample() -> RetrievalResult {
        RetrievalResult {
            task: "login flow".into(),
            entries: vec![
                CandidateEntry {
                    chunk_id: "function:src/auth.py#login@abc".into(),
                    chunk_type: ChunkType::Function,
                    path: "src/auth.py".into(),
                    name: Some("login".into()),
                    language: Some("python".into()),
                    score: 5.0,
                    disposition: Disposition::Included {
                        level: CompressionLevel::Full,
                        content: "def login():\n    pass\n".into(),
                        tokens: 6,
                    },
                },
                CandidateEntry {
                    chunk_id: "test:tests/test_auth.py@def".into(),
                    chunk_type: ChunkType::Test,
                    path: "tests/test_auth.py".into(),
                    name: None,
                    language: None,
                    score: 1.0,
                    disposition: Disposition::Omitted {
                        reason: OmissionReason::TokenBudget,
                    },
                },
            ],
            stats: RetrievalStats {
                chunks_considered: 2,
                chunks_included: 1,
                chunks_omitted: 1,
                tokens_used: 6,
                token_budget: 8,
            },
            omission_by_type: BTreeMap::from([(ChunkType::Test, 1)]),
            omission_by_reason: BTreeMap::from([(OmissionReason::TokenBudget, 1)]),
            omission_summary: "1 of 2 candidates omitted (1 token_budget)".into(),
            available_expansions: vec!["test:tests/test_auth.py@def".into()],
            edges: Vec::new(),
            related_tests: vec!["test:tests/test_auth.py@def".into()],
            related_commits: Vec::new(),
            business_rules: Vec::new(),
        }
    }

    #[test]
    fn test_markdown_lists_included_then_omitted() {
        let md = sample().to_markdown();
        let included = md.find("```python\ndef login():").unwrap();
        let omitted = md.find("## Not loaded").unwrap();
        assert!(included < omitted);
        assert!(md.contains("- `test:tests/test_auth.py@def` (token_budget)"));
        assert!(md.contains("## Related tests\n\n- `test:tests/test_auth.py@def`"));
        assert!(!md.contains("## Recent commits"));
    }

    #[test]
    fn test_text_marks_dispositions() {
        let text = sample().to_text();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with('+'));
        assert!(lines[0].contains("full"));
        assert!(lines[1].starts_with('-'));
        assert!(lines[1].contains("token_budget"));
        assert_eq!(lines[2], "1 of 2 candidates omitted (1 token_budget)");
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["entries"][0]["disposition"]["status"], "included");
        assert_eq!(json["entries"][1]["disposition"]["reason"], "token_budget");
        assert_eq!(json["omission_by_reason"]["token_budget"], 1);
        assert_eq!(json["related_tests"][0], "test:tests/test_auth.py@def");
        assert!(json["edges"].as_array().unwrap().is_empty());
    }
}
