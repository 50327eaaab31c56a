// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tokenization and BM25 scoring for the full-text index.

use std::collections::BTreeMap;

use crate::model::Chunk;

/// Term-frequency saturation.
pub const K1: f64 = 1.2;
/// Document-length normalization.
pub const B: f64 = 0.75;
/// Weight of terms taken from a chunk's path or symbol name.
pub const NAME_WEIGHT: f64 = 2.0;
/// Weight of terms taken from a chunk's content.
pub const CONTENT_WEIGHT: f64 = 1.0;

const STOP_WORDS: &[&str] = &[
    "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "if", "in", "into", "is",
    "it", "not", "of", "on", "or", "that", "the", "this", "to", "was", "were", "with",
];

/// Whether a lowercase term is too common to index.
pub fn is_stop_word(term: &str) -> bool {
    STOP_WORDS.contains(&term)
}

fn keep(term: &str) -> bool {
    term.chars().count() >= 2 && !is_stop_word(term)
}

/// Split an identifier on `_` and camelCase boundaries.
///
/// `getHTTPResponse_code` gives `get`, `http`, `response`, `code`.
pub fn split_identifier(word: &str) -> Vec<String> {
    let mut parts = Vec::new();
    for piece in word.split('_').filter(|p| !p.is_empty()) {
        let chars: Vec<char> = piece.chars().collect();
        let mut current = String::new();
        for (i, &c) in chars.iter().enumerate() {
            let prev = if i > 0 { Some(chars[i - 1]) } else { None };
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if c.is_uppercase() => {
                    p.is_lowercase()
                        || p.is_ascii_digit()
                        || (p.is_uppercase() && next.map(|n| n.is_lowercase()).unwrap_or(false))
                }
                _ => false,
            };
            if boundary && !current.is_empty() {
                parts.push(current.to_lowercase());
                current.clear();
            }
            current.push(c);
        }
        if !current.is_empty() {
            parts.push(current.to_lowercase());
        }
    }
    parts
}

/// Lowercased index terms of a text, in order, with repeats.
///
/// Each word is indexed whole and, when it is a compound identifier, also
/// as its parts, so `parseConfig` matches queries for `parse` and `config`.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut terms = Vec::new();
    for word in text
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
    {
        let whole = word.trim_matches('_').to_lowercase();
        if keep(&whole) {
            terms.push(whole.clone());
        }
        let parts = split_identifier(word);
        if parts.len() > 1 {
            terms.extend(parts.into_iter().filter(|p| keep(p) && *p != whole));
        }
    }
    terms
}

/// Per-term statistics for one document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermStats {
    pub tf: u32,
    pub weight: f64,
}

/// Index terms of a chunk plus its document length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocTerms {
    pub terms: BTreeMap<String, TermStats>,
    pub length: usize,
}

/// Terms of a chunk: path and symbol name carry [`NAME_WEIGHT`], content [`CONTENT_WEIGHT`].
pub fn document_terms(chunk: &Chunk) -> DocTerms {
    let mut doc = DocTerms::default();
    let mut add = |term: String, weight: f64| {
        let entry = doc.terms.entry(term).or_insert(TermStats { tf: 0, weight });
        entry.tf += 1;
        entry.weight = entry.weight.max(weight);
        doc.length += 1;
    };

    for term in tokenize(&chunk.path) {
        add(term, NAME_WEIGHT);
    }
    if let Some(name) = &chunk.metadata.name {
        for term in tokenize(name) {
            add(term, NAME_WEIGHT);
        }
    }
    for term in tokenize(&chunk.content) {
        add(term, CONTENT_WEIGHT);
    }
    doc
}

/// Inverse document frequency, never negative.
pub fn idf(total_docs: usize, doc_freq: usize) -> f64 {
    let n = total_docs as f64;
    let df = doc_freq as f64;
    (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
}

/// BM25 contribution of one term to one document.
pub fn term_score(stats: TermStats, doc_len: usize, avg_doc_len: f64, idf: f64) -> f64 {
    let tf = stats.tf as f64;
    let avg = if avg_doc_len > 0.0 { avg_doc_len } else { 1.0 };
    let norm = K1 * (1.0 - B + B * doc_len as f64 / avg);
    idf * stats.weight * (tf * (K1 + 1.0)) / (tf + norm)
}

/// Distinct query terms, in first-seen order.
pub fn query_terms(query: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tokenize(query)
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}
