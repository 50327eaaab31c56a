// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Progressive disclosure of chunk content.
//!
//! Four levels trade detail for tokens: the full text, the text without
//! comments, the signature with its docstring, and the bare signature. Token
//! estimates for every level are computed without rendering, and are
//! monotone: a coarser level never costs more than a finer one.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ContextError;
use crate::model::{Chunk, Language};

/// Marker appended after a rendered signature.
const ELIDED: &str = "    ...";

/// Default number of lines kept when a chunk has no known signature.
pub const DEFAULT_FALLBACK_LINES: usize = 10;

/// How much of a chunk to show.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CompressionLevel {
    #[default]
    Full = 0,
    NoComments = 1,
    SignatureDocstring = 2,
    SignatureOnly = 3,
}

impl CompressionLevel {
    /// Every level, finest first.
    pub const ALL: [CompressionLevel; 4] = [
        CompressionLevel::Full,
        CompressionLevel::NoComments,
        CompressionLevel::SignatureDocstring,
        CompressionLevel::SignatureOnly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionLevel::Full => "full",
            CompressionLevel::NoComments => "no_comments",
            CompressionLevel::SignatureDocstring => "signature_docstring",
            CompressionLevel::SignatureOnly => "signature_only",
        }
    }

    /// This level and every coarser one, finest first.
    pub fn and_coarser(self) -> impl Iterator<Item = CompressionLevel> {
        Self::ALL.into_iter().filter(move |l| *l >= self)
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<CompressionLevel> for u8 {
    fn from(level: CompressionLevel) -> Self {
        level as u8
    }
}

impl TryFrom<u8> for CompressionLevel {
    type Error = ContextError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL.get(value as usize).copied().ok_or_else(|| {
            ContextError::InvalidInput(format!(
                "Compression level must be 0-3, got {}",
                value
            ))
        })
    }
}

/// Renders chunks at a compression level.
#[derive(Debug, Clone)]
pub struct Compressor {
    fallback_lines: usize,
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_LINES)
    }
}

impl Compressor {
    pub fn new(fallback_lines: usize) -> Self {
        Self {
            fallback_lines: fallback_lines.max(1),
        }
    }

    /// Render `chunk` at `level`.
    pub fn compress(&self, chunk: &Chunk, level: CompressionLevel) -> String {
        match level {
            CompressionLevel::Full => chunk.content.clone(),
            CompressionLevel::NoComments => strip_comments(&chunk.content, chunk_language(chunk)),
            CompressionLevel::SignatureDocstring => match signature(chunk) {
                Some(sig) => match docstring(chunk) {
                    Some(doc) => format!("{}\n{}\n{}", sig, doc, ELIDED),
                    None => format!("{}\n{}", sig, ELIDED),
                },
                None => head_lines(&chunk.content, self.fallback_lines),
            },
            CompressionLevel::SignatureOnly => match signature(chunk) {
                Some(sig) => format!("{}\n{}", sig, ELIDED),
                None => head_lines(&chunk.content, 1),
            },
        }
    }
}

fn signature(chunk: &Chunk) -> Option<&str> {
    chunk
        .metadata
        .signature
        .as_deref()
        .filter(|s| !s.trim().is_empty())
}

fn docstring(chunk: &Chunk) -> Option<&str> {
    chunk
        .metadata
        .docstring
        .as_deref()
        .filter(|s| !s.trim().is_empty())
}

fn chunk_language(chunk: &Chunk) -> Language {
    match chunk.metadata.language() {
        Language::Unknown => Language::from_path(&chunk.path),
        lang => lang,
    }
}

/// First `keep` lines of `content`, with a marker counting the rest.
fn head_lines(content: &str, keep: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() <= keep {
        return lines.join("\n");
    }
    format!(
        "{}\n... ({} more lines)",
        lines[..keep].join("\n"),
        lines.len() - keep
    )
}

/// Token estimate for `chunk` rendered at `level`.
///
/// Non-empty content never estimates below one token, and the estimates
/// satisfy `SignatureOnly <= SignatureDocstring <= NoComments <= Full`.
pub fn estimate_compressed_tokens(chunk: &Chunk, level: CompressionLevel) -> usize {
    let full = chunk.token_estimate;
    if full == 0 {
        return 0;
    }

    let no_comments = (full * 4).div_ceil(5).clamp(1, full);
    if level == CompressionLevel::NoComments {
        return no_comments;
    }

    let sig_doc = match signature(chunk) {
        Some(sig) => {
            let doc_len = docstring(chunk).map(|d| d.len() + 1).unwrap_or(0);
            (sig.len() + doc_len + 1 + ELIDED.len()).div_ceil(4)
        }
        None => (full * 3).div_ceil(10),
    }
    .clamp(1, no_comments);
    if level == CompressionLevel::SignatureDocstring {
        return sig_doc;
    }

    let sig_only = match signature(chunk) {
        Some(sig) => (sig.len() + 1 + ELIDED.len()).div_ceil(4),
        None => full.div_ceil(10),
    }
    .clamp(1, sig_doc);

    match level {
        CompressionLevel::Full => full,
        _ => sig_only,
    }
}

/// Comment syntax of a language family.
#[derive(Debug, Clone, Copy)]
struct CommentSyntax {
    line: &'static [&'static str],
    block: Option<(&'static str, &'static str)>,
    quotes: &'static [char],
    /// `"""` and `'''` strings.
    triple_quotes: bool,
    /// `'` opens a string only when it looks like a char literal.
    char_literals: bool,
    /// `#` starts a comment only at line start or after whitespace.
    hash_after_space: bool,
}

const C_FAMILY: CommentSyntax = CommentSyntax {
    line: &["//"],
    block: Some(("/*", "*/")),
    quotes: &['"', '`', '\''],
    triple_quotes: false,
    char_literals: true,
    hash_after_space: false,
};

const HASH: CommentSyntax = CommentSyntax {
    line: &["#"],
    block: None,
    quotes: &['"', '\''],
    triple_quotes: false,
    char_literals: false,
    hash_after_space: true,
};

fn comment_syntax(language: Language) -> Option<CommentSyntax> {
    match language {
        Language::Rust
        | Language::C
        | Language::Cpp
        | Language::CSharp
        | Language::Java
        | Language::Go => Some(C_FAMILY),
        Language::TypeScript | Language::JavaScript => Some(CommentSyntax {
            char_literals: false,
            ..C_FAMILY
        }),
        Language::Python => Some(CommentSyntax {
            triple_quotes: true,
            ..HASH
        }),
        Language::Shell | Language::Ruby | Language::Yaml | Language::Toml => Some(HASH),
        Language::Sql => Some(CommentSyntax {
            line: &["--"],
            block: Some(("/*", "*/")),
            quotes: &['\''],
            triple_quotes: false,
            char_literals: false,
            hash_after_space: false,
        }),
        Language::Markdown | Language::Json | Language::Unknown => None,
    }
}

/// Lines of output, each flagged if a comment was removed from it.
#[derive(Default)]
struct StrippedLines {
    lines: Vec<(String, bool)>,
    current: String,
    had_comment: bool,
}

impl StrippedLines {
    fn push(&mut self, c: char) {
        if c == '\n' {
            self.end_line();
        } else {
            self.current.push(c);
        }
    }

    fn end_line(&mut self) {
        let line = std::mem::take(&mut self.current);
        self.lines.push((line, self.had_comment));
        self.had_comment = false;
    }

    fn finish(mut self) -> String {
        if !self.current.is_empty() || self.had_comment {
            self.end_line();
        }

        let mut out: Vec<&str> = Vec::new();
        for (line, had_comment) in &self.lines {
            let line = line.trim_end();
            if line.is_empty() {
                // Comment-only lines vanish; other blank runs collapse to one.
                if *had_comment || out.last().map(|l| l.is_empty()).unwrap_or(true) {
                    continue;
                }
            }
            out.push(line);
        }
        while out.last().map(|l| l.is_empty()).unwrap_or(false) {
            out.pop();
        }
        out.join("\n")
    }
}

fn starts_with_at(chars: &[char], i: usize, pattern: &str) -> bool {
    let mut j = i;
    for p in pattern.chars() {
        if chars.get(j) != Some(&p) {
            return false;
        }
        j += 1;
    }
    true
}

fn is_char_literal(chars: &[char], i: usize) -> bool {
    chars.get(i + 1) == Some(&'\\') || chars.get(i + 2) == Some(&'\'')
}

/// Remove comments from source text, leaving string literals intact.
///
/// Languages without a known comment syntax are returned unchanged.
pub fn strip_comments(content: &str, language: Language) -> String {
    let Some(syntax) = comment_syntax(language) else {
        return content.to_string();
    };

    let chars: Vec<char> = content.chars().collect();
    let mut out = StrippedLines::default();
    let mut i = 0;

    'scan: while i < chars.len() {
        let c = chars[i];

        if syntax.triple_quotes && (c == '"' || c == '\'') {
            let triple: String = [c, c, c].iter().collect();
            if starts_with_at(&chars, i, &triple) {
                for &ch in &chars[i..i + 3] {
                    out.push(ch);
                }
                i += 3;
                while i < chars.len() && !starts_with_at(&chars, i, &triple) {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        out.push(chars[i]);
                        i += 1;
                    }
                    out.push(chars[i]);
                    i += 1;
                }
                let end = (i + 3).min(chars.len());
                for &ch in &chars[i..end] {
                    out.push(ch);
                }
                i = end;
                continue;
            }
        }

        if syntax.quotes.contains(&c) && !(c == '\'' && syntax.char_literals && !is_char_literal(&chars, i)) {
            out.push(c);
            i += 1;
            while i < chars.len() {
                let ch = chars[i];
                // Only backtick strings span lines.
                if ch == '\n' && c != '`' {
                    break;
                }
                out.push(ch);
                i += 1;
                if ch == '\\' && i < chars.len() {
                    out.push(chars[i]);
                    i += 1;
                } else if ch == c {
                    break;
                }
            }
            continue;
        }

        if let Some((open, close)) = syntax.block {
            if starts_with_at(&chars, i, open) {
                out.had_comment = true;
                i += open.chars().count();
                while i < chars.len() && !starts_with_at(&chars, i, close) {
                    if chars[i] == '\n' {
                        out.end_line();
                        out.had_comment = true;
                    }
                    i += 1;
                }
                i = (i + close.chars().count()).min(chars.len());
                continue;
            }
        }

        for marker in syntax.line {
            if !starts_with_at(&chars, i, marker) {
                continue;
            }
            if *marker == "#" {
                if syntax.hash_after_space && i > 0 && !chars[i - 1].is_whitespace() {
                    continue;
                }
                if i == 0 && chars.get(1) == Some(&'!') {
                    continue;
                }
            }
            out.had_comment = true;
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue 'scan;
        }

        out.push(c);
        i += 1;
    }

    out.finish()
}
