// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for ted-context
//!
//! Storage failures are fatal to both build and retrieval. Everything else the
//! engine can recover from is reported as data (skip reasons, omission
//! reasons, unresolved-reference counts) rather than as an error.

use thiserror::Error;

/// Main error type for context engine operations
#[derive(Error, Debug)]
pub enum ContextError {
    /// Storage is unavailable or a query against it failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// A chunk or other keyed record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SQLite errors
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Git history errors
    #[error("Git error: {0}")]
    Git(String),
}

impl ContextError {
    /// Whether this error means storage cannot be used at all.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ContextError::Storage(_) | ContextError::Sqlite(_))
    }
}

/// Result type alias for context engine operations
pub type Result<T> = std::result::Result<T, ContextError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_error_storage() {
        let err = ContextError::Storage("db locked".to_string());
        assert!(err.to_string().contains("Storage error"));
        assert!(err.to_string().contains("db locked"));
    }

    #[test]
    fn test_context_error_not_found() {
        let err = ContextError::NotFound("function:src/a.rs#a".to_string());
        assert!(err.to_string().contains("Not found"));
        assert!(err.to_string().contains("src/a.rs"));
    }

    #[test]
    fn test_context_error_config() {
        let err = ContextError::Config("bad config".to_string());
        assert!(err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_context_error_toml() {
        let err = ContextError::Toml("parse error".to_string());
        assert!(err.to_string().contains("TOML error"));
    }

    #[test]
    fn test_context_error_invalid_input() {
        let err = ContextError::InvalidInput("bad input".to_string());
        assert!(err.to_string().contains("Invalid input"));
    }

    #[test]
    fn test_context_error_git() {
        let err = ContextError::Git("no HEAD".to_string());
        assert!(err.to_string().contains("Git error"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ContextError = io_err.into();
        assert!(matches!(err, ContextError::Io(_)));
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        let err: ContextError = json_err.into();
        assert!(matches!(err, ContextError::Json(_)));
    }

    #[test]
    fn test_sqlite_error_conversion() {
        let err: ContextError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, ContextError::Sqlite(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_fatality() {
        assert!(ContextError::Storage("x".into()).is_fatal());
        assert!(!ContextError::NotFound("x".into()).is_fatal());
        assert!(!ContextError::InvalidInput("x".into()).is_fatal());
    }
}
