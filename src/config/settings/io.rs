// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::path::{Path, PathBuf};

use crate::error::{ContextError, Result};

use super::ContextConfig;

impl ContextConfig {
    /// Get the ted home directory (`$TED_HOME` or `~/.ted`).
    pub fn ted_home() -> PathBuf {
        if let Ok(home) = std::env::var("TED_HOME") {
            return PathBuf::from(home);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ted")
    }

    /// Project-local config path.
    pub fn project_path(project_root: &Path) -> PathBuf {
        project_root.join(".ted").join("context.toml")
    }

    /// Global config path.
    pub fn global_path() -> PathBuf {
        Self::ted_home().join("context.toml")
    }

    /// Load settings for a project: project file, then global file, then defaults.
    pub fn load(project_root: &Path) -> Result<Self> {
        let project = Self::project_path(project_root);
        if project.exists() {
            return Self::load_from(&project);
        }
        Self::load_from(&Self::global_path())
    }

    /// Load settings from a specific path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: ContextConfig = toml::from_str(&content)
            .map_err(|e| ContextError::Toml(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| ContextError::Toml(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolve the storage path against a project root.
    pub fn storage_path(&self, project_root: &Path) -> PathBuf {
        if self.storage.path.is_absolute() {
            self.storage.path.clone()
        } else {
            project_root.join(&self.storage.path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_is_default() {
        let temp = TempDir::new().unwrap();
        let config = ContextConfig::load_from(&temp.path().join("nope.toml")).unwrap();
        assert_eq!(config, ContextConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = ContextConfig::project_path(temp.path());

        let mut config = ContextConfig::default();
        config.retrieval.default_budget = 1234;
        config.chunker.feature_roots = vec!["apps".to_string()];
        config.save_to(&path).unwrap();

        let loaded = ContextConfig::load(temp.path()).unwrap();
        assert_eq!(loaded.retrieval.default_budget, 1234);
        assert_eq!(loaded.chunker.feature_roots, vec!["apps".to_string()]);
    }

    #[test]
    fn test_load_invalid_toml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.toml");
        std::fs::write(&path, "[retrieval\nhop_limit = ").unwrap();

        let err = ContextConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ContextError::Toml(_)));
    }

    #[test]
    fn test_storage_path_relative_and_absolute() {
        let root = Path::new("/project");
        let mut config = ContextConfig::default();
        assert_eq!(
            config.storage_path(root),
            PathBuf::from("/project/.ted/context.db")
        );

        config.storage.path = PathBuf::from("/var/db/ctx.db");
        assert_eq!(config.storage_path(root), PathBuf::from("/var/db/ctx.db"));
    }
}
