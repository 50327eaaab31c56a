// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Path-based artifact classification and feature inference.

use std::path::Path;

use super::ArtifactKind;

/// Directory names never descended into.
pub const SKIP_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "target",
    "dist",
    "build",
    ".next",
    ".nuxt",
    "coverage",
    "vendor",
    ".idea",
    ".vscode",
    ".ted",
    ".tox",
    ".pytest_cache",
    ".mypy_cache",
];

/// Extensions of files that are never text worth indexing.
const BINARY_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "svg", "tiff",
    // archives
    "zip", "tar", "gz", "tgz", "bz2", "xz", "7z", "rar", "jar", "war",
    // fonts
    "woff", "woff2", "ttf", "otf", "eot",
    // compiled objects
    "o", "a", "so", "dylib", "dll", "exe", "class", "pyc", "pyo", "wasm", "bin", "rlib",
    // documents and media
    "pdf", "doc", "docx", "xls", "xlsx", "mp3", "mp4", "avi", "mov", "wav",
    // lock and database files
    "lock", "db", "sqlite", "sqlite3",
];

/// Lock files that have a text extension.
const LOCK_FILES: &[&str] = &["package-lock.json", "pnpm-lock.yaml", "npm-shrinkwrap.json"];

/// Project manifest file names.
const METADATA_FILES: &[&str] = &[
    "package.json",
    "pyproject.toml",
    "cargo.toml",
    "go.mod",
    "requirements.txt",
    "setup.py",
    "setup.cfg",
    "pom.xml",
    "build.gradle",
    "gemfile",
    "composer.json",
];

/// Extensions treated as source code.
const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "py", "pyi", "ts", "tsx", "js", "jsx", "mjs", "cjs", "go", "java", "kt", "c", "h",
    "cpp", "cc", "cxx", "hpp", "hxx", "cs", "rb", "php", "swift", "scala", "sh", "bash", "zsh",
    "sql", "lua",
];

fn file_name(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_lowercase()
}

fn extension(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
}

/// Whether a directory name is skipped during the walk.
pub fn is_skipped_dir(name: &str) -> bool {
    SKIP_DIRS.contains(&name)
}

/// Whether a path names a binary or lock file.
pub fn is_binary_path(path: &str) -> bool {
    if LOCK_FILES.contains(&file_name(path).as_str()) {
        return true;
    }
    extension(path)
        .map(|ext| BINARY_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Whether a path is an interface contract document.
pub fn is_contract_path(path: &str) -> bool {
    file_name(path).ends_with(".contract.md")
}

/// Whether a path is a project manifest.
pub fn is_metadata_path(path: &str) -> bool {
    METADATA_FILES.contains(&file_name(path).as_str())
}

/// Whether a path is a configuration file.
pub fn is_config_path(path: &str) -> bool {
    let name = file_name(path);
    if name.starts_with(".env") || name == "settings.py" || name == "config.py" {
        return true;
    }
    let config_script = [".config.js", ".config.ts", ".config.mjs", ".config.cjs"]
        .iter()
        .any(|suffix| name.ends_with(suffix));
    config_script
        || matches!(
            extension(path).as_deref(),
            Some("yaml" | "yml" | "toml" | "ini" | "cfg")
        )
}

/// Whether a path is a test file by naming convention or location.
pub fn is_test_path(path: &str) -> bool {
    let name = file_name(path);
    let in_test_dir = path
        .split('/')
        .rev()
        .skip(1)
        .any(|dir| dir == "tests" || dir == "__tests__" || dir == "test");
    if in_test_dir {
        return true;
    }

    if name.ends_with(".py") && (name.starts_with("test_") || name.ends_with("_test.py")) {
        return true;
    }
    if name.ends_with("_test.go") {
        return true;
    }
    [".test.", ".spec."].iter().any(|marker| {
        name.contains(marker)
            && matches!(
                extension(path).as_deref(),
                Some("ts" | "js" | "tsx" | "jsx" | "mjs" | "cjs")
            )
    })
}

/// Whether a path has a known source code extension.
pub fn is_source_path(path: &str) -> bool {
    extension(path)
        .map(|ext| SOURCE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Decide which kind of artifact a project-relative path is, if any.
pub fn classify_path(path: &str) -> Option<ArtifactKind> {
    if is_binary_path(path) {
        return None;
    }
    if is_contract_path(path) {
        Some(ArtifactKind::Contract)
    } else if is_metadata_path(path) {
        Some(ArtifactKind::Metadata)
    } else if is_config_path(path) {
        Some(ArtifactKind::Config)
    } else if is_source_path(path) {
        Some(ArtifactKind::Source)
    } else {
        None
    }
}

fn stem(segment: &str) -> &str {
    segment.split('.').next().unwrap_or(segment)
}

/// Infer the feature a path belongs to from its directory layout.
///
/// Rules are checked in order and the first match wins:
/// `src/features/<X>/`, a configured feature root `<root>/<X>/`,
/// `src/{core,shared,utils}/`, `impl/<X>` and `contracts/<X>.contract.md`.
pub fn infer_feature(path: &str, feature_roots: &[String]) -> Option<String> {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    if parts.len() < 2 {
        return None;
    }

    if parts.len() >= 4 && parts[0] == "src" && parts[1] == "features" {
        return Some(parts[2].to_string());
    }

    // Only directories count: the segment after the root must not be the file.
    for (i, part) in parts.iter().enumerate() {
        if i + 2 < parts.len() && feature_roots.iter().any(|root| root == part) {
            return Some(parts[i + 1].to_string());
        }
    }

    if parts.len() >= 3 && parts[0] == "src" && matches!(parts[1], "core" | "shared" | "utils") {
        return Some(parts[1].to_string());
    }

    if let Some(i) = parts.iter().position(|p| *p == "impl") {
        if let Some(next) = parts.get(i + 1) {
            let feature = if i + 2 == parts.len() { stem(next) } else { next };
            if !feature.is_empty() {
                return Some(feature.to_string());
            }
        }
    }

    if parts[0] == "contracts" && is_contract_path(path) {
        let name = parts[parts.len() - 1];
        return name
            .strip_suffix(".contract.md")
            .filter(|n| !n.is_empty())
            .map(str::to_string);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roots() -> Vec<String> {
        vec!["features".into(), "modules".into(), "packages".into()]
    }

    #[test]
    fn test_classify_path() {
        assert_eq!(classify_path("src/main.rs"), Some(ArtifactKind::Source));
        assert_eq!(classify_path("Cargo.toml"), Some(ArtifactKind::Metadata));
        assert_eq!(classify_path("web/package.json"), Some(ArtifactKind::Metadata));
        assert_eq!(classify_path("config/app.yaml"), Some(ArtifactKind::Config));
        assert_eq!(classify_path(".env.local"), Some(ArtifactKind::Config));
        assert_eq!(classify_path("vite.config.ts"), Some(ArtifactKind::Config));
        assert_eq!(
            classify_path("contracts/auth.contract.md"),
            Some(ArtifactKind::Contract)
        );
        assert_eq!(classify_path("README.md"), None);
        assert_eq!(classify_path("logo.png"), None);
        assert_eq!(classify_path("Cargo.lock"), None);
        assert_eq!(classify_path("package-lock.json"), None);
    }

    #[test]
    fn test_is_test_path() {
        assert!(is_test_path("test_auth.py"));
        assert!(is_test_path("pkg/auth_test.py"));
        assert!(is_test_path("store/store_test.go"));
        assert!(is_test_path("src/auth.test.ts"));
        assert!(is_test_path("src/auth.spec.jsx"));
        assert!(is_test_path("tests/integration.rs"));
        assert!(is_test_path("src/__tests__/auth.ts"));

        assert!(!is_test_path("src/auth.py"));
        assert!(!is_test_path("src/testing.rs"));
        assert!(!is_test_path("src/latest.ts"));
        assert!(!is_test_path("tests"));
    }

    #[test]
    fn test_skip_dirs() {
        assert!(is_skipped_dir("node_modules"));
        assert!(is_skipped_dir(".git"));
        assert!(!is_skipped_dir("src"));
    }

    #[test]
    fn test_infer_feature_rules() {
        let roots = roots();
        assert_eq!(
            infer_feature("src/features/auth/login.py", &roots),
            Some("auth".into())
        );
        assert_eq!(
            infer_feature("packages/billing/src/index.ts", &roots),
            Some("billing".into())
        );
        assert_eq!(
            infer_feature("src/core/db.py", &roots),
            Some("core".into())
        );
        assert_eq!(infer_feature("impl/user.ts", &roots), Some("user".into()));
        assert_eq!(
            infer_feature("impl/orders/create.ts", &roots),
            Some("orders".into())
        );
        assert_eq!(
            infer_feature("contracts/auth.contract.md", &roots),
            Some("auth".into())
        );
        assert_eq!(infer_feature("src/main.rs", &roots), None);
        assert_eq!(infer_feature("main.rs", &roots), None);
    }

    #[test]
    fn test_infer_feature_root_needs_directory() {
        // `modules/x.py` is a file directly under the root, not a feature.
        assert_eq!(infer_feature("modules/x.py", &roots()), None);
    }

    #[test]
    fn test_src_features_wins_over_roots() {
        assert_eq!(
            infer_feature("src/features/auth/modules/x/y.py", &roots()),
            Some("auth".into())
        );
    }
}
