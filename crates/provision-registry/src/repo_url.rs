//! Repository URL normalization, validation, and directory naming.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{RegistryError, Result};

const GIT_SUFFIX: &str = ".git";

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:",
        r"(?:https?|ssh|git)://(?:[^@/\s]+@)?[A-Za-z0-9.-]+(?::\d+)?(?:/[^/\s]+)+",
        r"|",
        r"[A-Za-z0-9._-]+@[A-Za-z0-9.-]+:(?:[^/\s]+/)*[^/\s]+",
        r")$"
    ))
    .expect("valid repository URL regex")
});

/// Canonical form of a repository URL.
///
/// Trims whitespace and trailing slashes, then appends `.git` if missing.
/// Two URLs naming the same repository normalize to the same string.
pub fn normalize(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() || trimmed.ends_with(GIT_SUFFIX) {
        trimmed.to_string()
    } else {
        format!("{trimmed}{GIT_SUFFIX}")
    }
}

/// Check that a normalized URL names a repository on a host.
pub fn validate(url: &str) -> Result<()> {
    if URL_PATTERN.is_match(url) && repo_dir_name(url).is_some() {
        Ok(())
    } else {
        Err(RegistryError::Validation {
            field: "repository URL",
            input: url.to_string(),
            reason: "expected a form like https://github.com/owner/repo.git".to_string(),
        })
    }
}

/// Local checkout directory name for a repository URL.
///
/// This is the last non-empty path segment with any `.git` suffix removed,
/// case preserved. Returns `None` for URLs that do not match the repository
/// pattern.
pub fn repo_dir_name(url: &str) -> Option<String> {
    if !URL_PATTERN.is_match(url) {
        return None;
    }
    let last = url.rsplit(['/', ':']).find(|s| !s.is_empty())?;
    let name = last.strip_suffix(GIT_SUFFIX).unwrap_or(last);
    match name {
        "" | "." | ".." => None,
        _ => Some(name.to_string()),
    }
}
