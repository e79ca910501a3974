use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// A normalized hashtag seed with its discovery quota.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hashtag {
    /// Lowercase, trimmed, with a single leading `#`.
    pub tag: String,
    /// Maximum candidate profiles Discovery may attribute to this hashtag.
    pub quota: usize,
}

impl Hashtag {
    /// Build a hashtag from raw user input.
    ///
    /// Returns `None` when the input is empty after normalization.
    #[must_use]
    pub fn new(raw: &str, quota: usize) -> Option<Self> {
        normalize_hashtag(raw).map(|tag| Self { tag, quota })
    }

    /// The search term: the tag without its leading `#`.
    #[must_use]
    pub fn term(&self) -> &str {
        self.tag.trim_start_matches('#')
    }
}

impl std::fmt::Display for Hashtag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.tag)
    }
}

/// Normalize a hashtag to `#lowercase` form.
///
/// Leading `#` characters and surrounding whitespace are stripped before one
/// `#` is re-added. Returns `None` for input that is empty or contains
/// whitespace inside the tag.
#[must_use]
pub fn normalize_hashtag(raw: &str) -> Option<String> {
    let body = raw.trim().trim_start_matches('#').trim();
    if body.is_empty() || body.chars().any(char::is_whitespace) {
        return None;
    }
    Some(format!("#{}", body.to_lowercase()))
}

/// One entry of the seed file; `max_profiles` overrides the global quota.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashtagSeed {
    pub tag: String,
    #[serde(default)]
    pub max_profiles: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct HashtagsFile {
    pub hashtags: Vec<HashtagSeed>,
}

impl HashtagsFile {
    /// Resolve seeds into normalized hashtags, filling in `default_quota`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for empty or duplicate tags.
    pub fn resolve(&self, default_quota: usize) -> Result<Vec<Hashtag>, ConfigError> {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(self.hashtags.len());

        for seed in &self.hashtags {
            let quota = seed.max_profiles.unwrap_or(default_quota);
            let hashtag = Hashtag::new(&seed.tag, quota).ok_or_else(|| {
                ConfigError::Validation(format!("invalid hashtag: '{}'", seed.tag))
            })?;
            if hashtag.quota == 0 {
                return Err(ConfigError::Validation(format!(
                    "hashtag '{}' has a zero profile quota",
                    hashtag.tag
                )));
            }
            if !seen.insert(hashtag.tag.clone()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate hashtag: '{}'",
                    hashtag.tag
                )));
            }
            out.push(hashtag);
        }

        Ok(out)
    }
}

/// Load and validate the hashtag seed file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_hashtags(path: &Path, default_quota: usize) -> Result<Vec<Hashtag>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let file: HashtagsFile = serde_yaml::from_str(&content)?;
    file.resolve(default_quota)
}

#[cfg(test)]
#[path = "hashtags_test.rs"]
mod tests;
