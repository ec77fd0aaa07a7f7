//! Path classification
//!
//! Maps repository paths to metadata, binary, remote-binary and child-binary using
//! the configured pattern lists. Every pattern is matched against the whole path.

use regex::{Regex, RegexSet};

use crate::config::ResolvedSyncConfig;
use crate::error::ConfigError;

/// Result of classifying a single path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Classification {
    pub is_metadata: bool,
    pub is_binary: bool,
    /// Only meaningful when `is_binary` is set
    pub is_remote: bool,
    /// Only meaningful when `is_binary` is set
    pub is_child: bool,
}

impl Classification {
    pub fn is_unclassified(&self) -> bool {
        !self.is_metadata && !self.is_binary
    }
}

/// Compiled, anchored list of path patterns
#[derive(Debug, Clone)]
pub struct PatternList {
    set: RegexSet,
}

impl PatternList {
    pub fn new(kind: &'static str, patterns: &[String]) -> Result<Self, ConfigError> {
        // Compile each pattern on its own first so errors name the offending pattern
        for pattern in patterns {
            Regex::new(&anchor(pattern)).map_err(|source| ConfigError::InvalidPattern {
                kind,
                pattern: pattern.clone(),
                source,
            })?;
        }

        let set = RegexSet::new(patterns.iter().map(|p| anchor(p))).map_err(|source| {
            ConfigError::InvalidPattern {
                kind,
                pattern: patterns.join(", "),
                source,
            }
        })?;

        Ok(Self { set })
    }

    pub fn empty() -> Self {
        Self {
            set: RegexSet::empty(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// True when any pattern matches; always false for an empty list
    pub fn matches_any(&self, value: &str) -> bool {
        self.set.is_match(value)
    }
}

fn anchor(pattern: &str) -> String {
    format!("^(?:{})$", pattern)
}

/// Allow-list of media types. Entries may end in `/*` to allow a whole top-level type.
#[derive(Debug, Clone, Default)]
pub struct MimeTypeFilter {
    allowed: Vec<String>,
}

impl MimeTypeFilter {
    pub fn new(allowed: &[String]) -> Self {
        Self {
            allowed: allowed
                .iter()
                .map(|m| m.trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    /// True when the list is empty or the inferred media type of `path` is allowed
    pub fn is_supported(&self, path: &str) -> bool {
        if self.allowed.is_empty() {
            return true;
        }

        let Some(mime) = mime_guess::from_path(path).first() else {
            return false;
        };
        let essence = mime.essence_str().to_lowercase();

        self.allowed.iter().any(|allowed| match allowed.strip_suffix("/*") {
            Some(top_level) => mime.type_().as_str().eq_ignore_ascii_case(top_level),
            None => *allowed == essence,
        })
    }
}

/// Pure classifier built once from configuration. Safe to share across threads.
#[derive(Debug, Clone)]
pub struct PathClassifier {
    metadata: PatternList,
    binary: PatternList,
    remote: PatternList,
    child: PatternList,
    include: PatternList,
    exclude: PatternList,
    mime_types: MimeTypeFilter,
}

impl PathClassifier {
    pub fn from_config(config: &ResolvedSyncConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            metadata: PatternList::new("metadata", &config.metadata_patterns)?,
            binary: PatternList::new("binary", &config.binary_patterns)?,
            remote: PatternList::new("remote binary", &config.remote_binary_patterns)?,
            child: PatternList::new("child binary", &config.child_binary_patterns)?,
            include: PatternList::new("include", &config.include_patterns)?,
            exclude: PatternList::new("exclude", &config.exclude_patterns)?,
            mime_types: MimeTypeFilter::new(&config.supported_mime_types),
        })
    }

    pub fn classify(&self, path: &str) -> Classification {
        let is_binary = self.is_binary(path);
        Classification {
            is_metadata: self.is_metadata(path),
            is_binary,
            is_remote: is_binary && self.is_remote(path),
            is_child: is_binary && self.is_child(path),
        }
    }

    pub fn is_metadata(&self, path: &str) -> bool {
        self.metadata.matches_any(path)
    }

    pub fn is_binary(&self, path: &str) -> bool {
        self.binary.matches_any(path) && self.is_supported_type(path)
    }

    pub fn is_remote(&self, path: &str) -> bool {
        self.remote.matches_any(path)
    }

    pub fn is_child(&self, path: &str) -> bool {
        self.child.matches_any(path)
    }

    pub fn is_supported_type(&self, path: &str) -> bool {
        self.mime_types.is_supported(path)
    }

    /// Generic include/exclude gate used by the standalone binary indexer
    pub fn is_included(&self, path: &str) -> bool {
        (self.include.is_empty() || self.include.matches_any(path))
            && !self.exclude.matches_any(path)
    }
}
