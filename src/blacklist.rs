//! URL blacklist.
//!
//! The blacklist is a newline-delimited file of regular-expression fragments.
//! At startup the fragments are joined into a single case-insensitive
//! alternation and compiled once. The resulting [`Blacklist`] is immutable and
//! shared by reference (usually behind an `Arc`) with every
//! [`Canonicalizer`](crate::canonical::Canonicalizer).

use std::path::Path;

use regex::{Regex, RegexBuilder};

/// Failure to load or compile the blacklist.
#[derive(Debug, thiserror::Error)]
pub enum BlacklistError {
    #[error("failed to read blacklist file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid blacklist pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Compiled blacklist. An empty blacklist matches nothing.
#[derive(Debug, Clone)]
pub struct Blacklist {
    pattern: Option<Regex>,
    fragments: usize,
}

impl Blacklist {
    /// A blacklist that rejects nothing.
    pub fn empty() -> Self {
        Self {
            pattern: None,
            fragments: 0,
        }
    }

    /// Compile fragments into one alternation.
    ///
    /// Fragments are trimmed and sorted before joining so the compiled
    /// pattern does not depend on file order. Blank entries and `#` comments
    /// are skipped; an empty alternative would otherwise match every URL.
    pub fn from_fragments<I, S>(fragments: I) -> Result<Self, BlacklistError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parts: Vec<String> = fragments
            .into_iter()
            .map(|f| f.as_ref().trim().to_string())
            .filter(|f| !f.is_empty() && !f.starts_with('#'))
            .collect();
        parts.sort();
        parts.dedup();

        if parts.is_empty() {
            return Ok(Self::empty());
        }

        let alternation = parts
            .iter()
            .map(|p| format!("(?:{})", p))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = RegexBuilder::new(&alternation)
            .case_insensitive(true)
            .build()?;

        Ok(Self {
            pattern: Some(pattern),
            fragments: parts.len(),
        })
    }

    /// Parse newline-delimited fragments.
    pub fn parse(text: &str) -> Result<Self, BlacklistError> {
        Self::from_fragments(text.lines())
    }

    /// Read and compile a blacklist file.
    pub fn load(path: &Path) -> Result<Self, BlacklistError> {
        let text = std::fs::read_to_string(path).map_err(|source| BlacklistError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let blacklist = Self::parse(&text)?;
        tracing::info!(
            path = %path.display(),
            fragments = blacklist.fragments,
            "loaded URL blacklist"
        );
        Ok(blacklist)
    }

    /// Whether any fragment matches anywhere in `url`.
    pub fn is_match(&self, url: &str) -> bool {
        self.pattern.as_ref().is_some_and(|p| p.is_match(url))
    }

    /// Number of distinct fragments compiled into the pattern.
    pub fn len(&self) -> usize {
        self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments == 0
    }
}

impl Default for Blacklist {
    fn default() -> Self {
        Self::empty()
    }
}
