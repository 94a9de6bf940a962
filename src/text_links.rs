//! Text link reader.
//!
//! Recovers links that only exist as visible text. Each page's text layer is
//! extracted with `pdf-extract`, web links are detected in it, and every
//! detected span is canonicalized.
//!
//! This source is best-effort. Line breaks and hyphenation routinely split a
//! URL into fragments, and some PDFs defeat text extraction entirely; the
//! overlap deduplication in [`crate::overlap`] cleans up the former, and the
//! latter simply yields no text links.

use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::canonical::Canonicalizer;

/// A web link starts at `http://`, `https://` or `www.` and runs until
/// whitespace or a character that cannot appear unescaped in a URL.
static WEB_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:\bhttps?://|\bwww\.)[^\s<>"{}|\\^`]+"#).expect("valid web link regex")
});

/// Characters trimmed from the end of a detected span.
const TRAILING_BOUNDARY: &[char] = &['.', ',', ';', ':', '!', '?', '\'', '"', '*'];

/// Drop trailing punctuation and closing brackets that have no opening
/// partner inside the span (`(see https://x.org/a)` → `https://x.org/a`).
pub fn trim_link_boundary(span: &str) -> &str {
    let mut s = span;
    loop {
        let trimmed = s.trim_end_matches(TRAILING_BOUNDARY);
        let trimmed = match trimmed.chars().last() {
            Some(close @ (')' | ']')) => {
                let open = if close == ')' { '(' } else { '[' };
                let opens = trimmed.matches(open).count();
                let closes = trimmed.matches(close).count();
                if closes > opens {
                    &trimmed[..trimmed.len() - 1]
                } else {
                    trimmed
                }
            }
            _ => trimmed,
        };
        if trimmed.len() == s.len() {
            return s;
        }
        s = trimmed;
    }
}

/// Web-link spans found in a page's text, boundary-trimmed, in text order.
pub fn detect_web_links(text: &str) -> Vec<&str> {
    WEB_LINK
        .find_iter(text)
        .map(|m| trim_link_boundary(m.as_str()))
        .filter(|s| !s.is_empty())
        .collect()
}

/// Plain text of each page, or `None` when the text layer cannot be read.
///
/// `pdf-extract` panics on some malformed font programs; a panic is treated
/// like any other extraction failure.
pub fn page_texts(bytes: &[u8]) -> Option<Vec<String>> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }));
    match result {
        Ok(Ok(pages)) => Some(pages),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "text layer extraction failed");
            None
        }
        Err(_) => {
            tracing::warn!("text layer extraction panicked");
            None
        }
    }
}

/// Canonicalized web links across all page texts.
pub fn links_in_pages<S: AsRef<str>>(pages: &[S], canonicalizer: &Canonicalizer) -> BTreeSet<String> {
    let mut links = BTreeSet::new();
    for (page_no, text) in pages.iter().enumerate() {
        for span in detect_web_links(text.as_ref()) {
            match canonicalizer.canonicalize(span) {
                Ok(url) => {
                    links.insert(url);
                }
                Err(e) => tracing::debug!(source = "text", page = page_no + 1, "{}", e),
            }
        }
    }
    links
}

/// Canonicalized web links found in the text layer of a PDF.
pub fn text_links(bytes: &[u8], canonicalizer: &Canonicalizer) -> BTreeSet<String> {
    match page_texts(bytes) {
        Some(pages) => links_in_pages(&pages, canonicalizer),
        None => BTreeSet::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_schemes_and_www() {
        let text = "See https://example.org/paper and http://foo.com, or www.bar.net/x.";
        assert_eq!(
            detect_web_links(text),
            vec!["https://example.org/paper", "http://foo.com", "www.bar.net/x"]
        );
    }

    #[test]
    fn test_unbalanced_paren_trimmed() {
        let text = "(available at https://example.org/a_(b)/c).";
        assert_eq!(detect_web_links(text), vec!["https://example.org/a_(b)/c"]);
    }

    #[test]
    fn test_balanced_paren_kept() {
        assert_eq!(
            trim_link_boundary("https://en.wikipedia.org/wiki/Rust_(language)"),
            "https://en.wikipedia.org/wiki/Rust_(language)"
        );
    }

    #[test]
    fn test_quotes_and_brackets() {
        let text = "\"https://q.example.com/x\" [https://b.example.com/y]";
        assert_eq!(
            detect_web_links(text),
            vec!["https://q.example.com/x", "https://b.example.com/y"]
        );
    }

    #[test]
    fn test_no_links() {
        assert!(detect_web_links("no links here, just www and http").is_empty());
    }

    #[test]
    fn test_links_in_pages_canonicalizes_and_drops_invalid() {
        let pages = vec![
            "Project page: http://example.org/project.".to_string(),
            "Local demo at http://localhost:3000 and www.example.org/project".to_string(),
        ];
        let links = links_in_pages(&pages, &Canonicalizer::permissive());
        assert_eq!(
            links.into_iter().collect::<Vec<_>>(),
            vec![
                "https://example.org/project",
                "https://www.example.org/project"
            ]
        );
    }

    #[test]
    fn test_unreadable_bytes_yield_nothing() {
        assert!(page_texts(b"not a pdf").is_none());
        assert!(text_links(b"not a pdf", &Canonicalizer::permissive()).is_empty());
    }
}
