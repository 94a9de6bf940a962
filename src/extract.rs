//! Link extraction for PDF documents.
//!
//! Combines the two link sources into one Merged URI List:
//!
//! 1. `A`: canonical links from link annotations ([`crate::annotations`]).
//! 2. `T`: canonical links detected in the text layer ([`crate::text_links`]).
//! 3. `T'`: `T` reduced to one representative per overlapping group,
//!    preferring the shorter form.
//! 4. `T''`: members of `T'` not covered by any annotation link.
//! 5. `sorted(A ∪ T'')`.
//!
//! Annotation links are authoritative and always survive. Text links only
//! add what annotations missed. Sorting is lexicographic on the canonical
//! string, so the same bytes always yield the same list.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::annotations::annotation_links;
use crate::canonical::Canonicalizer;
use crate::overlap::{pick_new, pick_unique};
use crate::text_links::text_links;

/// MIME type accepted for uploads.
pub const MIME_PDF: &str = "application/pdf";

/// Document-level extraction failure. Per-candidate problems never surface
/// here; they are logged and dropped.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("document unreadable: {0}")]
    DocumentUnreadable(String),
}

/// Whether `bytes` start with a PDF header.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

/// Merge the annotation set with the text set (steps 3–5 above).
pub fn merge_links(annotation: BTreeSet<String>, text: BTreeSet<String>) -> Vec<String> {
    let reference: Vec<String> = annotation.iter().cloned().collect();
    let unique_text = pick_unique(text, false);
    let new_text = pick_new(unique_text, &reference);

    let mut merged = annotation;
    merged.extend(new_text);
    merged.into_iter().collect()
}

/// Extraction Orchestrator. Cheap to clone; shares one canonicalizer.
#[derive(Debug, Clone)]
pub struct Extractor {
    canonicalizer: Arc<Canonicalizer>,
}

impl Extractor {
    pub fn new(canonicalizer: Arc<Canonicalizer>) -> Self {
        Self { canonicalizer }
    }

    pub fn canonicalizer(&self) -> &Canonicalizer {
        &self.canonicalizer
    }

    /// Sorted, deduplicated, canonical links of one PDF.
    ///
    /// Fails only when the document itself cannot be parsed. The text layer
    /// is best-effort and never fails the call.
    pub fn extract_all(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
        let doc = lopdf::Document::load_mem(bytes)
            .map_err(|e| ExtractError::DocumentUnreadable(e.to_string()))?;

        let annotation = annotation_links(&doc, &self.canonicalizer);
        let text = text_links(bytes, &self.canonicalizer);
        tracing::debug!(
            annotation = annotation.len(),
            text = text.len(),
            "collected link candidates"
        );

        let merged = merge_links(annotation, text);
        tracing::info!(links = merged.len(), "extracted links");
        Ok(merged)
    }
}
