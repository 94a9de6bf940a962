//! Persistence for uploaded PDFs and their robust mappings.
//!
//! The [`Store`] trait is the only way the rest of the crate touches
//! storage. Documents are addressed solely by their [`DocumentId`], which is
//! derived from the bytes inside [`Store::put_document`] and never
//! recomputed afterwards.
//!
//! Implementations must be `Send + Sync`; the robustify pipeline persists
//! its mapping from a background task.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{DocumentId, RobustMapping, StoredDocument};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`put_document`](Store::put_document) | Store bytes, derive identity (idempotent) |
/// | [`document`](Store::document) | Metadata by identity |
/// | [`document_bytes`](Store::document_bytes) | Stored PDF bytes by identity |
/// | [`save_mapping`](Store::save_mapping) | Overwrite the robust mapping wholesale |
/// | [`load_mapping`](Store::load_mapping) | Last persisted robust mapping |
#[async_trait]
pub trait Store: Send + Sync {
    /// Store a PDF and return its metadata. Storing identical bytes again
    /// returns the same identity.
    async fn put_document(
        &self,
        bytes: &[u8],
        original_name: Option<&str>,
    ) -> Result<StoredDocument>;

    async fn document(&self, id: &DocumentId) -> Result<Option<StoredDocument>>;

    async fn document_bytes(&self, id: &DocumentId) -> Result<Option<Vec<u8>>>;

    /// Replace any prior mapping for `id`.
    async fn save_mapping(&self, id: &DocumentId, mapping: &RobustMapping) -> Result<()>;

    async fn load_mapping(&self, id: &DocumentId) -> Result<Option<RobustMapping>>;
}
