//! In-memory [`Store`] implementation for tests.
//!
//! Uses `HashMap`s behind `std::sync::RwLock`. Locks are never held across
//! an `.await`.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;

use crate::models::{DocumentId, RobustMapping, StoredDocument};

use super::Store;

struct Entry {
    meta: StoredDocument,
    bytes: Vec<u8>,
}

#[derive(Default)]
pub struct InMemoryStore {
    docs: RwLock<HashMap<DocumentId, Entry>>,
    mappings: RwLock<HashMap<DocumentId, RobustMapping>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mappings saved so far (tests inspect this).
    pub fn mapping_count(&self) -> usize {
        self.mappings.read().map(|m| m.len()).unwrap_or(0)
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl Store for InMemoryStore {
    async fn put_document(
        &self,
        bytes: &[u8],
        original_name: Option<&str>,
    ) -> Result<StoredDocument> {
        let id = DocumentId::from_bytes(bytes);
        let mut docs = self.docs.write().map_err(poisoned)?;
        let entry = docs.entry(id.clone()).or_insert_with(|| Entry {
            meta: StoredDocument {
                id,
                original_name: None,
                size_bytes: bytes.len() as u64,
                uploaded_at: Utc::now(),
            },
            bytes: bytes.to_vec(),
        });
        if let Some(name) = original_name {
            entry.meta.original_name = Some(name.to_string());
        }
        Ok(entry.meta.clone())
    }

    async fn document(&self, id: &DocumentId) -> Result<Option<StoredDocument>> {
        let docs = self.docs.read().map_err(poisoned)?;
        Ok(docs.get(id).map(|e| e.meta.clone()))
    }

    async fn document_bytes(&self, id: &DocumentId) -> Result<Option<Vec<u8>>> {
        let docs = self.docs.read().map_err(poisoned)?;
        Ok(docs.get(id).map(|e| e.bytes.clone()))
    }

    async fn save_mapping(&self, id: &DocumentId, mapping: &RobustMapping) -> Result<()> {
        let mut mappings = self.mappings.write().map_err(poisoned)?;
        mappings.insert(id.clone(), mapping.clone());
        Ok(())
    }

    async fn load_mapping(&self, id: &DocumentId) -> Result<Option<RobustMapping>> {
        let mappings = self.mappings.read().map_err(poisoned)?;
        Ok(mappings.get(id).cloned())
    }
}
