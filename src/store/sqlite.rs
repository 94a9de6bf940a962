//! SQLite-backed [`Store`]: metadata and mappings in the database, PDF bytes
//! as `<pdf_dir>/<id>.pdf` on disk.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::models::{DocumentId, RobustMapping, StoredDocument};

use super::Store;

pub struct SqliteStore {
    pool: SqlitePool,
    pdf_dir: PathBuf,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, pdf_dir: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            pdf_dir: pdf_dir.into(),
        }
    }

    /// Connect, ensure the schema and the PDF directory exist.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply_schema(&pool).await?;
        let pdf_dir = &config.storage.pdf_dir;
        tokio::fs::create_dir_all(pdf_dir)
            .await
            .with_context(|| format!("Failed to create {}", pdf_dir.display()))?;
        Ok(Self::new(pool, pdf_dir.clone()))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn pdf_path(&self, id: &DocumentId) -> PathBuf {
        self.pdf_dir.join(format!("{}.pdf", id))
    }
}

fn from_row(row: &SqliteRow) -> Result<StoredDocument> {
    let id: String = row.get("id");
    let size_bytes: i64 = row.get("size_bytes");
    let uploaded_at: i64 = row.get("uploaded_at");
    Ok(StoredDocument {
        id: id.parse()?,
        original_name: row.get("original_name"),
        size_bytes: u64::try_from(size_bytes).unwrap_or(0),
        uploaded_at: DateTime::from_timestamp(uploaded_at, 0).unwrap_or_default(),
    })
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("pdf.part");
    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to move {} into place", tmp.display()))?;
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    async fn put_document(
        &self,
        bytes: &[u8],
        original_name: Option<&str>,
    ) -> Result<StoredDocument> {
        let id = DocumentId::from_bytes(bytes);
        let path = self.pdf_path(&id);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            write_atomically(&path, bytes).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO documents (id, original_name, size_bytes, uploaded_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                original_name = COALESCE(excluded.original_name, documents.original_name)
            "#,
        )
        .bind(id.as_str())
        .bind(original_name)
        .bind(bytes.len() as i64)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        tracing::info!(id = %id, size = bytes.len(), "stored document");
        self.document(&id)
            .await?
            .with_context(|| format!("document {} vanished after insert", id))
    }

    async fn document(&self, id: &DocumentId) -> Result<Option<StoredDocument>> {
        let row = sqlx::query(
            "SELECT id, original_name, size_bytes, uploaded_at FROM documents WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(from_row).transpose()
    }

    async fn document_bytes(&self, id: &DocumentId) -> Result<Option<Vec<u8>>> {
        if self.document(id).await?.is_none() {
            return Ok(None);
        }
        let path = self.pdf_path(id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(id = %id, path = %path.display(), "document row without PDF file");
                Ok(None)
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    async fn save_mapping(&self, id: &DocumentId, mapping: &RobustMapping) -> Result<()> {
        let json = serde_json::to_string(mapping)?;
        sqlx::query(
            r#"
            INSERT INTO mappings (document_id, mapping_json, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(document_id) DO UPDATE SET
                mapping_json = excluded.mapping_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id.as_str())
        .bind(&json)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_mapping(&self, id: &DocumentId) -> Result<Option<RobustMapping>> {
        let json: Option<String> =
            sqlx::query_scalar("SELECT mapping_json FROM mappings WHERE document_id = ?")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;
        match json {
            Some(json) => Ok(Some(
                serde_json::from_str(&json)
                    .with_context(|| format!("corrupt mapping for {}", id))?,
            )),
            None => Ok(None),
        }
    }
}
