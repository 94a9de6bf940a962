//! CLI entry points. Each `run_*` function backs one `pdflinks` subcommand:
//! results go to stdout, diagnostics to stderr through `tracing`.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::archive::RobustLinksClient;
use crate::canonical::Canonicalizer;
use crate::config::Config;
use crate::extract::{looks_like_pdf, Extractor};
use crate::models::DocumentId;
use crate::robustify::RobustifyPipeline;
use crate::store::{SqliteStore, Store};

fn extractor(config: &Config) -> Result<Extractor> {
    let blacklist = Arc::new(config.load_blacklist()?);
    Ok(Extractor::new(Arc::new(Canonicalizer::new(blacklist))))
}

/// Extract off the async runtime; parsing is CPU-bound.
async fn extract_links(extractor: Extractor, bytes: Vec<u8>) -> Result<Vec<String>> {
    let links = tokio::task::spawn_blocking(move || extractor.extract_all(&bytes))
        .await
        .context("extraction task failed")??;
    Ok(links)
}

fn print_links(links: &[String], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(links)?);
    } else {
        for link in links {
            println!("{}", link);
        }
    }
    Ok(())
}

async fn stored_bytes(store: &SqliteStore, id: &DocumentId) -> Result<Vec<u8>> {
    match store.document_bytes(id).await? {
        Some(bytes) => Ok(bytes),
        None => bail!("document not found: {}", id),
    }
}

/// `pdflinks upload <file>`: store a PDF and print its id.
pub async fn run_upload(config: &Config, path: &Path) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if !looks_like_pdf(&bytes) {
        bail!("{} is not a PDF", path.display());
    }
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned());

    let store = SqliteStore::open(config).await?;
    let doc = store.put_document(&bytes, name.as_deref()).await?;
    store.close().await;

    println!("{}", doc.id);
    Ok(())
}

/// `pdflinks extract <file>`: print the links of a local PDF without storing it.
pub async fn run_extract(config: &Config, path: &Path, json: bool) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let links = extract_links(extractor(config)?, bytes).await?;
    print_links(&links, json)
}

/// `pdflinks links <id>`: print the links of a stored PDF.
pub async fn run_links(config: &Config, id: &str, json: bool) -> Result<()> {
    let id: DocumentId = id.parse()?;
    let store = SqliteStore::open(config).await?;
    let bytes = stored_bytes(&store, &id).await;
    store.close().await;

    let links = extract_links(extractor(config)?, bytes?).await?;
    print_links(&links, json)
}

/// `pdflinks robustify <id> [URI...] [--all]`: stream NDJSON outcomes to
/// stdout and persist the mapping. Ctrl-C cancels the remaining calls.
pub async fn run_robustify(config: &Config, id: &str, uris: Vec<String>, all: bool) -> Result<()> {
    let id: DocumentId = id.parse()?;
    let store = Arc::new(SqliteStore::open(config).await?);

    let uris = if all {
        let bytes = stored_bytes(&store, &id).await?;
        let mut links = extract_links(extractor(config)?, bytes).await?;
        links.extend(uris);
        links
    } else {
        if store.document(&id).await?.is_none() {
            bail!("document not found: {}", id);
        }
        uris
    };
    if uris.is_empty() {
        bail!("nothing to robustify: pass URIs or --all");
    }

    let archiver = Arc::new(RobustLinksClient::new(&config.archive)?);
    let pipeline = RobustifyPipeline::new(archiver, store.clone(), config.archive.concurrency);
    let mut stream = pipeline.start(id, uris);

    let mut stdout = std::io::stdout();
    loop {
        tokio::select! {
            entry = stream.next() => match entry {
                Some(entry) => {
                    stdout.write_all(entry.to_line().as_bytes())?;
                    stdout.flush()?;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Cancelling; completed results will be saved.");
                stream.cancel();
                break;
            }
        }
    }

    let mapping = stream.finish().await?;
    let ok = mapping.values().filter(|e| e.ok).count();
    eprintln!(
        "{} archived, {} failed; mapping saved.",
        ok,
        mapping.len() - ok
    );
    store.close().await;
    Ok(())
}

/// `pdflinks mappings <id>`: print the persisted robust mapping.
pub async fn run_mappings(config: &Config, id: &str) -> Result<()> {
    let id: DocumentId = id.parse()?;
    let store = SqliteStore::open(config).await?;
    let mapping = store.load_mapping(&id).await;
    store.close().await;

    match mapping? {
        Some(mapping) => {
            println!("{}", serde_json::to_string_pretty(&mapping)?);
            Ok(())
        }
        None => bail!("no robust mapping for {}", id),
    }
}
