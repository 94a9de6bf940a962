//! Concurrent, streaming robustification of a batch of URIs.
//!
//! [`RobustifyPipeline::start`] spawns a driver task that keeps at most
//! `concurrency` archive calls in flight and forwards each finished
//! [`RobustEntry`] to a channel as soon as it completes. Results therefore
//! arrive in completion order, never submission order.
//!
//! The consumer side is a [`RobustifyStream`]. Dropping it, or calling
//! [`RobustifyStream::cancel`], trips a [`CancelToken`]. The driver then
//! stops dispatching, aborts whatever is still in flight, and falls through
//! to persistence.
//!
//! Persistence runs after the driver on every exit path (completion,
//! cancellation, or a panic inside the driver), writing whatever mapping
//! was collected so far. The result channel closes only after that write,
//! so a consumer that reads to the end can rely on the mapping being saved.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::{FutureExt, Stream};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};

use crate::archive::Archiver;
use crate::models::{DocumentId, RobustEntry, RobustMapping};
use crate::store::Store;

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only ends on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Trim URIs, drop empty ones and collapse duplicates (first occurrence
/// wins). Each remaining URI owns exactly one mapping key.
pub fn dedupe_uris<I, S>(uris: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for uri in uris {
        let uri = uri.as_ref().trim();
        if uri.is_empty() {
            continue;
        }
        if seen.insert(uri.to_string()) {
            out.push(uri.to_string());
        } else {
            tracing::warn!(uri, "duplicate URI in robustify batch; keeping first");
        }
    }
    out
}

/// Bounded worker pool over an [`Archiver`], persisting into a [`Store`].
#[derive(Clone)]
pub struct RobustifyPipeline {
    archiver: Arc<dyn Archiver>,
    store: Arc<dyn Store>,
    concurrency: usize,
}

impl RobustifyPipeline {
    pub fn new(archiver: Arc<dyn Archiver>, store: Arc<dyn Store>, concurrency: usize) -> Self {
        Self {
            archiver,
            store,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Start robustifying `uris` for document `id`.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start<I, S>(&self, id: DocumentId, uris: I) -> RobustifyStream
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let uris = dedupe_uris(uris);
        // Room for every result, so the driver never waits on a slow reader.
        let (tx, rx) = mpsc::channel(uris.len().max(1));
        let cancel = CancelToken::new();

        let driver = Driver {
            archiver: Arc::clone(&self.archiver),
            concurrency: self.concurrency,
            cancel: cancel.clone(),
            tx,
        };
        let store = Arc::clone(&self.store);

        tracing::info!(id = %id, uris = uris.len(), concurrency = self.concurrency, "robustify started");
        let handle = tokio::spawn(async move {
            let mut mapping = RobustMapping::new();
            let driven = AssertUnwindSafe(driver.drive(uris, &mut mapping))
                .catch_unwind()
                .await;
            if driven.is_err() {
                tracing::error!(id = %id, "robustify driver panicked");
            }
            persist(store.as_ref(), &id, &mapping).await;
            drop(driver);
            mapping
        });

        RobustifyStream {
            rx,
            cancel,
            handle: Some(handle),
        }
    }

    /// Run a batch to completion and return the final mapping.
    pub async fn run<I, S>(&self, id: DocumentId, uris: I) -> Result<RobustMapping>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.start(id, uris).finish().await
    }
}

struct Driver {
    archiver: Arc<dyn Archiver>,
    concurrency: usize,
    cancel: CancelToken,
    tx: mpsc::Sender<RobustEntry>,
}

impl Driver {
    async fn drive(&self, uris: Vec<String>, mapping: &mut RobustMapping) {
        let total = uris.len();
        let mut pending = uris.into_iter();
        let mut in_flight: JoinSet<(String, RobustEntry)> = JoinSet::new();

        loop {
            while in_flight.len() < self.concurrency && !self.cancel.is_cancelled() {
                let Some(uri) = pending.next() else { break };
                let archiver = Arc::clone(&self.archiver);
                in_flight.spawn(async move {
                    let entry = archiver.robustify(&uri).await;
                    (uri, entry)
                });
            }
            if in_flight.is_empty() {
                break;
            }

            let joined = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = self.tx.closed() => {
                    self.cancel.cancel();
                    break;
                }
                joined = in_flight.join_next() => joined,
            };

            match joined {
                Some(Ok((uri, entry))) => {
                    mapping.insert(uri, entry.clone());
                    if self.tx.send(entry).await.is_err() {
                        self.cancel.cancel();
                    }
                }
                Some(Err(e)) => tracing::error!(error = %e, "robustify worker failed"),
                None => break,
            }
        }

        if self.cancel.is_cancelled() {
            tracing::info!(
                completed = mapping.len(),
                total,
                abandoned = in_flight.len(),
                "robustify cancelled"
            );
        }
        in_flight.abort_all();
    }
}

async fn persist(store: &dyn Store, id: &DocumentId, mapping: &RobustMapping) {
    match store.save_mapping(id, mapping).await {
        Ok(()) => tracing::info!(id = %id, entries = mapping.len(), "persisted robust mapping"),
        Err(e) => tracing::error!(id = %id, error = %e, "failed to persist robust mapping"),
    }
}

/// Consumer side of a running batch. Dropping it cancels the batch.
pub struct RobustifyStream {
    rx: mpsc::Receiver<RobustEntry>,
    cancel: CancelToken,
    handle: Option<JoinHandle<RobustMapping>>,
}

impl RobustifyStream {
    /// Next completed entry, or `None` once the batch is over.
    pub async fn next(&mut self) -> Option<RobustEntry> {
        self.rx.recv().await
    }

    /// Stop dispatching new calls. Already-received entries stay persisted.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Wait for the driver to finish and persist, returning the mapping.
    pub async fn finish(mut self) -> Result<RobustMapping> {
        let handle = self
            .handle
            .take()
            .context("robustify stream already finished")?;
        handle.await.context("robustify driver task failed")
    }

    /// NDJSON lines, one per completed entry, newline included.
    pub fn into_lines(self) -> impl Stream<Item = String> + Send + 'static {
        futures::stream::unfold(self, |mut stream| async move {
            let entry = stream.next().await?;
            Some((entry.to_line(), stream))
        })
    }
}

impl Drop for RobustifyStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
