use std::{io, sync::Arc};

use bytes::Bytes;
use tokio::{
    sync::{Semaphore, mpsc},
    task::{JoinError, JoinHandle, JoinSet},
};
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    archive::{
        ArchiveError, ArchiveStreamer, ChunkSink, converted_entry_name, placeholder_entry_name,
        placeholder_message,
    },
    convert::{ConversionError, ConversionOutcome, ConvertedImage, Converter},
};

/// One uploaded payload as received, before any decoding.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub name: String,
    pub bytes: Bytes,
}

impl SourceImage {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("no images were provided")]
    Empty,
}

/// What one input contributes to the archive.
#[derive(Debug)]
struct ArchiveEntry {
    name: String,
    data: Bytes,
    failed: bool,
}

impl ArchiveEntry {
    fn from_outcome(original: &str, outcome: Result<ConvertedImage, ConversionError>) -> Self {
        match outcome {
            Ok(converted) => Self {
                name: converted_entry_name(original, converted.format),
                data: converted.data,
                failed: false,
            },
            Err(e) => {
                log::warn!("convert {} failed ({}): {}", original, e.tag(), e);
                Self::placeholder(original, &e.to_string())
            }
        }
    }

    fn placeholder(original: &str, cause: &str) -> Self {
        Self {
            name: placeholder_entry_name(original),
            data: Bytes::from(placeholder_message(original, cause)),
            failed: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArchiveSummary {
    pub entries: usize,
    pub failed: usize,
}

/// A running archive build.
///
/// `stream` carries the ZIP bytes as they are produced; `done` resolves once
/// every item was attempted and the archive was finalized, or with the error
/// that cut the stream short.
pub struct ArchiveJob {
    pub stream: ReceiverStream<io::Result<Bytes>>,
    pub done: JoinHandle<Result<ArchiveSummary, ArchiveError>>,
}

/// Fans conversions out over the blocking pool and serializes the results
/// into a single archive writer.
///
/// Clones share one conversion limiter, so the bound holds across every
/// request served by the same orchestrator.
#[derive(Debug, Clone)]
pub struct BatchOrchestrator {
    converter: Converter,
    concurrency: usize,
    limiter: Arc<Semaphore>,
    queue_capacity: usize,
    chunk_capacity: usize,
}

impl Default for BatchOrchestrator {
    fn default() -> Self {
        Self::new(Converter::default())
    }
}

impl BatchOrchestrator {
    pub fn new(converter: Converter) -> Self {
        let concurrency = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            converter,
            concurrency,
            limiter: Arc::new(Semaphore::new(concurrency)),
            queue_capacity: 16,
            chunk_capacity: 32,
        }
    }

    /// Upper bound on conversions running at the same time.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self.limiter = Arc::new(Semaphore::new(self.concurrency));
        self
    }

    /// Capacity of the queue between the converters and the archive writer.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Number of archive chunks buffered ahead of the response body.
    pub fn with_chunk_capacity(mut self, capacity: usize) -> Self {
        self.chunk_capacity = capacity.max(1);
        self
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub async fn convert_one(&self, bytes: Bytes) -> Result<ConvertedImage, ConversionError> {
        let _permit = self.limiter.acquire().await.ok();
        let converter = self.converter;
        task_outcome(tokio::task::spawn_blocking(move || converter.convert(&bytes)).await)
    }

    /// Starts converting `items` into a streamed archive.
    ///
    /// Must be called from within a tokio runtime. Entry order follows
    /// completion order, not input order.
    pub fn convert_and_archive(&self, items: Vec<SourceImage>) -> Result<ArchiveJob, BatchError> {
        if items.is_empty() {
            return Err(BatchError::Empty);
        }

        let (chunk_tx, chunk_rx) = mpsc::channel(self.chunk_capacity);
        let (entry_tx, entry_rx) = mpsc::channel(self.queue_capacity);

        let total = items.len();
        log::debug!(
            "archive: converting {} item(s), concurrency {}",
            total,
            self.concurrency
        );

        tokio::spawn(produce_entries(
            self.converter,
            Arc::clone(&self.limiter),
            items,
            entry_tx,
        ));

        let done = tokio::spawn(write_archive(entry_rx, chunk_tx, total));

        Ok(ArchiveJob {
            stream: ReceiverStream::new(chunk_rx),
            done,
        })
    }
}

/// Folds a lost conversion task into an ordinary failed outcome.
fn task_outcome(joined: Result<ConversionOutcome, JoinError>) -> ConversionOutcome {
    joined.unwrap_or_else(|e| {
        log::error!("conversion task failed: {}", e);
        Err(ConversionError::Interrupted(e.to_string()))
    })
}

async fn produce_entries(
    converter: Converter,
    limiter: Arc<Semaphore>,
    items: Vec<SourceImage>,
    entry_tx: mpsc::Sender<ArchiveEntry>,
) {
    let mut tasks = JoinSet::new();
    for item in items {
        let limiter = Arc::clone(&limiter);
        tasks.spawn(async move {
            let _permit = limiter.acquire_owned().await.ok();
            let SourceImage { name, bytes } = item;
            let joined = tokio::task::spawn_blocking(move || converter.convert(&bytes)).await;
            ArchiveEntry::from_outcome(&name, task_outcome(joined))
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let entry = match joined {
            Ok(entry) => entry,
            Err(e) => {
                log::error!("archive producer task failed: {}", e);
                continue;
            }
        };
        if entry_tx.send(entry).await.is_err() {
            // writer is gone, nothing left to feed
            tasks.abort_all();
            break;
        }
    }
}

/// Owns the streamer for the lifetime of one archive. Waiting for entries
/// happens here on the runtime; only the zip writes themselves go to the
/// blocking pool, one at a time.
async fn write_archive(
    mut entry_rx: mpsc::Receiver<ArchiveEntry>,
    chunk_tx: mpsc::Sender<io::Result<Bytes>>,
    total: usize,
) -> Result<ArchiveSummary, ArchiveError> {
    let streamer = ArchiveStreamer::open(ChunkSink::new(chunk_tx.clone()));
    let mut summary = ArchiveSummary::default();

    match append_all(&mut entry_rx, streamer, &mut summary).await {
        Ok(_) => {
            if summary.entries != total {
                // only happens if a producer task was lost
                log::error!("archive: {} of {} entries produced", summary.entries, total);
            }
            log::info!(
                "archive: finalized {} entries ({} failed)",
                summary.entries,
                summary.failed
            );
            Ok(summary)
        }
        Err(e) => {
            log::error!("archive: aborted after {} entries: {}", summary.entries, e);
            let _ = chunk_tx.send(Err(io::Error::other(e.to_string()))).await;
            Err(e)
        }
    }
}

async fn append_all(
    entry_rx: &mut mpsc::Receiver<ArchiveEntry>,
    mut streamer: ArchiveStreamer<ChunkSink>,
    summary: &mut ArchiveSummary,
) -> Result<usize, ArchiveError> {
    while let Some(entry) = entry_rx.recv().await {
        let ArchiveEntry { name, data, failed } = entry;
        let len = data.len();
        let (returned, appended) = tokio::task::spawn_blocking(move || {
            let appended = streamer.append(&name, &data);
            (streamer, appended)
        })
        .await
        .map_err(writer_lost)?;
        streamer = returned;

        let name = appended?;
        log::debug!("archive: appended {} ({} bytes)", name, len);
        summary.entries += 1;
        if failed {
            summary.failed += 1;
        }
    }
    tokio::task::spawn_blocking(move || streamer.finalize())
        .await
        .map_err(writer_lost)?
}

fn writer_lost(e: JoinError) -> ArchiveError {
    ArchiveError::Io(io::Error::other(e))
}

#[cfg(test)]
#[path = "batch_test.rs"]
mod batch_test;
