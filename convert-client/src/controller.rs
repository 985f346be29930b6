use std::path::PathBuf;

use futures::{StreamExt, stream::FuturesUnordered};

use crate::{
    batch::Batch,
    item::{ItemId, ItemStatus, SourceFile},
    observer::{ItemObserver, NoopObserver},
    saver::FileSaver,
    transport::ConversionTransport,
};

pub const ARCHIVE_FILE_NAME: &str = "converted-images.zip";

/// Which batch-level actions should be offered right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionState {
    pub convert_visible: bool,
    pub convert_enabled: bool,
    pub archive_visible: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertAllReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Owns one session's batch and drives it through the transport.
pub struct BatchController<T, O = NoopObserver> {
    transport: T,
    observer: O,
    batch: Batch,
    converting: bool,
}

impl<T: ConversionTransport> BatchController<T> {
    pub fn new(transport: T) -> Self {
        Self::with_observer(transport, NoopObserver)
    }
}

impl<T: ConversionTransport, O: ItemObserver> BatchController<T, O> {
    pub fn with_observer(transport: T, observer: O) -> Self {
        Self {
            transport,
            observer,
            batch: Batch::new(),
            converting: false,
        }
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn actions(&self) -> ActionState {
        let has_items = !self.batch.is_empty();
        ActionState {
            convert_visible: has_items,
            convert_enabled: has_items && !self.converting,
            archive_visible: self.batch.count(ItemStatus::Succeeded) >= 2,
        }
    }

    /// Registers every image file not already in the batch. Returns how many
    /// were added.
    pub fn add_files(&mut self, files: impl IntoIterator<Item = SourceFile>) -> usize {
        let mut added = 0;
        for file in files {
            if !file.is_image() {
                log::debug!("skip {}: not an image ({})", file.name, file.mime_type);
                continue;
            }
            let name = file.name.clone();
            match self.batch.insert(file) {
                Some(item) => {
                    self.observer.item_added(item);
                    added += 1;
                }
                None => log::debug!("skip {}: already added", name),
            }
        }
        self.observer.actions_changed(self.actions());
        added
    }

    /// Converts every pending item, one request each, all in flight at once.
    ///
    /// Each outcome is applied to its own item as soon as it arrives; the call
    /// returns once all of them are in. Items that are not pending are left
    /// alone, so calling this again only picks up newly added files.
    pub async fn convert_all(&mut self) -> ConvertAllReport {
        let pending: Vec<ItemId> = self
            .batch
            .with_status(ItemStatus::Pending)
            .map(|item| item.id().clone())
            .collect();
        if pending.is_empty() {
            return ConvertAllReport::default();
        }

        self.converting = true;
        self.observer.actions_changed(self.actions());

        let report =
            run_conversions(&self.transport, &self.observer, &mut self.batch, pending).await;

        self.converting = false;
        self.observer.actions_changed(self.actions());
        log::info!(
            "converted {} item(s): {} succeeded, {} failed",
            report.attempted,
            report.succeeded,
            report.failed
        );
        report
    }

    /// Re-submits every succeeded item in one archive request and saves the
    /// result. Does nothing when no item has succeeded.
    pub async fn download_archive<S: FileSaver>(
        &self,
        saver: &S,
    ) -> anyhow::Result<Option<PathBuf>> {
        let files: Vec<SourceFile> = self
            .batch
            .with_status(ItemStatus::Succeeded)
            .map(|item| item.source().clone())
            .collect();
        if files.is_empty() {
            return Ok(None);
        }

        let count = files.len();
        let archive = self.transport.convert_archive(files).await?;
        let path = saver.save(ARCHIVE_FILE_NAME, &archive)?;
        log::info!("saved archive of {} file(s) to {}", count, path.display());
        Ok(Some(path))
    }

    /// Saves one succeeded item's converted payload.
    pub fn save_item<S: FileSaver>(&self, id: &ItemId, saver: &S) -> anyhow::Result<PathBuf> {
        let item = self
            .batch
            .get(id)
            .ok_or_else(|| anyhow::anyhow!("unknown item {}", id))?;
        let handle = item
            .download()
            .ok_or_else(|| anyhow::anyhow!("{} has no converted payload ({})", id, item.status()))?;
        saver.save(handle.file_name(), handle.data())
    }

    /// Drops every item and its payload.
    pub fn clear_all(&mut self) -> usize {
        let cleared = self.batch.clear();
        self.observer.cleared();
        self.observer.actions_changed(self.actions());
        cleared
    }
}

async fn run_conversions<T: ConversionTransport, O: ItemObserver>(
    transport: &T,
    observer: &O,
    batch: &mut Batch,
    pending: Vec<ItemId>,
) -> ConvertAllReport {
    let mut report = ConvertAllReport::default();
    let mut in_flight = FuturesUnordered::new();

    for id in pending {
        let Some(item) = batch.get_mut(&id) else {
            continue;
        };
        if let Err(e) = item.begin_conversion() {
            log::warn!("{}", e);
            continue;
        }
        observer.status_changed(item);

        let file = item.source().clone();
        report.attempted += 1;
        in_flight.push(async move { (id, transport.convert_single(file).await) });
    }

    while let Some((id, outcome)) = in_flight.next().await {
        let Some(item) = batch.get_mut(&id) else {
            continue;
        };
        let succeeded = outcome.is_ok();
        if let Err(e) = item.complete(outcome) {
            log::error!("{}", e);
            continue;
        }
        if succeeded {
            report.succeeded += 1;
        } else {
            report.failed += 1;
        }
        observer.status_changed(item);
    }

    report
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod controller_test;
