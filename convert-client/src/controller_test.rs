// ============================================================================
// BatchController Tests
// ============================================================================

use std::{
    collections::HashSet,
    path::PathBuf,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use bytes::Bytes;

use super::{ARCHIVE_FILE_NAME, ActionState, BatchController, ConvertAllReport};
use crate::{
    item::{Item, ItemId, ItemStatus, SourceFile},
    observer::ItemObserver,
    saver::FileSaver,
    transport::{ConversionTransport, TransportError},
};

/// Converts everything except files whose name is listed as broken.
#[derive(Default)]
struct MockTransport {
    broken: HashSet<String>,
    single_calls: AtomicUsize,
    archive_calls: Mutex<Vec<Vec<String>>>,
}

impl MockTransport {
    fn with_broken(names: &[&str]) -> Self {
        Self {
            broken: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }
}

impl ConversionTransport for MockTransport {
    async fn convert_single(&self, file: SourceFile) -> Result<Bytes, TransportError> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.broken.contains(&file.name) {
            return Err(TransportError::Status {
                status: 500,
                message: "Failed to convert the image.".to_string(),
            });
        }
        Ok(Bytes::from(format!("jpeg:{}", file.name)))
    }

    async fn convert_archive(&self, files: Vec<SourceFile>) -> Result<Bytes, TransportError> {
        let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        let body = Bytes::from(names.join(","));
        self.archive_calls.lock().unwrap().push(names);
        Ok(body)
    }
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
    actions: Mutex<Vec<ActionState>>,
}

impl RecordingObserver {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ItemObserver for RecordingObserver {
    fn item_added(&self, item: &Item) {
        self.events.lock().unwrap().push(format!("added {}", item.name()));
    }

    fn status_changed(&self, item: &Item) {
        self.events
            .lock()
            .unwrap()
            .push(format!("{} {}", item.name(), item.status()));
    }

    fn actions_changed(&self, actions: ActionState) {
        self.actions.lock().unwrap().push(actions);
    }

    fn cleared(&self) {
        self.events.lock().unwrap().push("cleared".to_string());
    }
}

#[derive(Default)]
struct MemorySaver {
    saved: Mutex<Vec<(String, Vec<u8>)>>,
}

impl FileSaver for MemorySaver {
    fn save(&self, file_name: &str, data: &[u8]) -> anyhow::Result<PathBuf> {
        self.saved
            .lock()
            .unwrap()
            .push((file_name.to_string(), data.to_vec()));
        Ok(PathBuf::from(file_name))
    }
}

fn image(name: &str) -> SourceFile {
    SourceFile::new(name, "image/png", 1_700_000_000_000, vec![0u8; 16])
}

fn statuses<T: ConversionTransport, O: ItemObserver>(
    controller: &BatchController<T, O>,
) -> Vec<(String, ItemStatus)> {
    controller
        .batch()
        .iter()
        .map(|item| (item.name().to_string(), item.status()))
        .collect()
}

// ------------------------------------------------------------------------
// add_files
// ------------------------------------------------------------------------

#[test]
fn test_add_files_filters_non_images() {
    let mut controller = BatchController::new(MockTransport::default());
    let added = controller.add_files(vec![
        image("a.png"),
        SourceFile::new("notes.txt", "text/plain", 1, vec![1u8]),
        SourceFile::new("b.webp", "image/webp", 1, vec![1u8]),
    ]);

    assert_eq!(added, 2);
    assert_eq!(controller.batch().len(), 2);
    assert!(
        controller
            .batch()
            .iter()
            .all(|item| item.status() == ItemStatus::Pending)
    );
}

#[test]
fn test_add_same_file_twice_keeps_one_item() {
    let mut controller = BatchController::new(MockTransport::default());
    assert_eq!(controller.add_files(vec![image("a.png")]), 1);
    assert_eq!(controller.add_files(vec![image("a.png")]), 0);
    assert_eq!(controller.batch().len(), 1);

    // same name, different timestamp is a different file
    let newer = SourceFile::new("a.png", "image/png", 1_800_000_000_000, vec![1u8]);
    assert_eq!(controller.add_files(vec![newer]), 1);
    assert_eq!(controller.batch().len(), 2);
}

#[test]
fn test_add_files_preserves_insertion_order_and_notifies() {
    let mut controller =
        BatchController::with_observer(MockTransport::default(), RecordingObserver::default());
    controller.add_files(vec![image("z.png"), image("a.png"), image("m.png")]);

    let names: Vec<&str> = controller.batch().iter().map(|i| i.name()).collect();
    assert_eq!(names, vec!["z.png", "a.png", "m.png"]);
    assert_eq!(
        controller.observer().events(),
        vec!["added z.png", "added a.png", "added m.png"]
    );
}

#[test]
fn test_actions_for_empty_and_pending_batch() {
    let mut controller = BatchController::new(MockTransport::default());
    assert_eq!(controller.actions(), ActionState::default());

    controller.add_files(vec![image("a.png"), image("b.png")]);
    assert_eq!(
        controller.actions(),
        ActionState {
            convert_visible: true,
            convert_enabled: true,
            archive_visible: false,
        }
    );
}

// ------------------------------------------------------------------------
// convert_all
// ------------------------------------------------------------------------

#[tokio::test]
async fn test_three_valid_one_corrupt_then_archive() {
    let mut controller = BatchController::new(MockTransport::with_broken(&["corrupt.png"]));
    controller.add_files(vec![
        image("one.png"),
        image("two.png"),
        image("corrupt.png"),
        image("three.png"),
    ]);

    let report = controller.convert_all().await;
    assert_eq!(
        report,
        ConvertAllReport {
            attempted: 4,
            succeeded: 3,
            failed: 1,
        }
    );
    assert_eq!(
        statuses(&controller),
        vec![
            ("one.png".to_string(), ItemStatus::Succeeded),
            ("two.png".to_string(), ItemStatus::Succeeded),
            ("corrupt.png".to_string(), ItemStatus::Failed),
            ("three.png".to_string(), ItemStatus::Succeeded),
        ]
    );
    assert!(controller.actions().archive_visible);
    assert!(controller.actions().convert_enabled);

    let saver = MemorySaver::default();
    let path = controller.download_archive(&saver).await.unwrap();
    assert_eq!(path, Some(PathBuf::from(ARCHIVE_FILE_NAME)));

    let calls = controller.transport.archive_calls.lock().unwrap().clone();
    assert_eq!(calls, vec![vec!["one.png", "two.png", "three.png"]]);
    let saved = saver.saved.lock().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].0, "converted-images.zip");
}

#[tokio::test]
async fn test_single_success_keeps_archive_hidden() {
    let mut controller = BatchController::new(MockTransport::default());
    controller.add_files(vec![image("only.png")]);

    let report = controller.convert_all().await;
    assert_eq!(report.succeeded, 1);
    assert!(!controller.actions().archive_visible);

    let id = ItemId::new("only.png", 1_700_000_000_000);
    let handle = controller.batch().get(&id).unwrap().download().unwrap();
    assert_eq!(handle.file_name(), "only.jpg");
    assert_eq!(&handle.data()[..], b"jpeg:only.png");
}

#[tokio::test]
async fn test_convert_all_again_is_noop() {
    let observer = RecordingObserver::default();
    let mut controller =
        BatchController::with_observer(MockTransport::with_broken(&["b.png"]), observer);
    controller.add_files(vec![image("a.png"), image("b.png")]);
    controller.convert_all().await;

    let calls_before = controller.transport.single_calls();
    let states_before = statuses(&controller);
    let events_before = controller.observer().events().len();

    let report = controller.convert_all().await;

    assert_eq!(report, ConvertAllReport::default());
    assert_eq!(controller.transport.single_calls(), calls_before);
    assert_eq!(statuses(&controller), states_before);
    assert_eq!(controller.observer().events().len(), events_before);
}

#[tokio::test]
async fn test_convert_all_only_picks_up_new_pending_items() {
    let mut controller = BatchController::new(MockTransport::default());
    controller.add_files(vec![image("a.png")]);
    controller.convert_all().await;
    assert_eq!(controller.transport.single_calls(), 1);

    controller.add_files(vec![image("b.png")]);
    let report = controller.convert_all().await;
    assert_eq!(report.attempted, 1);
    assert_eq!(controller.transport.single_calls(), 2);
    assert!(controller.actions().archive_visible);
}

#[tokio::test]
async fn test_convert_all_notifies_each_transition() {
    let mut controller = BatchController::with_observer(
        MockTransport::with_broken(&["bad.png"]),
        RecordingObserver::default(),
    );
    controller.add_files(vec![image("ok.png"), image("bad.png")]);
    controller.convert_all().await;

    let events = controller.observer().events();
    assert!(events.contains(&"ok.png converting".to_string()));
    assert!(events.contains(&"ok.png succeeded".to_string()));
    assert!(events.contains(&"bad.png converting".to_string()));
    assert!(events.contains(&"bad.png failed".to_string()));

    let converting = events.iter().position(|e| e == "ok.png converting").unwrap();
    let succeeded = events.iter().position(|e| e == "ok.png succeeded").unwrap();
    assert!(converting < succeeded);

    // the convert action was disabled while requests were in flight
    let actions = controller.observer().actions.lock().unwrap().clone();
    assert!(actions.iter().any(|a| a.convert_visible && !a.convert_enabled));
    assert!(actions.last().unwrap().convert_enabled);
}

#[tokio::test]
async fn test_archive_visibility_tracks_succeeded_count() {
    let mut controller = BatchController::with_observer(
        MockTransport::with_broken(&["x.png", "y.png"]),
        RecordingObserver::default(),
    );
    controller.add_files(vec![image("x.png"), image("y.png"), image("z.png")]);
    controller.convert_all().await;

    assert_eq!(controller.batch().count(ItemStatus::Succeeded), 1);
    assert!(!controller.actions().archive_visible);
    for actions in controller.observer().actions.lock().unwrap().iter() {
        assert!(!actions.archive_visible);
    }
}

// ------------------------------------------------------------------------
// downloads and clear_all
// ------------------------------------------------------------------------

#[tokio::test]
async fn test_download_archive_without_successes_is_noop() {
    let mut controller = BatchController::new(MockTransport::with_broken(&["a.png"]));
    controller.add_files(vec![image("a.png")]);
    controller.convert_all().await;

    let saver = MemorySaver::default();
    assert_eq!(controller.download_archive(&saver).await.unwrap(), None);
    assert!(controller.transport.archive_calls.lock().unwrap().is_empty());
    assert!(saver.saved.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_save_item_uses_converted_name() {
    let mut controller = BatchController::new(MockTransport::with_broken(&["b.png"]));
    controller.add_files(vec![image("a.png"), image("b.png")]);
    controller.convert_all().await;

    let saver = MemorySaver::default();
    let ok = ItemId::new("a.png", 1_700_000_000_000);
    controller.save_item(&ok, &saver).unwrap();
    assert_eq!(
        saver.saved.lock().unwrap()[0],
        ("a.jpg".to_string(), b"jpeg:a.png".to_vec())
    );

    let failed = ItemId::new("b.png", 1_700_000_000_000);
    assert!(controller.save_item(&failed, &saver).is_err());
    assert!(
        controller
            .save_item(&ItemId::new("missing.png", 0), &saver)
            .is_err()
    );
}

#[tokio::test]
async fn test_clear_all_resets_everything() {
    let mut controller =
        BatchController::with_observer(MockTransport::default(), RecordingObserver::default());
    controller.add_files(vec![image("a.png"), image("b.png")]);
    controller.convert_all().await;
    assert!(controller.actions().archive_visible);

    assert_eq!(controller.clear_all(), 2);
    assert!(controller.batch().is_empty());
    assert_eq!(controller.actions(), ActionState::default());
    assert_eq!(controller.observer().events().last().unwrap(), "cleared");

    // the same file can be added again after clearing
    assert_eq!(controller.add_files(vec![image("a.png")]), 1);
}
