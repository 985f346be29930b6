use crate::{controller::ActionState, item::Item};

/// Notification hooks fired by the batch controller on every state change.
///
/// All methods default to no-ops so implementors only pick what they render.
pub trait ItemObserver {
    /// A new item was registered; the place to render a thumbnail.
    fn item_added(&self, _item: &Item) {}

    fn status_changed(&self, _item: &Item) {}

    fn actions_changed(&self, _actions: ActionState) {}

    /// Every item was dropped.
    fn cleared(&self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ItemObserver for NoopObserver {}

/// Writes each change to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl ItemObserver for LogObserver {
    fn item_added(&self, item: &Item) {
        log::info!("added {} ({:.1} KB)", item.name(), item.size() as f64 / 1024.0);
    }

    fn status_changed(&self, item: &Item) {
        match item.error() {
            Some(error) => log::warn!("{}: {} ({})", item.name(), item.status(), error),
            None => log::info!("{}: {}", item.name(), item.status()),
        }
    }

    fn actions_changed(&self, actions: ActionState) {
        log::debug!("actions: {:?}", actions);
    }

    fn cleared(&self) {
        log::info!("cleared all items");
    }
}
