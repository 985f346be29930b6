//! Client side of the image converter: tracks each submitted file through
//! pending -> converting -> succeeded | failed and offers batch actions on top.

pub mod batch;
pub mod controller;
pub mod item;
pub mod observer;
pub mod saver;
pub mod transport;

pub use batch::Batch;
pub use controller::{ARCHIVE_FILE_NAME, ActionState, BatchController, ConvertAllReport};
pub use item::{DownloadHandle, Item, ItemError, ItemId, ItemStatus, SourceFile};
pub use observer::{ItemObserver, LogObserver, NoopObserver};
pub use saver::{DirSaver, FileSaver};
pub use transport::{ConversionTransport, HttpTransport, TransportError};
