use std::fmt;

use bytes::Bytes;

use crate::transport::TransportError;

/// Identity of a submitted file: name plus last-modification time, the same
/// pair a browser `File` exposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(name: &str, last_modified_ms: i64) -> Self {
        Self(format!("{}-{}", name, last_modified_ms))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file picked by the user, before it becomes an [`Item`].
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub mime_type: String,
    pub last_modified_ms: i64,
    pub bytes: Bytes,
}

impl SourceFile {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        last_modified_ms: i64,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            last_modified_ms,
            bytes: bytes.into(),
        }
    }

    pub fn id(&self) -> ItemId {
        ItemId::new(&self.name, self.last_modified_ms)
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemStatus {
    Pending,
    Converting,
    Succeeded,
    Failed,
}

impl ItemStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Succeeded | ItemStatus::Failed)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Converting => "converting",
            ItemStatus::Succeeded => "succeeded",
            ItemStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ItemError {
    #[error("item {id}: cannot go from {from} to {to}")]
    InvalidTransition {
        id: ItemId,
        from: ItemStatus,
        to: ItemStatus,
    },
}

/// Converted payload kept on the client until the batch is cleared.
#[derive(Debug, Clone)]
pub struct DownloadHandle {
    file_name: String,
    data: Bytes,
}

impl DownloadHandle {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

/// Name a converted file is saved under: the source name with its last
/// extension swapped for `.jpg`.
pub fn converted_file_name(name: &str) -> String {
    let base = match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    };
    format!("{}.jpg", base)
}

/// One submitted image and where it is in its conversion lifecycle.
#[derive(Debug)]
pub struct Item {
    id: ItemId,
    source: SourceFile,
    status: ItemStatus,
    converted: Option<DownloadHandle>,
    error: Option<String>,
}

impl Item {
    pub fn new(source: SourceFile) -> Self {
        Self {
            id: source.id(),
            source,
            status: ItemStatus::Pending,
            converted: None,
            error: None,
        }
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.source.name
    }

    pub fn size(&self) -> usize {
        self.source.size()
    }

    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    /// Present iff the item succeeded.
    pub fn download(&self) -> Option<&DownloadHandle> {
        self.converted.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// pending -> converting
    pub fn begin_conversion(&mut self) -> Result<(), ItemError> {
        self.transition(ItemStatus::Pending, ItemStatus::Converting)
    }

    /// converting -> succeeded | failed, depending on the transport outcome.
    pub fn complete(&mut self, outcome: Result<Bytes, TransportError>) -> Result<(), ItemError> {
        match outcome {
            Ok(data) => {
                self.transition(ItemStatus::Converting, ItemStatus::Succeeded)?;
                self.converted = Some(DownloadHandle {
                    file_name: converted_file_name(&self.source.name),
                    data,
                });
            }
            Err(e) => {
                self.transition(ItemStatus::Converting, ItemStatus::Failed)?;
                self.error = Some(e.to_string());
            }
        }
        Ok(())
    }

    fn transition(&mut self, from: ItemStatus, to: ItemStatus) -> Result<(), ItemError> {
        if self.status != from {
            return Err(ItemError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
#[path = "item_test.rs"]
mod item_test;
