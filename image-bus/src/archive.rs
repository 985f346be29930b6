use std::{
    collections::HashSet,
    io::{self, Write},
};

use bytes::Bytes;
use tokio::sync::mpsc;
use zip::{
    CompressionMethod, ZipWriter,
    result::ZipError,
    write::{SimpleFileOptions, StreamWriter},
};

use crate::codec::TargetFormat;

/// Deflate level used for every entry.
pub const COMPRESSION_LEVEL: i64 = 9;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("archive sink failed: {0}")]
    Io(#[from] io::Error),
    #[error("archive encoding failed: {0}")]
    Zip(ZipError),
    #[error("archive aborted after an earlier write failure")]
    Aborted,
}

impl From<ZipError> for ArchiveError {
    fn from(err: ZipError) -> Self {
        match err {
            ZipError::Io(e) => ArchiveError::Io(e),
            other => ArchiveError::Zip(other),
        }
    }
}

/// Incremental ZIP writer over a non-seekable sink.
///
/// Entries are compressed and pushed to `W` as they are appended, so the sink
/// only ever sees a forward-moving byte stream. The first failure poisons the
/// streamer: it is reported once and every later call returns
/// [`ArchiveError::Aborted`].
pub struct ArchiveStreamer<W: Write> {
    zip: ZipWriter<StreamWriter<W>>,
    options: SimpleFileOptions,
    names: HashSet<String>,
    entries: usize,
    aborted: bool,
}

impl<W: Write> ArchiveStreamer<W> {
    pub fn open(sink: W) -> Self {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(COMPRESSION_LEVEL));
        Self {
            zip: ZipWriter::new_stream(sink),
            options,
            names: HashSet::new(),
            entries: 0,
            aborted: false,
        }
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Appends one entry and returns the name it was stored under, which
    /// differs from `name` only when that name was already taken.
    pub fn append(&mut self, name: &str, data: &[u8]) -> Result<String, ArchiveError> {
        if self.aborted {
            return Err(ArchiveError::Aborted);
        }
        let name = self.unique_name(name);
        match self.write_entry(&name, data) {
            Ok(()) => {
                self.entries += 1;
                self.names.insert(name.clone());
                Ok(name)
            }
            Err(e) => {
                self.aborted = true;
                Err(e)
            }
        }
    }

    fn write_entry(&mut self, name: &str, data: &[u8]) -> Result<(), ArchiveError> {
        self.zip.start_file(name, self.options.clone())?;
        self.zip.write_all(data)?;
        Ok(())
    }

    /// Writes the central directory and flushes the sink.
    pub fn finalize(self) -> Result<usize, ArchiveError> {
        if self.aborted {
            return Err(ArchiveError::Aborted);
        }
        let entries = self.entries;
        let mut sink = self.zip.finish()?;
        sink.flush()?;
        Ok(entries)
    }

    fn unique_name(&self, name: &str) -> String {
        if !self.names.contains(name) {
            return name.to_string();
        }
        let (stem, ext) = match name.rfind('.') {
            Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
            _ => (name, ""),
        };
        (1..)
            .map(|n| format!("{}-{}{}", stem, n, ext))
            .find(|candidate| !self.names.contains(candidate))
            .unwrap_or_else(|| name.to_string())
    }
}

/// Name of the entry holding a successfully converted image.
pub fn converted_entry_name(original: &str, format: TargetFormat) -> String {
    format!("{}.{}", base_name(original), format.extension())
}

/// Name of the text entry standing in for an image that failed to convert.
pub fn placeholder_entry_name(original: &str) -> String {
    format!("error-{}.txt", file_name(original))
}

pub fn placeholder_message(original: &str, cause: &str) -> String {
    format!("Could not convert {}.\n{}\n", file_name(original), cause)
}

/// Final path component, tolerating both separators since client-supplied names
/// may come from any platform.
fn file_name(original: &str) -> &str {
    let name = original.rsplit(['/', '\\']).next().unwrap_or(original);
    if name.is_empty() { "image" } else { name }
}

/// File name without its last extension. Dotfiles keep their full name.
pub fn base_name(original: &str) -> &str {
    let name = file_name(original);
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

/// `io::Write` adapter feeding an async response body.
///
/// Bytes are batched into `chunk_size` pieces and handed to a bounded channel
/// with `blocking_send`, so it must be driven from a blocking thread. A dropped
/// receiver shows up as `BrokenPipe`.
pub struct ChunkSink {
    tx: mpsc::Sender<io::Result<Bytes>>,
    buf: Vec<u8>,
    chunk_size: usize,
}

impl ChunkSink {
    pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

    pub fn new(tx: mpsc::Sender<io::Result<Bytes>>) -> Self {
        Self::with_chunk_size(tx, Self::DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(tx: mpsc::Sender<io::Result<Bytes>>, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            tx,
            buf: Vec::with_capacity(chunk_size),
            chunk_size,
        }
    }

    fn send_buffered(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::replace(&mut self.buf, Vec::with_capacity(self.chunk_size));
        self.tx
            .blocking_send(Ok(Bytes::from(chunk)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "archive receiver closed"))
    }
}

impl Write for ChunkSink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        if self.buf.len() >= self.chunk_size {
            self.send_buffered()?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffered()
    }
}

#[cfg(test)]
#[path = "archive_test.rs"]
mod archive_test;
