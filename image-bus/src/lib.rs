//! Image conversion primitives: decode any supported image, re-encode it to the
//! target format, and stream the results into a single ZIP archive.
//!
//! ```text
//!                 ┌─► convert ─┐
//! SourceImage ────┼─► convert ─┼─► bounded queue ─► ArchiveStreamer ─► ChunkSink ─► response body
//!   (N items)     └─► convert ─┘    (completion        (single writer,
//!                 (blocking pool,     order)          writes on the
//!                  shared limit)                      blocking pool)
//! ```

pub mod archive;
pub mod batch;
pub mod codec;
pub mod convert;

pub use archive::{ArchiveError, ArchiveStreamer, ChunkSink};
pub use batch::{ArchiveJob, ArchiveSummary, BatchError, BatchOrchestrator, SourceImage};
pub use codec::TargetFormat;
pub use convert::{ConversionError, ConversionOutcome, ConvertedImage, Converter, DEFAULT_QUALITY};
