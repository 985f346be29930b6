use bytes::Bytes;

use crate::codec::{self, TargetFormat};

/// JPEG quality used when the caller does not pick one.
pub const DEFAULT_QUALITY: u8 = 90;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    #[error("decode error: {0}")]
    Decode(String),
    #[error("encode error: {0}")]
    Encode(String),
    /// The conversion never finished, e.g. its task panicked or was cancelled.
    #[error("conversion interrupted: {0}")]
    Interrupted(String),
}

impl ConversionError {
    pub fn tag(&self) -> &'static str {
        match self {
            ConversionError::Decode(_) => "decode-error",
            ConversionError::Encode(_) => "encode-error",
            ConversionError::Interrupted(_) => "interrupted",
        }
    }
}

/// A successfully re-encoded image.
#[derive(Debug, Clone)]
pub struct ConvertedImage {
    pub data: Bytes,
    pub format: TargetFormat,
}

impl ConvertedImage {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

pub type ConversionOutcome = Result<ConvertedImage, ConversionError>;

/// Decode + re-encode of a single payload. Holds no state besides its settings,
/// so clones can run on any number of threads at once.
#[derive(Debug, Clone, Copy)]
pub struct Converter {
    format: TargetFormat,
    quality: u8,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(TargetFormat::Jpeg, DEFAULT_QUALITY)
    }
}

impl Converter {
    pub fn new(format: TargetFormat, quality: u8) -> Self {
        Self {
            format,
            quality: quality.clamp(1, 100),
        }
    }

    pub fn format(&self) -> TargetFormat {
        self.format
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn convert(&self, raw: &[u8]) -> ConversionOutcome {
        let image = codec::decode(raw)?;
        let data = codec::encode(&image, self.format, self.quality)?;
        Ok(ConvertedImage {
            data: Bytes::from(data),
            format: self.format,
        })
    }
}

#[cfg(test)]
#[path = "convert_test.rs"]
mod convert_test;
