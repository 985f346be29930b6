use image::{ColorType as SourceColor, DynamicImage};
use jpeg_encoder::{ColorType, Encoder};

use crate::convert::ConversionError;

/// Output formats the encoder side can produce.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    #[default]
    Jpeg,
}

impl TargetFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "jpg",
        }
    }
}

/// Decodes an in-memory image, letting the codec library sniff the format.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, ConversionError> {
    if bytes.is_empty() {
        return Err(ConversionError::Decode("empty input".to_string()));
    }
    image::load_from_memory(bytes).map_err(|e| ConversionError::Decode(e.to_string()))
}

pub fn encode(
    image: &DynamicImage,
    format: TargetFormat,
    quality: u8,
) -> Result<Vec<u8>, ConversionError> {
    match format {
        TargetFormat::Jpeg => encode_jpeg(image, quality),
    }
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, ConversionError> {
    // JPEG frame headers carry 16-bit dimensions.
    let width = u16::try_from(image.width()).map_err(|_| {
        ConversionError::Encode(format!("width {} exceeds JPEG limit", image.width()))
    })?;
    let height = u16::try_from(image.height()).map_err(|_| {
        ConversionError::Encode(format!("height {} exceeds JPEG limit", image.height()))
    })?;

    let (pixels, color) = match image.color() {
        SourceColor::L8 | SourceColor::L16 | SourceColor::La8 | SourceColor::La16 => {
            (image.to_luma8().into_raw(), ColorType::Luma)
        }
        _ => (image.to_rgb8().into_raw(), ColorType::Rgb),
    };

    let mut out = Vec::new();
    let encoder = Encoder::new(&mut out, quality);
    encoder
        .encode(&pixels, width, height, color)
        .map_err(|e| ConversionError::Encode(e.to_string()))?;
    Ok(out)
}
