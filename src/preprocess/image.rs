//! Image validation and downscaling

use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use image::{ImageFormat, ImageReader};
use tracing::info;

use super::{ImagePreprocessor, PreprocessError};

pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

/// Image collaborator backed by the `image` crate
///
/// Accepts PNG and JPEG only. Images larger than the bounding box are
/// downscaled preserving aspect ratio; smaller ones are never upscaled.
/// The result is re-encoded in the source format.
#[derive(Debug, Clone)]
pub struct ImageCrateImagePreprocessor {
    max_dimension: u32,
}

impl Default for ImageCrateImagePreprocessor {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

impl ImageCrateImagePreprocessor {
    pub fn new(max_dimension: u32) -> Self {
        Self { max_dimension }
    }
}

#[async_trait]
impl ImagePreprocessor for ImageCrateImagePreprocessor {
    async fn load(&self, input: &Path) -> Result<Vec<u8>, PreprocessError> {
        let data = match tokio::fs::read(input).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PreprocessError::NotFound(input.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        let max_dimension = self.max_dimension;
        tokio::task::spawn_blocking(move || normalize_image(&data, max_dimension))
            .await
            .map_err(|e| PreprocessError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }
}

/// Validate, bound and re-encode an in-memory image
pub fn normalize_image(data: &[u8], max_dimension: u32) -> Result<Vec<u8>, PreprocessError> {
    let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
    let format = match reader.format() {
        Some(format @ (ImageFormat::Png | ImageFormat::Jpeg)) => format,
        Some(other) => {
            return Err(PreprocessError::UnsupportedImageFormat(format!(
                "{:?}",
                other
            )))
        }
        None => return Err(PreprocessError::UnsupportedImageFormat("unknown".into())),
    };

    let image = reader.decode()?;
    let (width, height) = (image.width(), image.height());
    let image = if width > max_dimension || height > max_dimension {
        image.thumbnail(max_dimension, max_dimension)
    } else {
        image
    };

    let mut encoded = Cursor::new(Vec::new());
    image.write_to(&mut encoded, format)?;
    let encoded = encoded.into_inner();

    info!(
        format = ?format,
        original_width = width,
        original_height = height,
        width = image.width(),
        height = image.height(),
        bytes = encoded.len(),
        "Image prepared"
    );
    Ok(encoded)
}
