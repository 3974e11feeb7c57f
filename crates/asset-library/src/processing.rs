//! Image processing
//!
//! [`ImageEngine`] is the seam to the image library: it identifies a file's
//! true dimensions and renders styles. [`RasterEngine`] implements it with
//! the `image` crate. Everything here is CPU-bound and synchronous; callers
//! on the async runtime go through `spawn_blocking`.

use std::collections::BTreeMap;
use std::io::Cursor;

use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use thiserror::Error;
use tracing::{debug, warn};

use crate::asset_type::StyleSpec;
use crate::geometry::Geometry;

/// Renders every style of a type through the engine
pub const THUMBNAIL_PROCESSOR: &str = "thumbnail";

#[derive(Debug, Error)]
pub enum ProcessingError {
    /// The data is not an image the engine understands
    #[error("File could not be identified as an image")]
    NotIdentified,
    #[error("Unsupported output format: {0}")]
    Unsupported(String),
    #[error("Processing failed: {0}")]
    Failed(String),
}

pub type ProcessingResult<T> = Result<T, ProcessingError>;

/// A derived file for one style
#[derive(Debug, Clone, PartialEq)]
pub struct Rendition {
    pub data: Bytes,
    /// Extension of the produced file, without the dot
    pub extension: String,
}

#[cfg_attr(test, mockall::automock)]
pub trait ImageEngine: Send + Sync {
    /// True pixel dimensions of `data`
    fn identify(&self, data: &[u8]) -> ProcessingResult<Geometry>;

    /// Render `data` to `style`, writing `fallback_format` when the style names none
    fn render(
        &self,
        data: &[u8],
        style: &StyleSpec,
        fallback_format: &str,
    ) -> ProcessingResult<Rendition>;
}

/// [`ImageEngine`] backed by the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterEngine;

impl RasterEngine {
    pub fn new() -> Self {
        Self
    }

    fn decode(data: &[u8]) -> ProcessingResult<DynamicImage> {
        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|_| ProcessingError::NotIdentified)?;
        if reader.format().is_none() {
            return Err(ProcessingError::NotIdentified);
        }
        reader.decode().map_err(|_| ProcessingError::NotIdentified)
    }

    /// Fill in a missing side from the source aspect ratio
    fn target_box(source: (u32, u32), geometry: &Geometry) -> (u32, u32) {
        let (sw, sh) = (source.0.max(1) as f64, source.1.max(1) as f64);
        match (geometry.width, geometry.height) {
            (0, 0) => source,
            (0, h) => (((h as f64) * sw / sh).round().max(1.0) as u32, h),
            (w, 0) => (w, ((w as f64) * sh / sw).round().max(1.0) as u32),
            (w, h) => (w, h),
        }
    }

    fn transform(img: DynamicImage, geometry: &Geometry) -> DynamicImage {
        let (sw, sh) = (img.width(), img.height());
        let (w, h) = Self::target_box((sw, sh), geometry);
        let fits = sw <= w && sh <= h;

        match geometry.modifier {
            Some('#') => img.resize_to_fill(w, h, FilterType::Lanczos3),
            Some('!') => img.resize_exact(w, h, FilterType::Lanczos3),
            Some('>') if fits => img,
            Some('<') if !(sw < w && sh < h) => img,
            Some('^') => {
                let scale = (w as f64 / sw as f64).max(h as f64 / sh as f64);
                let cw = ((sw as f64) * scale).round().max(1.0) as u32;
                let ch = ((sh as f64) * scale).round().max(1.0) as u32;
                img.resize_exact(cw, ch, FilterType::Lanczos3)
            }
            Some('%') => {
                let pw = if geometry.width == 0 { 100 } else { geometry.width };
                let ph = if geometry.height == 0 { pw } else { geometry.height };
                let cw = ((sw as u64 * pw as u64) / 100).max(1) as u32;
                let ch = ((sh as u64 * ph as u64) / 100).max(1) as u32;
                img.resize_exact(cw, ch, FilterType::Lanczos3)
            }
            _ => img.resize(w, h, FilterType::Lanczos3),
        }
    }
}

impl ImageEngine for RasterEngine {
    fn identify(&self, data: &[u8]) -> ProcessingResult<Geometry> {
        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|_| ProcessingError::NotIdentified)?;
        if reader.format().is_none() {
            return Err(ProcessingError::NotIdentified);
        }
        let (width, height) = reader
            .into_dimensions()
            .map_err(|_| ProcessingError::NotIdentified)?;
        Ok(Geometry::new(width, height))
    }

    fn render(
        &self,
        data: &[u8],
        style: &StyleSpec,
        fallback_format: &str,
    ) -> ProcessingResult<Rendition> {
        let geometry = Geometry::parse(&style.dimensions)
            .ok_or_else(|| ProcessingError::Failed(format!("invalid geometry {:?}", style.dimensions)))?;

        let extension = style
            .format
            .as_deref()
            .unwrap_or(fallback_format)
            .to_lowercase();
        let format = ImageFormat::from_extension(&extension)
            .ok_or_else(|| ProcessingError::Unsupported(extension.clone()))?;

        let img = Self::transform(Self::decode(data)?, &geometry);
        let img = match format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
            _ => img,
        };

        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, format)
            .map_err(|e| ProcessingError::Failed(e.to_string()))?;

        debug!(
            geometry = %geometry,
            width = img.width(),
            height = img.height(),
            format = %extension,
            "Rendered style"
        );

        Ok(Rendition {
            data: Bytes::from(buffer.into_inner()),
            extension,
        })
    }
}

/// Run a type's processors over `data`.
///
/// With no recognised processor every style receives a copy of the original.
/// Failures are reported per style so one bad style does not sink the rest.
pub fn render_styles(
    engine: &dyn ImageEngine,
    data: &Bytes,
    processors: &[String],
    styles: &BTreeMap<String, StyleSpec>,
    source_extension: &str,
) -> Vec<(String, ProcessingResult<Rendition>)> {
    let mut thumbnail = false;
    for processor in processors {
        if processor == THUMBNAIL_PROCESSOR {
            thumbnail = true;
        } else {
            warn!(processor = %processor, "Unknown processor skipped");
        }
    }

    styles
        .iter()
        .map(|(name, spec)| {
            let result = if thumbnail {
                engine.render(data, spec, source_extension)
            } else {
                Ok(Rendition {
                    data: data.clone(),
                    extension: spec
                        .format
                        .clone()
                        .unwrap_or_else(|| source_extension.to_string()),
                })
            };
            (name.clone(), result)
        })
        .collect()
}
