//! Classification and geometry queries over a stored asset
//!
//! These answer from the asset's stored metadata and the registry only. They
//! never open the file, so page renders do not wait on image decoding.

use crate::asset_type::{AssetType, AssetTypeRegistry};
use crate::geometry::Geometry;
use crate::model::Asset;
use crate::paths::ORIGINAL_STYLE;
use crate::settings::ThumbnailSettings;

/// Type membership checks used to pick a thumbnail icon
#[cfg_attr(test, mockall::automock)]
pub trait TypeProbe {
    fn is(&self, type_name: &str) -> bool;
    fn is_other(&self) -> bool;
}

/// Categories with a static icon, in the order they are checked
const ICON_CATEGORIES: &[(&str, &str)] = &[
    ("pdf", "pdf"),
    ("movie", "movie"),
    ("video", "movie"),
    ("swf", "movie"),
    ("audio", "audio"),
];

/// Static icon path for non-image assets, `None` when the storage backend
/// should serve a rendition instead.
pub fn thumbnail_icon(probe: &dyn TypeProbe, size: &str) -> Option<String> {
    for (type_name, icon) in ICON_CATEGORIES {
        if probe.is(type_name) {
            return Some(format!("/images/assets/{}_{}.png", icon, size));
        }
    }
    if probe.is_other() {
        return Some(format!("/images/assets/doc_{}.png", size));
    }
    None
}

/// An asset seen through a registry and the configured thumbnails
#[derive(Debug, Clone, Copy)]
pub struct AssetView<'a> {
    pub asset: &'a Asset,
    registry: &'a AssetTypeRegistry,
    thumbnails: &'a ThumbnailSettings,
}

impl<'a> AssetView<'a> {
    pub fn new(
        asset: &'a Asset,
        registry: &'a AssetTypeRegistry,
        thumbnails: &'a ThumbnailSettings,
    ) -> Self {
        Self {
            asset,
            registry,
            thumbnails,
        }
    }

    pub fn asset_type(&self) -> Option<&'a AssetType> {
        self.asset
            .content_type
            .as_deref()
            .and_then(|mime| self.registry.classify(mime))
    }

    pub fn type_name(&self) -> Option<&'a str> {
        self.asset_type().map(|t| t.name.as_str())
    }

    pub fn is_image(&self) -> bool {
        self.is("image")
    }

    /// Dimensions of `style`, from stored metadata for the original and from
    /// the style table otherwise. `None` when unknown.
    pub fn geometry(&self, style: &str) -> Option<Geometry> {
        if style == ORIGINAL_STYLE {
            return self.asset.original_geometry();
        }
        let dimensions = self.asset_type()?.style_dimensions(style, self.thumbnails)?;
        Geometry::parse(&dimensions)
    }

    fn image_geometry(&self, style: &str) -> Option<Geometry> {
        if self.is_image() {
            self.geometry(style)
        } else {
            None
        }
    }

    /// Zero for non-images and unknown geometry
    pub fn width(&self, style: &str) -> u32 {
        self.image_geometry(style).map_or(0, |g| g.width)
    }

    pub fn height(&self, style: &str) -> u32 {
        self.image_geometry(style).map_or(0, |g| g.height)
    }

    pub fn is_square(&self, style: &str) -> bool {
        self.image_geometry(style).is_some_and(|g| g.is_square())
    }

    pub fn is_vertical(&self, style: &str) -> bool {
        self.image_geometry(style).is_some_and(|g| g.is_vertical())
    }

    pub fn is_horizontal(&self, style: &str) -> bool {
        self.image_geometry(style).is_some_and(|g| g.is_horizontal())
    }

    /// Style names available for this asset's type
    pub fn style_names(&self) -> Vec<String> {
        self.asset_type()
            .map(|t| t.styles_with(self.thumbnails).into_keys().collect())
            .unwrap_or_default()
    }
}

impl TypeProbe for AssetView<'_> {
    fn is(&self, type_name: &str) -> bool {
        self.type_name() == Some(type_name)
    }

    fn is_other(&self) -> bool {
        self.asset_type().is_none()
    }
}
