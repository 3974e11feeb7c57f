//! # asset-library
//!
//! File assets for the CMS: uploads, type classification, image renditions,
//! storage backends and search.
//!
//! Components:
//! - `AssetTypeRegistry`: MIME classification into named asset types
//! - `AssetView`: per-asset type and geometry queries
//! - `ImageEngine`: dimension probing and thumbnail rendering
//! - `Storage`: local filesystem, S3 and in-memory blob storage
//! - `AssetStore`: persistence seam for asset records and page links
//! - `AssetService`: upload, replace, search and attach operations

pub mod asset_type;
pub mod classification;
pub mod condition;
pub mod defaults;
pub mod error;
pub mod geometry;
pub mod model;
pub mod paths;
pub mod processing;
pub mod service;
pub mod settings;
pub mod storage;
pub mod store;

pub use asset_type::{
    AssetType, AssetTypeRegistry, RegistryBuilder, RegistryError, RegistryResult, StyleSpec,
};
pub use classification::{thumbnail_icon, AssetView, TypeProbe};
pub use condition::MimeCondition;
pub use defaults::{standard_registry, standard_types};
pub use error::{AssetError, AssetResult};
pub use geometry::{Geometry, GeometryError};
pub use model::{Asset, CreateAssetParams, PageAttachment, UpdateAssetParams};
pub use paths::{AttachmentPaths, ORIGINAL_STYLE};
pub use processing::{ImageEngine, ProcessingError, RasterEngine, Rendition};
pub use service::{AssetService, LocatedFile, SEARCH_PER_PAGE};
pub use settings::{AssetSettings, S3Settings, StorageBackend, ThumbnailSettings};
pub use storage::{LocalStorage, MemoryStorage, S3Storage, Storage, StorageError};
pub use store::{AssetQuery, AssetStore, MemoryAssetStore};
