//! Service errors

use asset_core::{Id, ValidationErrors};
use thiserror::Error;

use crate::asset_type::RegistryError;
use crate::processing::ProcessingError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Asset not found: {0}")]
    NotFound(Id),
    #[error("Page attachment not found: asset {asset_id} on page {page_id}")]
    AttachmentNotFound { asset_id: Id, page_id: Id },
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Processing error: {0}")]
    Processing(#[from] ProcessingError),
    #[error("Store error: {0}")]
    Store(String),
    #[error("Background task failed: {0}")]
    Task(String),
}

pub type AssetResult<T> = Result<T, AssetError>;
