//! # asset-db
//!
//! PostgreSQL persistence for the asset library, using SQLx.
//!
//! - Connection pool management
//! - `PgAssetStore`, the database-backed `AssetStore`
//! - `SettingsRepository` for the `config` key/value table
//!
//! ## Example
//!
//! ```ignore
//! use asset_db::{Database, DatabaseConfig, PgAssetStore};
//!
//! let db = Database::connect(&DatabaseConfig::new(url, 10)).await?;
//! let store = PgAssetStore::new(db.pool().clone());
//! ```

pub mod assets;
pub mod pool;
pub mod settings;

use asset_library::AssetError;
use sqlx::Executor;

pub use assets::{AssetRow, PageAttachmentRow, PgAssetStore};
pub use pool::{Database, DatabaseConfig};
pub use settings::SettingsRepository;

/// Schema for the `assets`, `page_attachments` and `config` tables
pub const SCHEMA: &str = include_str!("../migrations/0001_assets.sql");

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl From<RepositoryError> for AssetError {
    fn from(err: RepositoryError) -> Self {
        AssetError::Store(err.to_string())
    }
}

/// Create missing tables
pub async fn migrate(db: &Database) -> RepositoryResult<()> {
    db.pool().execute(SCHEMA).await?;
    tracing::info!("Database schema ensured");
    Ok(())
}
