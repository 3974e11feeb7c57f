//! # asset-api
//!
//! JSON HTTP API for the asset library: search, upload, metadata edits,
//! file delivery and page attachments.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod representers;
pub mod routes;

pub use extractors::{ApiConfig, AppState, SharedAssetService};
pub use routes::router;
