//! # asset-core
//!
//! Core types, traits, and utilities shared by the asset crates.
//!
//! - Validation and configuration errors
//! - Record traits (`Record`, `Audited`)
//! - Pagination types
//! - Static configuration (`AppConfig`) and dynamic settings (`Settings`)

pub mod config;
pub mod error;
pub mod pagination;
pub mod traits;

pub use config::{AppConfig, SettingValue, Settings};
pub use error::*;
pub use pagination::*;
pub use traits::*;
