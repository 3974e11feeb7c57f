//! Axum extractors and shared state for API handlers

use std::sync::Arc;

use asset_core::Id;
use asset_library::{AssetService, AssetStore, Storage};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;

/// Header carrying the id of the acting user
pub const USER_HEADER: &str = "x-user-id";

/// Asset service over type-erased store and storage backends
pub type SharedAssetService = Arc<AssetService<dyn AssetStore, dyn Storage>>;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub assets: SharedAssetService,
    pub config: Arc<ApiConfig>,
}

#[derive(Debug, Clone, Default)]
pub struct ApiConfig {
    /// Hand file delivery to the front-end server via X-Accel-Redirect / X-Sendfile
    pub x_sendfile: bool,
}

impl AppState {
    pub fn new(assets: SharedAssetService, config: ApiConfig) -> Self {
        Self {
            assets,
            config: Arc::new(config),
        }
    }
}

/// The user performing the request, when one is identified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActingUser(pub Option<Id>);

#[async_trait]
impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(USER_HEADER) else {
            return Ok(ActingUser(None));
        };

        value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<Id>().ok())
            .map(|id| ActingUser(Some(id)))
            .ok_or_else(|| ApiError::bad_request("X-User-Id must be a numeric user id"))
    }
}

impl std::ops::Deref for ActingUser {
    type Target = Option<Id>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
