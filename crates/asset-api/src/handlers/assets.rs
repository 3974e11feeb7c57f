//! Asset API handlers

use asset_core::{Id, PaginationParams};
use asset_library::{CreateAssetParams, UpdateAssetParams, SEARCH_PER_PAGE};
use axum::{
    extract::{Multipart, Path, RawQuery, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bytes::Bytes;

use crate::error::{ApiError, ApiResult};
use crate::extractors::{ActingUser, AppState};
use crate::representers::{AssetRepresentation, AssetRepresenter, PageRepresentation};

/// Parsed query string of the asset index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchParams {
    pub search: String,
    /// Type names: `filter=image,pdf`, `filter[]=image` or `filter[image]=1`
    pub filter: Vec<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

impl SearchParams {
    pub fn parse(raw: Option<&str>) -> Self {
        let mut params = Self::default();

        for (key, value) in url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
            match key.as_ref() {
                "search" => params.search = value.into_owned(),
                "page" => params.page = Some(value.into_owned()),
                "per_page" => params.per_page = Some(value.into_owned()),
                "filter" | "filter[]" => params.filter.extend(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|name| !name.is_empty())
                        .map(str::to_string),
                ),
                other => {
                    if let Some(name) = other
                        .strip_prefix("filter[")
                        .and_then(|rest| rest.strip_suffix(']'))
                    {
                        params.filter.push(name.to_string());
                    }
                }
            }
        }

        params.filter.sort();
        params.filter.dedup();
        params
    }
}

/// Search the asset catalog
///
/// GET /assets
pub async fn list_assets(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> ApiResult<Json<PageRepresentation<AssetRepresentation>>> {
    let params = SearchParams::parse(raw.as_deref());
    let pagination = PaginationParams::resolve(
        params.page.as_deref(),
        params.per_page.as_deref(),
        SEARCH_PER_PAGE,
    );

    let page = state
        .assets
        .search_paginated(&params.search, &params.filter, pagination)
        .await?;

    Ok(Json(PageRepresentation::from_page(page, |asset| {
        AssetRepresenter::represent(&asset, state.assets.as_ref())
    })))
}

/// GET /assets/:id
pub async fn get_asset(
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> ApiResult<Json<AssetRepresentation>> {
    let asset = state.assets.find(id).await?;
    Ok(Json(AssetRepresenter::represent(&asset, state.assets.as_ref())))
}

/// Upload a new asset
///
/// POST /assets (multipart: `file`, `title`, `caption`)
pub async fn create_asset(
    State(state): State<AppState>,
    user: ActingUser,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let (params, data) = read_upload(multipart).await?;
    let asset = state.assets.upload(params, data, *user).await?;

    Ok((
        StatusCode::CREATED,
        Json(AssetRepresenter::represent(&asset, state.assets.as_ref())),
    ))
}

/// Edit title and caption
///
/// PATCH /assets/:id
pub async fn update_asset(
    State(state): State<AppState>,
    user: ActingUser,
    Path(id): Path<Id>,
    Json(params): Json<UpdateAssetParams>,
) -> ApiResult<Json<AssetRepresentation>> {
    let asset = state.assets.update_metadata(id, params, *user).await?;
    Ok(Json(AssetRepresenter::represent(&asset, state.assets.as_ref())))
}

/// Replace the stored file
///
/// PUT /assets/:id/file
pub async fn replace_asset_file(
    State(state): State<AppState>,
    user: ActingUser,
    Path(id): Path<Id>,
    multipart: Multipart,
) -> ApiResult<Json<AssetRepresentation>> {
    let (params, data) = read_upload(multipart).await?;
    let asset = state.assets.replace_file(id, params, data, *user).await?;
    Ok(Json(AssetRepresenter::represent(&asset, state.assets.as_ref())))
}

/// DELETE /assets/:id
pub async fn delete_asset(
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> ApiResult<StatusCode> {
    state.assets.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Collect the upload fields. A missing `file` part is left for the
/// service's presence validation.
async fn read_upload(mut multipart: Multipart) -> ApiResult<(CreateAssetParams, Bytes)> {
    let mut params = CreateAssetParams::default();
    let mut data = Bytes::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read multipart: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                if params.file_name.is_some() {
                    return Err(ApiError::bad_request("Only one file may be uploaded"));
                }
                params.file_name = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|name| !name.is_empty());
                params.content_type = field.content_type().map(str::to_string);
                data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file data: {}", e)))?;
            }
            "title" => params.title = Some(read_text(field).await?),
            "caption" => params.caption = Some(read_text(field).await?),
            _ => {}
        }
    }

    Ok((params, data))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read field: {}", e)))
}
