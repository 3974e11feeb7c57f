//! Page attachment handlers

use asset_core::{Id, Page, PaginationParams};
use asset_library::PageAttachment;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::extractors::{ActingUser, AppState};
use crate::representers::{AssetRepresentation, AssetRepresenter, PageRepresentation};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    pub per_page: Option<String>,
}

/// Assets attached to a page, in position order
///
/// GET /pages/:page_id/assets
pub async fn list_page_assets(
    State(state): State<AppState>,
    Path(page_id): Path<Id>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<PageRepresentation<AssetRepresentation>>> {
    let pagination = PaginationParams::resolve(
        params.page.as_deref(),
        params.per_page.as_deref(),
        state.assets.settings().per_page,
    );

    let assets = state.assets.attachments_for_page(page_id).await?;
    let total = assets.len() as i64;
    let items = assets
        .into_iter()
        .skip(usize::try_from(pagination.offset()).unwrap_or(usize::MAX))
        .take(usize::try_from(pagination.limit()).unwrap_or(0))
        .collect();

    let page = Page::new(items, pagination, total);
    Ok(Json(PageRepresentation::from_page(page, |asset| {
        AssetRepresenter::represent(&asset, state.assets.as_ref())
    })))
}

/// POST /pages/:page_id/assets/:asset_id
pub async fn attach_asset(
    State(state): State<AppState>,
    user: ActingUser,
    Path((page_id, asset_id)): Path<(Id, Id)>,
) -> ApiResult<impl IntoResponse> {
    let attachment: PageAttachment = state
        .assets
        .attach_to_page(asset_id, page_id, *user)
        .await?;
    Ok((StatusCode::CREATED, Json(attachment)))
}

/// DELETE /pages/:page_id/assets/:asset_id
pub async fn detach_asset(
    State(state): State<AppState>,
    Path((page_id, asset_id)): Path<(Id, Id)>,
) -> ApiResult<StatusCode> {
    state.assets.detach_from_page(asset_id, page_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
