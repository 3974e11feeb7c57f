//! API routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::extractors::AppState;
use crate::handlers::{assets, files, pages};

/// Create the complete API router
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/assets", assets_router())
        .nest("/pages", pages_router())
}

fn assets_router() -> Router<AppState> {
    Router::new()
        .route("/", get(assets::list_assets).post(assets::create_asset))
        .route(
            "/:id",
            get(assets::get_asset)
                .patch(assets::update_asset)
                .delete(assets::delete_asset),
        )
        .route(
            "/:id/file",
            get(files::serve_file).put(assets::replace_asset_file),
        )
}

fn pages_router() -> Router<AppState> {
    Router::new()
        .route("/:page_id/assets", get(pages::list_page_assets))
        .route(
            "/:page_id/assets/:asset_id",
            post(pages::attach_asset).delete(pages::detach_asset),
        )
}
