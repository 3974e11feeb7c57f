//! File delivery

use asset_core::Id;
use asset_library::ORIGINAL_STYLE;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::extractors::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileParams {
    pub style: Option<String>,
}

/// Serve a stored file
///
/// GET /assets/:id/file?style=thumbnail
///
/// Backends with their own public URL get a redirect. With x_sendfile
/// enabled the front-end server delivers the file from the storage path;
/// otherwise the bytes are streamed from storage.
pub async fn serve_file(
    State(state): State<AppState>,
    Path(id): Path<Id>,
    Query(params): Query<FileParams>,
) -> ApiResult<Response> {
    let style = params.style.as_deref().unwrap_or(ORIGINAL_STYLE);
    let file = state.assets.locate_file(id, style).await?;

    if let Some(url) = &file.public_url {
        return Ok(Redirect::temporary(url).into_response());
    }

    let content_type = header_value(&file.content_type)?;
    let disposition = header_value(&format!(
        "inline; filename=\"{}\"",
        file.file_name.replace('"', "")
    ))?;

    if state.config.x_sendfile {
        let path = header_value(&file.path)?;
        tracing::debug!(id = id, path = %file.path, "Delegating file delivery");

        return Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_DISPOSITION, disposition)
            .header("X-Accel-Redirect", path.clone())
            .header("X-Sendfile", path)
            .body(Body::empty())
            .map_err(|e| ApiError::internal(e.to_string()));
    }

    let data = state.assets.read_file(&file).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::CONTENT_LENGTH, data.len())
        .body(Body::from(data))
        .map_err(|e| ApiError::internal(e.to_string()))
}

fn header_value(value: &str) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| ApiError::internal(format!("Cannot send {:?} as a header", value)))
}
