//! `/api/upload` and `/api/delete`.

use super::{ApiError, ApiJson, ApiResult, AppState};
use crate::models::Attachment;
use crate::upload::check_upload;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::{delete, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};

/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
struct DeleteRequest {
    url: String,
}

pub(super) fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(
                max_upload_bytes.saturating_add(MULTIPART_OVERHEAD),
            )),
        )
        .route("/delete", delete(remove))
}

fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::new(err.status(), err.body_text())
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Attachment>)> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload").to_string();
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;

        check_upload(&mime_type, bytes.len(), state.max_upload_bytes)?;
        let attachment = state.objects.put(&name, &mime_type, &bytes)?;
        return Ok((StatusCode::CREATED, Json(attachment)));
    }
    Err(ApiError::bad_request("No file uploaded"))
}

async fn remove(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<DeleteRequest>,
) -> ApiResult<Json<Value>> {
    state.objects.delete(&request.url)?;
    Ok(Json(json!({ "message": "File deleted" })))
}
