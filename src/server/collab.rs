//! Comment, notification and note routes.

use super::{ApiJson, ApiResult, AppState};
use crate::auth::Identity;
use crate::commands::comments::{self, NewComment};
use crate::commands::notes::{self, NewNote};
use crate::commands::notifications;
use crate::models::{Comment, Note, NotePatch, Notification};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use serde_json::{Value, json};

pub(super) fn comment_routes() -> Router<AppState> {
    // the path parameter of GET is the bug id
    Router::new()
        .route("/", post(add_comment))
        .route("/:id", get(list_comments))
        .route("/:id/resolve", put(toggle_resolved))
}

async fn list_comments(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(bug_id): Path<String>,
) -> ApiResult<Json<Vec<Comment>>> {
    let storage = state.storage.lock().await;
    Ok(Json(comments::list_comments(&storage, &identity, &bug_id)?))
}

async fn add_comment(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiJson(input): ApiJson<NewComment>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let mut storage = state.storage.lock().await;
    let comment = comments::add_comment(&mut storage, &identity, input)?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn toggle_resolved(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Json<Comment>> {
    let mut storage = state.storage.lock().await;
    Ok(Json(comments::toggle_resolved(&mut storage, &identity, &id)?))
}

pub(super) fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications).delete(clear_notifications))
        .route("/:id/read", put(mark_read))
}

async fn list_notifications(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<Notification>>> {
    let storage = state.storage.lock().await;
    Ok(Json(notifications::list_notifications(&storage, &identity)?))
}

async fn mark_read(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Json<Notification>> {
    let mut storage = state.storage.lock().await;
    Ok(Json(notifications::mark_read(&mut storage, &identity, &id)?))
}

async fn clear_notifications(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Value>> {
    let mut storage = state.storage.lock().await;
    let cleared = notifications::clear_notifications(&mut storage, &identity)?;
    Ok(Json(json!({ "message": "Notifications cleared", "cleared": cleared })))
}

pub(super) fn note_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notes).post(create_note))
        .route("/:id", put(update_note).delete(delete_note))
}

async fn list_notes(State(state): State<AppState>) -> ApiResult<Json<Vec<Note>>> {
    let storage = state.storage.lock().await;
    Ok(Json(notes::list_notes(&storage)?))
}

async fn create_note(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewNote>,
) -> ApiResult<(StatusCode, Json<Note>)> {
    let mut storage = state.storage.lock().await;
    let note = notes::create_note(&mut storage, input)?;
    Ok((StatusCode::CREATED, Json(note)))
}

async fn update_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<NotePatch>,
) -> ApiResult<Json<Note>> {
    let mut storage = state.storage.lock().await;
    Ok(Json(notes::update_note(&mut storage, &id, patch)?))
}

async fn delete_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let mut storage = state.storage.lock().await;
    notes::delete_note(&mut storage, &id)?;
    Ok(Json(json!({ "message": "Note removed" })))
}
