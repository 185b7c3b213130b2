//! `/api/projects` routes.

use super::{ApiJson, ApiResult, AppState};
use crate::auth::Identity;
use crate::commands::projects::{
    self, BoardSettingsUpdate, NewMember, NewProject, PermissionsPatch, ProjectUpdate,
};
use crate::models::Project;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Extension, Json, Router};
use serde_json::{Value, json};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", put(update).delete(remove))
        .route("/:id/members", post(add_member))
        .route("/:id/members/:member_id", delete(remove_member))
        .route("/:id/permissions", put(update_permissions))
        .route("/:id/board-settings", put(update_board_settings))
}

async fn list(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<Project>>> {
    let storage = state.storage.lock().await;
    Ok(Json(projects::list_projects(&storage, &identity)?))
}

async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiJson(input): ApiJson<NewProject>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let mut storage = state.storage.lock().await;
    let project = projects::create_project(&mut storage, &identity, input)?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn update(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<ProjectUpdate>,
) -> ApiResult<Json<Project>> {
    let mut storage = state.storage.lock().await;
    let project = projects::update_project(&mut storage, &identity, &id, input)?;
    Ok(Json(project.redacted()))
}

async fn remove(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let mut storage = state.storage.lock().await;
    projects::delete_project(&mut storage, &identity, &id)?;
    Ok(Json(json!({ "message": "Project removed" })))
}

async fn add_member(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<NewMember>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let mut storage = state.storage.lock().await;
    let project = projects::add_member(&mut storage, &identity, &id, input, state.hasher.as_ref())?;
    Ok((StatusCode::CREATED, Json(project.redacted())))
}

async fn remove_member(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path((id, member_id)): Path<(String, String)>,
) -> ApiResult<Json<Project>> {
    let mut storage = state.storage.lock().await;
    let project = projects::remove_member(&mut storage, &identity, &id, &member_id)?;
    Ok(Json(project.redacted()))
}

async fn update_permissions(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<PermissionsPatch>,
) -> ApiResult<Json<Project>> {
    let mut storage = state.storage.lock().await;
    let project = projects::update_permissions(&mut storage, &identity, &id, patch)?;
    Ok(Json(project.redacted()))
}

async fn update_board_settings(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<BoardSettingsUpdate>,
) -> ApiResult<Json<Project>> {
    let mut storage = state.storage.lock().await;
    let project = projects::update_board_settings(&mut storage, &identity, &id, update)?;
    Ok(Json(project.redacted()))
}
