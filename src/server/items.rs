//! Work item and test run routes.

use super::{ApiJson, ApiQuery, ApiResult, AppState};
use crate::auth::Identity;
use crate::commands::bugs::{self, NewBug};
use crate::commands::tasks::{self, NewTask};
use crate::commands::test_cases::{self, BulkCreate, BulkSelection, NewTestCase};
use crate::commands::test_runs::{self, RunReport};
use crate::models::{Bug, BugPatch, Task, TaskPatch, TestCase, TestCasePatch, TestRun};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectFilter {
    project_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TargetProject {
    project_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestBatch {
    test_case_ids: Vec<String>,
}

fn removed(what: &str) -> Json<Value> {
    Json(json!({ "message": format!("{} removed", what) }))
}

pub(super) fn test_case_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_test_cases).post(create_test_case))
        .route("/:id", put(update_test_case).delete(delete_test_case))
        .route("/:id/duplicate", post(duplicate_test_case))
        .route("/:id/move", put(move_test_case))
        .route("/bulk-duplicate", post(bulk_duplicate))
        .route("/bulk-move", post(bulk_move))
        .route("/bulk-delete", post(bulk_delete))
        .route("/bulk-create", post(bulk_create))
}

async fn list_test_cases(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiQuery(filter): ApiQuery<ProjectFilter>,
) -> ApiResult<Json<Vec<TestCase>>> {
    let storage = state.storage.lock().await;
    Ok(Json(test_cases::list_test_cases(&storage, &identity, &filter.project_id)?))
}

async fn create_test_case(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiJson(input): ApiJson<NewTestCase>,
) -> ApiResult<(StatusCode, Json<TestCase>)> {
    let mut storage = state.storage.lock().await;
    let tc = test_cases::create_test_case(&mut storage, &identity, input)?;
    Ok((StatusCode::CREATED, Json(tc)))
}

async fn update_test_case(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<TestCasePatch>,
) -> ApiResult<Json<TestCase>> {
    let mut storage = state.storage.lock().await;
    Ok(Json(test_cases::update_test_case(&mut storage, &identity, &id, patch)?))
}

async fn delete_test_case(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let mut storage = state.storage.lock().await;
    test_cases::delete_test_case(&mut storage, &identity, &id)?;
    Ok(removed("Test case"))
}

async fn duplicate_test_case(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    body: Option<ApiJson<TargetProject>>,
) -> ApiResult<(StatusCode, Json<TestCase>)> {
    let target = body.map(|ApiJson(t)| t).unwrap_or_default();
    let mut storage = state.storage.lock().await;
    let copy = test_cases::duplicate_test_case(
        &mut storage,
        &identity,
        &id,
        target.project_id.as_deref(),
    )?;
    Ok((StatusCode::CREATED, Json(copy)))
}

async fn move_test_case(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    ApiJson(target): ApiJson<TargetProject>,
) -> ApiResult<Json<TestCase>> {
    let project_id = target.project_id.unwrap_or_default();
    let mut storage = state.storage.lock().await;
    Ok(Json(test_cases::move_test_case(&mut storage, &identity, &id, &project_id)?))
}

async fn bulk_duplicate(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiJson(selection): ApiJson<BulkSelection>,
) -> ApiResult<(StatusCode, Json<Vec<TestCase>>)> {
    let mut storage = state.storage.lock().await;
    let copies = test_cases::bulk_duplicate(&mut storage, &identity, selection)?;
    Ok((StatusCode::CREATED, Json(copies)))
}

async fn bulk_move(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiJson(selection): ApiJson<BulkSelection>,
) -> ApiResult<Json<Vec<TestCase>>> {
    let mut storage = state.storage.lock().await;
    Ok(Json(test_cases::bulk_move(&mut storage, &identity, selection)?))
}

async fn bulk_delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiJson(selection): ApiJson<BulkSelection>,
) -> ApiResult<Json<Value>> {
    let mut storage = state.storage.lock().await;
    let deleted = test_cases::bulk_delete(&mut storage, &identity, selection)?;
    Ok(Json(json!({ "deleted": deleted })))
}

async fn bulk_create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiJson(input): ApiJson<BulkCreate>,
) -> ApiResult<(StatusCode, Json<Vec<TestCase>>)> {
    let mut storage = state.storage.lock().await;
    let created = test_cases::bulk_create(&mut storage, &identity, input)?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub(super) fn bug_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_bugs).post(create_bug))
        .route("/:id", put(update_bug).delete(delete_bug))
}

async fn list_bugs(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiQuery(filter): ApiQuery<ProjectFilter>,
) -> ApiResult<Json<Vec<Bug>>> {
    let storage = state.storage.lock().await;
    Ok(Json(bugs::list_bugs(&storage, &identity, &filter.project_id)?))
}

async fn create_bug(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiJson(input): ApiJson<NewBug>,
) -> ApiResult<(StatusCode, Json<Bug>)> {
    let mut storage = state.storage.lock().await;
    let bug = bugs::create_bug(&mut storage, &identity, input)?;
    Ok((StatusCode::CREATED, Json(bug)))
}

async fn update_bug(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<BugPatch>,
) -> ApiResult<Json<Bug>> {
    let mut storage = state.storage.lock().await;
    Ok(Json(bugs::update_bug(&mut storage, &identity, &id, patch)?))
}

async fn delete_bug(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let mut storage = state.storage.lock().await;
    bugs::delete_bug(&mut storage, &identity, &id)?;
    Ok(removed("Bug"))
}

pub(super) fn task_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route("/:id", put(update_task).delete(delete_task))
}

async fn list_tasks(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiQuery(filter): ApiQuery<ProjectFilter>,
) -> ApiResult<Json<Vec<Task>>> {
    let storage = state.storage.lock().await;
    Ok(Json(tasks::list_tasks(&storage, &identity, &filter.project_id)?))
}

async fn create_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiJson(input): ApiJson<NewTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let mut storage = state.storage.lock().await;
    let task = tasks::create_task(&mut storage, &identity, input)?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<TaskPatch>,
) -> ApiResult<Json<Task>> {
    let mut storage = state.storage.lock().await;
    Ok(Json(tasks::update_task(&mut storage, &identity, &id, patch)?))
}

async fn delete_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let mut storage = state.storage.lock().await;
    tasks::delete_task(&mut storage, &identity, &id)?;
    Ok(removed("Task"))
}

pub(super) fn test_run_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(report_run))
        .route("/test-case/:id", get(run_history))
        .route("/test-case/:id/latest", get(latest_run))
        .route("/latest-batch", post(latest_batch))
}

async fn report_run(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiJson(report): ApiJson<RunReport>,
) -> ApiResult<(StatusCode, Json<TestRun>)> {
    let mut storage = state.storage.lock().await;
    let run = test_runs::report_run(&mut storage, &identity, report)?;
    Ok((StatusCode::CREATED, Json(run)))
}

async fn run_history(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<TestRun>>> {
    let storage = state.storage.lock().await;
    Ok(Json(test_runs::run_history(&storage, &identity, &id)?))
}

async fn latest_run(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Json<TestRun>> {
    let storage = state.storage.lock().await;
    Ok(Json(test_runs::latest_run(&storage, &identity, &id)?))
}

async fn latest_batch(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiJson(batch): ApiJson<LatestBatch>,
) -> ApiResult<Json<BTreeMap<String, TestRun>>> {
    let storage = state.storage.lock().await;
    Ok(Json(test_runs::latest_runs(&storage, &identity, &batch.test_case_ids)?))
}
