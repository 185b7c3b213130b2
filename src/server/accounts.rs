//! `/api/auth` routes.

use super::{ApiJson, ApiResult, AppState};
use crate::auth::Identity;
use crate::commands::auth::{
    self, Credentials, PasswordChange, ProfileUpdate, Registration, Session,
};
use crate::models::UserProfile;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{post, put};
use axum::{Extension, Json, Router};
use serde_json::{Value, json};

pub(super) fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub(super) fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/password", put(change_password))
        .route("/auth/profile", put(update_profile))
}

async fn register(
    State(state): State<AppState>,
    ApiJson(registration): ApiJson<Registration>,
) -> ApiResult<(StatusCode, Json<Session>)> {
    let mut storage = state.storage.lock().await;
    let session = auth::register(&mut storage, &state.signer, state.hasher.as_ref(), registration)?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(credentials): ApiJson<Credentials>,
) -> ApiResult<Json<Session>> {
    let storage = state.storage.lock().await;
    let session = auth::login(&storage, &state.signer, state.hasher.as_ref(), credentials)?;
    Ok(Json(session))
}

async fn change_password(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiJson(change): ApiJson<PasswordChange>,
) -> ApiResult<Json<Value>> {
    let mut storage = state.storage.lock().await;
    auth::change_password(&mut storage, &identity, state.hasher.as_ref(), change)?;
    Ok(Json(json!({ "message": "Password updated" })))
}

async fn update_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> ApiResult<Json<UserProfile>> {
    let mut storage = state.storage.lock().await;
    Ok(Json(auth::update_profile(&mut storage, &identity, update)?))
}
