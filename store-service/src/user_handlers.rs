use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use common_http_errors::ApiResult;
use common_security::SecurityCtxExtractor;
use serde::Serialize;

use crate::app::AppState;
use crate::extract::ApiJson;
use crate::models::User;
use crate::users::{LoginRequest, RegisterRequest, UpdateProfileRequest};

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<TokenResponse>)> {
    let token = state.users.register(req).await?;
    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let token = state.users.login(req).await?;
    Ok(Json(TokenResponse { token }))
}

pub async fn get_profile(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
) -> ApiResult<Json<User>> {
    Ok(Json(state.users.profile(sec.user_id).await?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.users.update_profile(sec.user_id, req).await?))
}

pub async fn delete_account(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
) -> ApiResult<StatusCode> {
    state.users.delete_account(sec.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
