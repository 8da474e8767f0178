use axum::extract::State;
use axum::Json;
use common_http_errors::ApiResult;
use common_security::SecurityCtxExtractor;
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::cart::CartView;
use crate::extract::{ApiJson, ApiPath};

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i32,
}

pub async fn get_cart(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
) -> ApiResult<Json<CartView>> {
    Ok(Json(state.carts.view(sec.user_id).await?))
}

pub async fn add_item(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
    ApiJson(req): ApiJson<AddItemRequest>,
) -> ApiResult<Json<CartView>> {
    let cart = state
        .carts
        .add_item(sec.user_id, req.product_id, req.quantity)
        .await?;
    Ok(Json(cart))
}

pub async fn update_item(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
    ApiPath(item_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateItemRequest>,
) -> ApiResult<Json<CartView>> {
    let cart = state
        .carts
        .update_item(sec.user_id, item_id, req.quantity)
        .await?;
    Ok(Json(cart))
}

pub async fn remove_item(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
    ApiPath(item_id): ApiPath<Uuid>,
) -> ApiResult<Json<CartView>> {
    Ok(Json(state.carts.remove_item(sec.user_id, item_id).await?))
}

pub async fn clear_cart(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
) -> ApiResult<Json<CartView>> {
    Ok(Json(state.carts.clear(sec.user_id).await?))
}
