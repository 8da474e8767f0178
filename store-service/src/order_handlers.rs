use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use common_http_errors::ApiResult;
use common_security::SecurityCtxExtractor;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppState;
use crate::extract::{ApiJson, ApiPath};
use crate::models::{Order, OrderStatus};
use crate::orders::CreateOrderRequest;

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub payment_id: Option<String>,
    pub payment_type: Option<String>,
    pub status: OrderStatus,
}

pub async fn create_order(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
    ApiJson(req): ApiJson<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let order = state.orders.create_order(sec.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(state.orders.list_orders(sec.user_id).await?))
}

pub async fn get_order(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
    ApiPath(order_id): ApiPath<Uuid>,
) -> ApiResult<Json<Order>> {
    Ok(Json(state.orders.get_order(order_id, &sec).await?))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    ApiPath(order_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateStatusRequest>,
) -> ApiResult<Json<Order>> {
    Ok(Json(state.orders.update_status(order_id, &req.status).await?))
}

pub async fn process_payment(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
    ApiJson(req): ApiJson<PaymentRequest>,
) -> ApiResult<Json<PaymentResponse>> {
    let order = state.orders.process_payment(req.order_id, &sec).await?;
    Ok(Json(PaymentResponse {
        payment_id: order.payment_id,
        payment_type: order.payment_type,
        status: order.status,
    }))
}
