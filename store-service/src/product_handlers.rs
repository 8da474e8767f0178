use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use common_http_errors::ApiResult;
use uuid::Uuid;

use crate::app::AppState;
use crate::catalog::ProductPage;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::models::{Product, ProductFilter, ProductInput};

pub async fn list_products(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ProductFilter>,
) -> ApiResult<Json<ProductPage>> {
    Ok(Json(state.catalog.list(filter).await?))
}

pub async fn get_product(
    State(state): State<AppState>,
    ApiPath(product_id): ApiPath<Uuid>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.catalog.get(product_id).await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ProductInput>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let product = state.catalog.create(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    ApiPath(product_id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<ProductInput>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.catalog.update(product_id, input).await?))
}

pub async fn delete_product(
    State(state): State<AppState>,
    ApiPath(product_id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    state.catalog.delete(product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
