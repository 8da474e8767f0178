use std::sync::Arc;

use axum::extract::{FromRef, State};
use axum::http::{header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE}, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{middleware, Router};
use common_auth::TokenService;
use common_http_errors::metrics::track_http_errors;
use common_security::{authenticate, require_admin};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::error;

use crate::cart::CartService;
use crate::cart_handlers::{add_item, clear_cart, get_cart, remove_item, update_item};
use crate::catalog::CatalogService;
use crate::metrics::StoreMetrics;
use crate::order_handlers::{create_order, get_order, list_orders, process_payment, update_order_status};
use crate::orders::OrderService;
use crate::payment::PaymentGateway;
use crate::product_handlers::{create_product, delete_product, get_product, list_products, update_product};
use crate::store::Store;
use crate::user_handlers::{delete_account, get_profile, login, register, update_profile};
use crate::users::UserService;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserService>,
    pub catalog: Arc<CatalogService>,
    pub carts: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub tokens: Arc<TokenService>,
    pub metrics: StoreMetrics,
}

impl FromRef<AppState> for Arc<TokenService> {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

impl AppState {
    /// Wires every service onto one backing store.
    pub fn new<S: Store>(
        store: Arc<S>,
        tokens: Arc<TokenService>,
        payments: Arc<dyn PaymentGateway>,
        metrics: StoreMetrics,
    ) -> Self {
        Self {
            users: Arc::new(UserService::new(store.clone(), tokens.clone())),
            catalog: Arc::new(CatalogService::new(store.clone())),
            carts: Arc::new(CartService::new(store.clone(), store.clone())),
            orders: Arc::new(OrderService::new(store, payments, metrics.clone())),
            tokens,
            metrics,
        }
    }
}

pub async fn health() -> &'static str {
    "ok"
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(response) => response,
        Err(err) => {
            error!(error = %err, "metrics encode failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encode error").into_response()
        }
    }
}

pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            allowed_origins
                .iter()
                .filter_map(|o| o.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        ))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION]);

    let public = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/products", get(list_products))
        .route("/products/:id", get(get_product));

    let admin = Router::new()
        .route("/products", post(create_product))
        .route("/products/:id", put(update_product).delete(delete_product))
        .route("/orders/:id/status", put(update_order_status))
        .route_layer(middleware::from_fn(require_admin));

    // authenticate wraps require_admin, so the admin gate always sees a context
    let authenticated = Router::new()
        .route("/user", get(get_profile).put(update_profile).delete(delete_account))
        .route("/cart", get(get_cart).post(add_item))
        .route("/cart/clear", post(clear_cart))
        .route("/cart/:id", put(update_item).delete(remove_item))
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/pay", post(process_payment))
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate));

    let http_errors = state.metrics.http_errors();
    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics))
        .nest("/api", public.merge(authenticated))
        .with_state(state)
        .layer(cors)
        .layer(middleware::from_fn_with_state(http_errors, track_http_errors))
}
