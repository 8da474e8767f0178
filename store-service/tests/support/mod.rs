#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use common_auth::{JwtConfig, Role, TokenService};
use common_money::Money;
use http_body_util::BodyExt;
use serde_json::Value;
use store_service::models::{Product, User};
use store_service::payment::{MockGateway, PaymentGateway};
use store_service::store::{CatalogStore, MemoryStore, UserStore};
use store_service::{build_router, AppState, StoreMetrics};
use tower::ServiceExt;
use uuid::Uuid;

pub const SECRET: &str = "test-secret";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub tokens: Arc<TokenService>,
}

pub fn test_app() -> TestApp {
    test_app_with_gateway(Arc::new(MockGateway::new(Some("sk_test".into()), "stripe")))
}

pub fn test_app_with_gateway(payments: Arc<dyn PaymentGateway>) -> TestApp {
    let tokens = Arc::new(TokenService::new(JwtConfig::new(SECRET, Duration::hours(1))).unwrap());
    let store = Arc::new(MemoryStore::new());
    let metrics = StoreMetrics::new().unwrap();
    let state = AppState::new(store.clone(), tokens.clone(), payments, metrics);
    let router = build_router(state.clone(), &["http://localhost:3000".to_string()]);
    TestApp { router, state, store, tokens }
}

impl TestApp {
    /// Inserts an account directly and returns it with a fresh token.
    pub async fn user_with_role(&self, role: Role) -> (User, String) {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let user = User {
            id,
            name: "Test User".into(),
            email: format!("{}@example.com", id.simple()),
            password_hash: "unused".into(),
            phone: "555-0100".into(),
            role,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_user(&user).await.unwrap();
        let token = self.tokens.issue(user.id, role).unwrap();
        (user, token)
    }

    pub async fn customer(&self) -> (User, String) {
        self.user_with_role(Role::User).await
    }

    pub async fn admin(&self) -> (User, String) {
        self.user_with_role(Role::Admin).await
    }

    pub async fn seed_product(&self, name: &str, price_cents: i64, stock: i32) -> Product {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            price: Money::from_cents(price_cents),
            category: "general".into(),
            brand: "acme".into(),
            image_url: String::new(),
            stock,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_product(&product).await.unwrap();
        product
    }

    pub async fn product(&self, id: Uuid) -> Option<Product> {
        self.store.find_product(id).await.unwrap()
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, json)
    }

    pub async fn add_to_cart(&self, token: &str, product_id: Uuid, quantity: i32) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/api/cart",
            Some(token),
            Some(serde_json::json!({ "product_id": product_id, "quantity": quantity })),
        )
        .await
    }

    pub async fn checkout(&self, token: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/api/orders",
            Some(token),
            Some(serde_json::json!({ "address": "1 Main St", "shipping_type": "standard" })),
        )
        .await
    }
}
