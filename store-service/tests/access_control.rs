mod support;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common_auth::Role;
use serde_json::json;
use support::test_app;
use uuid::Uuid;

fn product_body() -> serde_json::Value {
    json!({ "name": "Kettle", "price": "39.90", "category": "kitchen", "stock": 3 })
}

#[tokio::test]
async fn health_and_catalog_reads_are_public() {
    let app = test_app();
    let kettle = app.seed_product("Kettle", 3990, 3).await;

    let (status, _) = app.send(Method::GET, "/healthz", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, page) = app.send(Method::GET, "/api/products", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["page"], 1);
    assert_eq!(page["limit"], 10);

    let (status, product) = app.send(Method::GET, &format!("/api/products/{}", kettle.id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(product["price"], "39.90");

    let (status, body) = app.send(Method::GET, &format!("/api/products/{}", Uuid::new_v4()), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "product_not_found");
}

#[tokio::test]
async fn protected_routes_need_a_valid_bearer_token() {
    let app = test_app();

    let (status, body) = app.send(Method::GET, "/api/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_HEADER");

    let (status, body) = app.send(Method::GET, "/api/user", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_TOKEN");

    let expired = app
        .tokens
        .issue_at(Uuid::new_v4(), Role::User, Utc::now() - Duration::hours(3))
        .unwrap();
    let (status, body) = app.send(Method::GET, "/api/orders", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_TOKEN");

    // admin routes check authentication before the role
    let (status, _) = app.send(Method::POST, "/api/products", None, Some(product_body())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn customers_are_forbidden_from_admin_routes() {
    let app = test_app();
    let (_, token) = app.customer().await;
    let lamp = app.seed_product("Lamp", 2000, 4).await;
    let product_uri = format!("/api/products/{}", lamp.id);
    let status_uri = format!("/api/orders/{}/status", Uuid::new_v4());

    let cases = [
        (Method::POST, "/api/products".to_string(), Some(product_body())),
        (Method::PUT, product_uri.clone(), Some(product_body())),
        (Method::DELETE, product_uri, None),
        (Method::PUT, status_uri, Some(json!({ "status": "shipped" }))),
    ];
    for (method, uri, body) in cases {
        let (status, payload) = app.send(method.clone(), &uri, Some(&token), body).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri}");
        assert_eq!(payload["code"], "forbidden");
    }
    assert_eq!(app.product(lamp.id).await.unwrap().stock, 4);
}

#[tokio::test]
async fn admins_manage_the_catalog() {
    let app = test_app();
    let (_, admin) = app.admin().await;

    let (status, created) = app.send(Method::POST, "/api/products", Some(&admin), Some(product_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/api/products/{}", created["id"].as_str().unwrap());

    let (status, body) = app
        .send(Method::POST, "/api/products", Some(&admin), Some(json!({ "name": "Free", "price": "0", "category": "x", "stock": 1 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, _) = app.send(Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.send(Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn catalog_filters_and_search() {
    let app = test_app();
    let (_, admin) = app.admin().await;
    for (name, price, category, brand) in [
        ("Red kettle", "25.00", "kitchen", "acme"),
        ("Blue kettle", "45.00", "kitchen", "globex"),
        ("Desk fan", "30.00", "appliances", "acme"),
    ] {
        let (status, _) = app
            .send(
                Method::POST,
                "/api/products",
                Some(&admin),
                Some(json!({ "name": name, "price": price, "category": category, "brand": brand, "stock": 1 })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, page) = app.send(Method::GET, "/api/products?category=kitchen&max_price=30", None, None).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["products"][0]["name"], "Red kettle");

    let (_, page) = app.send(Method::GET, "/api/products?brand=acme&min_price=26", None, None).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["products"][0]["name"], "Desk fan");

    // search replaces the other predicates
    let (_, page) = app.send(Method::GET, "/api/products?search=KETTLE&brand=acme", None, None).await;
    assert_eq!(page["total"], 2);

    let (status, body) = app.send(Method::GET, "/api/products?min_price=cheap", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_query");
}

#[tokio::test]
async fn register_login_profile_and_delete() {
    let app = test_app();
    let register = json!({ "name": "Ada", "email": "Ada@Example.com", "password": "secret1", "phone": "555-0101" });

    let (status, body) = app.send(Method::POST, "/api/register", None, Some(register.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = app.send(Method::POST, "/api/register", None, Some(register)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "email_taken");

    let (status, body) = app
        .send(Method::POST, "/api/login", None, Some(json!({ "email": "ada@example.com", "password": "wrong-pass" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "invalid email or password");

    let (status, body) = app
        .send(Method::POST, "/api/login", None, Some(json!({ "email": "ada@example.com", "password": "secret1" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());

    let (status, profile) = app.send(Method::GET, "/api/user", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["email"], "ada@example.com");
    assert_eq!(profile["role"], "user");
    assert!(profile.get("password_hash").is_none());

    let (status, profile) = app.send(Method::PUT, "/api/user", Some(&token), Some(json!({ "name": "Ada L." }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["name"], "Ada L.");

    let (status, _) = app.send(Method::DELETE, "/api/user", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(Method::POST, "/api/login", None, Some(json!({ "email": "ada@example.com", "password": "secret1" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // the address is free again once the account is deleted
    let again = json!({ "name": "Ada", "email": "ada@example.com", "password": "secret2", "phone": "555-0101" });
    let (status, _) = app.send(Method::POST, "/api/register", None, Some(again)).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn metrics_count_error_responses() {
    let app = test_app();
    app.send(Method::GET, "/api/cart", None, None).await;

    let (status, body) = app.send(Method::GET, "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().unwrap();
    assert!(text.contains("http_errors_total"));
    assert!(text.contains("code=\"AUTH_HEADER\""));
}
