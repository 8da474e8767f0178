use std::sync::Arc;

use axum::body::Body;
use axum::http::{header::AUTHORIZATION, Request, StatusCode};
use axum::{middleware, routing::get, Router};
use chrono::Duration;
use common_auth::{JwtConfig, Role, TokenService};
use common_security::{authenticate, require_admin, SecurityCtxExtractor};
use tower::ServiceExt;
use uuid::Uuid;

async fn whoami(SecurityCtxExtractor(ctx): SecurityCtxExtractor) -> String {
    ctx.user_id.to_string()
}

fn app(tokens: Arc<TokenService>) -> Router {
    let admin = Router::new()
        .route("/admin", get(|| async { "admin" }))
        .route_layer(middleware::from_fn(require_admin));
    let authed = Router::new()
        .route("/me", get(whoami))
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(tokens, authenticate));
    Router::new()
        .merge(authed)
        .route("/open", get(whoami))
        .route("/misordered", get(|| async { "x" }).route_layer(middleware::from_fn(require_admin)))
}

fn tokens() -> Arc<TokenService> {
    Arc::new(TokenService::new(JwtConfig::new("gate-secret", Duration::hours(1))).unwrap())
}

async fn call(app: &Router, uri: &str, token: Option<&str>) -> (StatusCode, String) {
    let mut req = Request::builder().uri(uri);
    if let Some(token) = token {
        req = req.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let resp = app.clone().oneshot(req.body(Body::empty()).unwrap()).await.unwrap();
    let status = resp.status();
    let code = resp
        .headers()
        .get("x-error-code")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    (status, code)
}

#[tokio::test]
async fn authenticated_user_reaches_handler() {
    let tokens = tokens();
    let app = app(tokens.clone());
    let token = tokens.issue(Uuid::new_v4(), Role::User).unwrap();
    assert_eq!(call(&app, "/me", Some(&token)).await.0, StatusCode::OK);
}

#[tokio::test]
async fn missing_or_garbage_credentials_are_unauthenticated() {
    let app = app(tokens());
    assert_eq!(call(&app, "/me", None).await, (StatusCode::UNAUTHORIZED, "AUTH_HEADER".into()));
    assert_eq!(
        call(&app, "/me", Some("not.a.jwt")).await,
        (StatusCode::UNAUTHORIZED, "AUTH_TOKEN".into())
    );
}

#[tokio::test]
async fn admin_gate_forbids_regular_users() {
    let tokens = tokens();
    let app = app(tokens.clone());
    let user = tokens.issue(Uuid::new_v4(), Role::User).unwrap();
    let admin = tokens.issue(Uuid::new_v4(), Role::Admin).unwrap();

    assert_eq!(call(&app, "/admin", Some(&user)).await, (StatusCode::FORBIDDEN, "forbidden".into()));
    assert_eq!(call(&app, "/admin", Some(&admin)).await.0, StatusCode::OK);
    assert_eq!(call(&app, "/admin", None).await.0, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn gates_out_of_order_fail_closed() {
    let app = app(tokens());
    assert_eq!(
        call(&app, "/misordered", None).await,
        (StatusCode::UNAUTHORIZED, "unauthenticated".into())
    );
    assert_eq!(call(&app, "/open", None).await.0, StatusCode::UNAUTHORIZED);
}
