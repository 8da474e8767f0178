use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::{middleware, routing::get, Router};
use common_http_errors::{track_http_errors, ApiError, HttpErrorMetrics, MAX_ERROR_CODES};
use prometheus::{Encoder, Registry, TextEncoder};
use tower::ServiceExt;

async fn not_found() -> Result<&'static str, ApiError> {
    Err(ApiError::not_found("widget", "widget not found"))
}

#[tokio::test]
async fn middleware_counts_error_responses() {
    let registry = Registry::new();
    let metrics = HttpErrorMetrics::new("test-svc", &registry).unwrap();
    let app = Router::new()
        .route("/err", get(not_found))
        .route("/ok", get(|| async { "ok" }))
        .layer(middleware::from_fn_with_state(metrics.clone(), track_http_errors));

    for uri in ["/err", "/err", "/ok"] {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        app.clone().oneshot(req).await.unwrap();
    }

    let mut buf = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();
    assert!(text.contains(
        r#"http_errors_total{code="widget_not_found",service="test-svc",status="404"} 2"#
    ));
    assert_eq!(metrics.distinct_codes(), 1);
}

#[test]
fn codes_beyond_guard_fold_into_overflow() {
    let metrics = HttpErrorMetrics::new("test-svc", &Registry::new()).unwrap();
    for i in 0..MAX_ERROR_CODES + 10 {
        metrics.record(&format!("code_{i}"), StatusCode::BAD_REQUEST.as_u16());
    }
    assert_eq!(metrics.distinct_codes() as usize, MAX_ERROR_CODES);
    assert_eq!(metrics.overflow_count(), 10);

    // already-seen codes keep their own label
    metrics.record("code_0", 400);
    assert_eq!(metrics.overflow_count(), 10);
}
