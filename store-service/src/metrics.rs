use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use common_http_errors::HttpErrorMetrics;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

pub const SERVICE_NAME: &str = "store-service";

#[derive(Clone)]
pub struct StoreMetrics {
    registry: Registry,
    orders_created: IntCounter,
    checkout_failures: IntCounterVec,
    payments: IntCounterVec,
    http_errors: HttpErrorMetrics,
}

impl StoreMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let orders_created = IntCounter::new(
            "store_orders_created_total",
            "Orders successfully created from carts",
        )?;
        registry.register(Box::new(orders_created.clone()))?;

        let checkout_failures = IntCounterVec::new(
            Opts::new(
                "store_checkout_failures_total",
                "Checkout attempts rejected, grouped by reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(checkout_failures.clone()))?;

        let payments = IntCounterVec::new(
            Opts::new("store_payments_total", "Payment attempts grouped by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(payments.clone()))?;

        let http_errors = HttpErrorMetrics::new(SERVICE_NAME, &registry)?;

        Ok(Self {
            registry,
            orders_created,
            checkout_failures,
            payments,
            http_errors,
        })
    }

    pub fn order_created(&self) {
        self.orders_created.inc();
    }

    pub fn checkout_failed(&self, reason: &str) {
        self.checkout_failures.with_label_values(&[reason]).inc();
    }

    pub fn payment(&self, outcome: &str) {
        self.payments.with_label_values(&[outcome]).inc();
    }

    pub fn http_errors(&self) -> HttpErrorMetrics {
        self.http_errors.clone()
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}
