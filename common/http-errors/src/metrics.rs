use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

use crate::ERROR_CODE_HEADER;

/// Distinct `code` label values tracked before further codes fold into `other`.
pub const MAX_ERROR_CODES: usize = 40;
const OVERFLOW_LABEL: &str = "other";

/// Counts error responses by service, error code and status.
#[derive(Clone)]
pub struct HttpErrorMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    service: &'static str,
    errors: IntCounterVec,
    distinct: IntGauge,
    overflow: IntCounter,
    seen: Mutex<HashSet<String>>,
}

impl HttpErrorMetrics {
    pub fn new(service: &'static str, registry: &Registry) -> prometheus::Result<Self> {
        let errors = IntCounterVec::new(
            Opts::new("http_errors_total", "HTTP error responses"),
            &["service", "code", "status"],
        )?;
        let distinct = IntGauge::new(
            "http_error_codes_distinct",
            "Distinct error codes seen as metric labels",
        )?;
        let overflow = IntCounter::new(
            "http_error_code_overflow_total",
            "Error responses whose code was folded into the overflow label",
        )?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(distinct.clone()))?;
        registry.register(Box::new(overflow.clone()))?;

        Ok(Self {
            inner: Arc::new(Inner {
                service,
                errors,
                distinct,
                overflow,
                seen: Mutex::new(HashSet::new()),
            }),
        })
    }

    pub fn record(&self, code: &str, status: u16) {
        let label = self.label_for(code);
        let status = status.to_string();
        self.inner
            .errors
            .with_label_values(&[self.inner.service, label.as_str(), status.as_str()])
            .inc();
    }

    pub fn distinct_codes(&self) -> i64 {
        self.inner.distinct.get()
    }

    pub fn overflow_count(&self) -> u64 {
        self.inner.overflow.get()
    }

    fn label_for(&self, code: &str) -> String {
        let mut seen = match self.inner.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if seen.contains(code) {
            return code.to_string();
        }
        if seen.len() >= MAX_ERROR_CODES {
            self.inner.overflow.inc();
            return OVERFLOW_LABEL.to_string();
        }
        seen.insert(code.to_string());
        self.inner.distinct.set(seen.len() as i64);
        code.to_string()
    }
}

/// Response middleware: records every 4xx/5xx using its `X-Error-Code` header.
pub async fn track_http_errors(
    State(metrics): State<HttpErrorMetrics>,
    req: Request,
    next: Next,
) -> Response {
    let resp = next.run(req).await;
    let status = resp.status();
    if status.as_u16() >= 400 {
        let code = resp
            .headers()
            .get(ERROR_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown");
        metrics.record(code, status.as_u16());
    }
    resp
}
