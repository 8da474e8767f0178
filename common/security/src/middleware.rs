use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use common_auth::AuthContext;
use common_http_errors::ApiError;

use crate::context::SecurityContext;
use crate::roles::ensure_admin;
use crate::SecurityError;

/// Authentication gate. Install with `middleware::from_fn_with_state(state, authenticate)`
/// where `Arc<TokenService>: FromRef<state>`; missing or invalid credentials are rejected
/// by the [`AuthContext`] extractor before this body runs.
pub async fn authenticate(auth: AuthContext, mut req: Request, next: Next) -> Response {
    req.extensions_mut().insert(SecurityContext::from(auth.into_claims()));
    next.run(req).await
}

/// Admin gate. Must sit inside [`authenticate`]; without a context it answers 401.
pub async fn require_admin(req: Request, next: Next) -> Response {
    let verdict = match req.extensions().get::<SecurityContext>() {
        Some(ctx) => ensure_admin(ctx),
        None => Err(SecurityError::Unauthenticated),
    };
    match verdict {
        Ok(()) => next.run(req).await,
        Err(err) => ApiError::from(err).into_response(),
    }
}
