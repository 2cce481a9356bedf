use std::future::Future;
use std::sync::Arc;

use hyper::{Body, Request, Response};
use routerify::ext::RequestExt as _;
use routerify::{Middleware, RequestInfo, Router, RouterBuilder};
use tracing::{info, info_span, Instrument};

use crate::auth::{AuthError, JwtAuth};

use super::error::{route_error_handler, ApiError};

/// Shared entry point for building an HTTP router: installs the error
/// handler and the request-id/timing middleware every service wants.
pub fn make_router() -> RouterBuilder<Body, ApiError> {
    Router::builder()
        .middleware(Middleware::pre(request_log_middleware))
        .err_handler(route_error_handler)
}

async fn request_log_middleware(request: Request<Body>) -> Result<Request<Body>, ApiError> {
    info!(method = %request.method(), path = request.uri().path(), "received request");
    Ok(request)
}

/// Wraps a handler future in a span carrying the method, path and a
/// per-request id, so every log line the handler emits can be correlated
/// back to the request that caused it.
pub async fn request_span<H, R>(request: Request<Body>, handler: H) -> Result<Response<Body>, ApiError>
where
    H: FnOnce(Request<Body>) -> R + Send + Sync + 'static,
    R: Future<Output = Result<Response<Body>, ApiError>> + Send + 'static,
{
    let request_id = uuid::Uuid::new_v4();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let span = info_span!("request", %request_id, %method, %path);
    handler(request).instrument(span).await
}

/// A request authenticator: returns `None` when a path should bypass auth
/// entirely (health checks, metrics), `Some(auth)` otherwise.
pub type AuthLookup = dyn Fn(&Request<Body>) -> Option<Arc<JwtAuth>> + Send + Sync;

/// Middleware rejecting any request whose `Authorization: Bearer <token>`
/// header does not decode against the auth instance `lookup` returns for
/// that request.
pub fn auth_middleware<F>(lookup: F) -> Middleware<Body, ApiError>
where
    F: Fn(&Request<Body>) -> Option<Arc<JwtAuth>> + Send + Sync + 'static,
{
    Middleware::pre(move |request: Request<Body>| {
        let auth = lookup(&request);
        async move {
            let Some(auth) = auth else {
                return Ok(request);
            };

            let token = extract_bearer_token(&request)?;
            let claims: serde_json::Value = auth.decode(&token).map_err(|e| match e {
                AuthError::Expired => ApiError::Unauthorized("token has expired".to_string()),
                AuthError::Signature => ApiError::Unauthorized("invalid token signature".to_string()),
                AuthError::Malformed(msg) => ApiError::Unauthorized(format!("malformed token: {msg}")),
            })?;
            Ok(request.set_context(claims))
        }
    })
}

fn extract_bearer_token(request: &Request<Body>) -> Result<String, ApiError> {
    let header = request
        .headers()
        .get(hyper::header::AUTHORIZATION)
        .ok_or_else(|| ApiError::Unauthorized("missing Authorization header".to_string()))?;
    let header = header
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Authorization header is not valid UTF-8".to_string()))?;
    header
        .strip_prefix("Bearer ")
        .map(|s| s.to_string())
        .ok_or_else(|| ApiError::Unauthorized("Authorization header is not a bearer token".to_string()))
}

pub fn error_handler(err: routerify::RouteError, _info: RequestInfo) -> Response<Body> {
    match err.downcast::<ApiError>() {
        Ok(api_error) => api_error.into_response(),
        Err(other) => {
            tracing::error!("unhandled routing error: {other:?}");
            Response::builder()
                .status(hyper::StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::from("Internal Server Error"))
                .unwrap()
        }
    }
}
