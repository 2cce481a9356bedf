use std::sync::Arc;

use hyper::{Body, Request, Response, StatusCode};
use utils::http::endpoint::{self, request_span};
use utils::http::error::ApiError;
use utils::http::json::json_response;
use utils::http::request::parse_request_param;
use utils::http::{RequestExt, RouterBuilder};

use crate::errors::RepositoryError;
use crate::http::models::{DrsErrorBody, HealthStatus};
use crate::ServiceState;

async fn health_handler(_request: Request<Body>) -> Result<Response<Body>, ApiError> {
    json_response(StatusCode::OK, HealthStatus::default())
}

async fn metrics_handler(request: Request<Body>) -> Result<Response<Body>, ApiError> {
    let state = get_state(&request);
    let encoded = state
        .metrics
        .encode()
        .map_err(ApiError::InternalServerError)?;
    Response::builder()
        .status(StatusCode::OK)
        .header(hyper::header::CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(Body::from(encoded))
        .map_err(|e| ApiError::InternalServerError(e.into()))
}

async fn access_object_handler(request: Request<Body>) -> Result<Response<Body>, ApiError> {
    let object_id: String = parse_request_param(&request, "object_id")?;
    let state = get_state(&request);
    let route = "/objects/:object_id";

    if let Some(response) = authorize(&request, &state, &object_id, route)? {
        return Ok(response);
    }

    match state.repository.access_drs_object(&object_id).await {
        Ok(response_model) => {
            record_status(&state, route, StatusCode::OK);
            json_response(StatusCode::OK, response_model)
        }
        Err(RepositoryError::RetryAccessLater { retry_after }) => {
            record_status(&state, route, StatusCode::ACCEPTED);
            Response::builder()
                .status(StatusCode::ACCEPTED)
                .header("Retry-After", retry_after.as_secs().to_string())
                .body(Body::empty())
                .map_err(|e| ApiError::InternalServerError(e.into()))
        }
        Err(e) => Ok(repository_error_response(e, route, &state)),
    }
}

async fn get_envelope_handler(request: Request<Body>) -> Result<Response<Body>, ApiError> {
    let object_id: String = parse_request_param(&request, "object_id")?;
    let public_key: String = parse_request_param(&request, "public_key")?;
    let state = get_state(&request);
    let route = "/objects/:object_id/envelopes/:public_key";

    if let Some(response) = authorize(&request, &state, &object_id, route)? {
        return Ok(response);
    }

    match state.repository.serve_envelope(&object_id, &public_key).await {
        Ok(envelope) => {
            record_status(&state, route, StatusCode::OK);
            Response::builder()
                .status(StatusCode::OK)
                .header(hyper::header::CONTENT_TYPE, "text/plain")
                .body(Body::from(envelope))
                .map_err(|e| ApiError::InternalServerError(e.into()))
        }
        Err(e) => Ok(repository_error_response(e, route, &state)),
    }
}

/// Validates the `Authorization: Bearer <JWS>` header against the
/// requested `object_id` (§4.6). Returns `Ok(Some(response))` with a 403
/// DRS-error body when the token is missing or invalid, `Ok(None)` when
/// the caller may proceed.
fn authorize(
    request: &Request<Body>,
    state: &ServiceState,
    object_id: &str,
    route: &str,
) -> Result<Option<Response<Body>>, ApiError> {
    let forbidden = |exception_id: &'static str, description: &str| {
        Ok(Some(drs_error_response(
            state,
            route,
            StatusCode::FORBIDDEN,
            exception_id,
            description,
        )))
    };

    let Some(header) = request.headers().get(hyper::header::AUTHORIZATION) else {
        return forbidden("tokenMalformedError", "missing Authorization header");
    };
    let Ok(header) = header.to_str() else {
        return forbidden("tokenMalformedError", "Authorization header is not UTF-8");
    };
    let Some(token) = header.strip_prefix("Bearer ") else {
        return forbidden("tokenMalformedError", "not a bearer token");
    };

    match crate::auth::decode_and_check(&state.jwt_auth, token, object_id) {
        Ok(_) => Ok(None),
        Err(RepositoryError::TokenExpired) => forbidden("tokenExpiredError", "token expired"),
        Err(RepositoryError::TokenSignature) => {
            forbidden("tokenSignatureError", "invalid signature")
        }
        Err(_) => forbidden("tokenMalformedError", "malformed token"),
    }
}

fn repository_error_response(
    error: RepositoryError,
    route: &str,
    state: &ServiceState,
) -> Response<Body> {
    let (status, exception_id) = match &error {
        RepositoryError::DrsObjectNotFound => (StatusCode::NOT_FOUND, "noSuchObject"),
        RepositoryError::EnvelopeNotFound => (StatusCode::NOT_FOUND, "envelopeNotFoundError"),
        RepositoryError::ApiCommunicationError { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "externalAPIError")
        }
        RepositoryError::TokenMalformed => (StatusCode::FORBIDDEN, "tokenMalformedError"),
        RepositoryError::TokenSignature => (StatusCode::FORBIDDEN, "tokenSignatureError"),
        RepositoryError::TokenExpired => (StatusCode::FORBIDDEN, "tokenExpiredError"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "dbInteractionError"),
    };

    if status.is_server_error() {
        tracing::error!(%error, route, "unexpected repository error");
    } else {
        tracing::warn!(%error, route, "expected repository error");
    }

    drs_error_response(state, route, status, exception_id, &error.to_string())
}

fn drs_error_response(
    state: &ServiceState,
    route: &str,
    status: StatusCode,
    exception_id: &'static str,
    description: &str,
) -> Response<Body> {
    record_status(state, route, status);
    let body = DrsErrorBody {
        exception_id,
        description: description.to_string(),
    };
    let json = serde_json::to_vec(&body).expect("DrsErrorBody always serializes");
    Response::builder()
        .status(status)
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(Body::from(json))
        .expect("static response parts always build")
}

fn record_status(state: &ServiceState, route: &str, status: StatusCode) {
    state
        .metrics
        .http_requests_total
        .with_label_values(&[route, status.as_str()])
        .inc();
}

fn get_state(request: &Request<Body>) -> Arc<ServiceState> {
    request
        .data::<Arc<ServiceState>>()
        .expect("ServiceState must be registered on the router")
        .clone()
}

pub fn make_router(state: Arc<ServiceState>) -> RouterBuilder<Body, ApiError> {
    endpoint::make_router()
        .data(state)
        .get("/health", |r| request_span(r, health_handler))
        .get("/metrics", |r| request_span(r, metrics_handler))
        .get("/objects/:object_id", |r| {
            request_span(r, access_object_handler)
        })
        .get("/objects/:object_id/envelopes/:public_key", |r| {
            request_span(r, get_envelope_handler)
        })
}
