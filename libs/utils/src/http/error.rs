use hyper::{Body, Response, StatusCode};
use serde::Serialize;
use std::fmt::Display;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(anyhow::Error),
    Forbidden(String),
    Unauthorized(String),
    NotFound(anyhow::Error),
    Conflict(String),
    PreconditionFailed(Box<str>),
    ResourceUnavailable(std::borrow::Cow<'static, str>),
    ShuttingDown,
    InternalServerError(anyhow::Error),
}

impl ApiError {
    pub fn into_response(self) -> Response<Body> {
        match self {
            ApiError::BadRequest(err) => HttpErrorBody::response_from_msg_and_status(
                format!("{err:#}"),
                StatusCode::BAD_REQUEST,
            ),
            ApiError::Forbidden(msg) => HttpErrorBody::response_from_msg_and_status(
                format!("Forbidden: {msg}"),
                StatusCode::FORBIDDEN,
            ),
            ApiError::Unauthorized(msg) => HttpErrorBody::response_from_msg_and_status(
                format!("Unauthorized: {msg}"),
                StatusCode::UNAUTHORIZED,
            ),
            ApiError::NotFound(err) => {
                HttpErrorBody::response_from_msg_and_status(format!("{err:#}"), StatusCode::NOT_FOUND)
            }
            ApiError::Conflict(msg) => {
                HttpErrorBody::response_from_msg_and_status(msg, StatusCode::CONFLICT)
            }
            ApiError::PreconditionFailed(msg) => HttpErrorBody::response_from_msg_and_status(
                msg.to_string(),
                StatusCode::PRECONDITION_FAILED,
            ),
            ApiError::ResourceUnavailable(msg) => HttpErrorBody::response_from_msg_and_status(
                msg.to_string(),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            ApiError::ShuttingDown => HttpErrorBody::response_from_msg_and_status(
                "Shutting down".to_string(),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            ApiError::InternalServerError(err) => {
                tracing::error!("Internal server error: {err:?}");
                HttpErrorBody::response_from_msg_and_status(
                    "Internal Server Error".to_string(),
                    StatusCode::INTERNAL_SERVER_ERROR,
                )
            }
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(err) => write!(f, "Bad request: {err:#}"),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            ApiError::NotFound(err) => write!(f, "Not found: {err:#}"),
            ApiError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            ApiError::PreconditionFailed(msg) => write!(f, "Precondition failed: {msg}"),
            ApiError::ResourceUnavailable(msg) => write!(f, "Resource unavailable: {msg}"),
            ApiError::ShuttingDown => write!(f, "Shutting down"),
            ApiError::InternalServerError(err) => write!(f, "Internal server error: {err:#}"),
        }
    }
}

impl std::error::Error for ApiError {}

#[derive(Serialize)]
struct HttpErrorBody {
    pub message: String,
}

impl HttpErrorBody {
    fn response_from_msg_and_status(message: String, status: StatusCode) -> Response<Body> {
        HttpErrorBody { message }.to_response(status)
    }

    fn to_response(&self, status: StatusCode) -> Response<Body> {
        Response::builder()
            .status(status)
            .header(hyper::header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(self).unwrap()))
            .unwrap()
    }
}

pub async fn route_error_handler(err: routerify::RouteError) -> Response<Body> {
    match err.downcast::<ApiError>() {
        Ok(api_error) => api_error.into_response(),
        Err(other_error) => {
            tracing::error!("Error processing HTTP request: {other_error:?}");
            HttpErrorBody::response_from_msg_and_status(
                "Internal Server Error".to_string(),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        }
    }
}
