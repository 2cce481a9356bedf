use hyper::{Body, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::error::ApiError;

pub async fn json_request<T: for<'de> Deserialize<'de>>(
    request: &mut Request<Body>,
) -> Result<T, ApiError> {
    let body = hyper::body::to_bytes(request.body_mut())
        .await
        .map_err(|e| ApiError::BadRequest(anyhow::anyhow!("failed to read request body: {e}")))?;

    serde_json::from_slice(&body).map_err(|e| {
        ApiError::BadRequest(anyhow::anyhow!("failed to parse json request: {e}"))
    })
}

pub fn json_response<T: Serialize>(
    status: StatusCode,
    data: T,
) -> Result<Response<Body>, ApiError> {
    let json = serde_json::to_string(&data)
        .map_err(|e| ApiError::InternalServerError(anyhow::anyhow!("failed to serialize response: {e}")))?;
    let response = Response::builder()
        .status(status)
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(Body::from(json))
        .map_err(|e| ApiError::InternalServerError(e.into()))?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Ping {
        ok: bool,
    }

    #[tokio::test]
    async fn parses_a_json_body() {
        let mut request = Request::builder()
            .body(Body::from(r#"{"ok":true}"#))
            .unwrap();
        let parsed: Ping = json_request(&mut request).await.unwrap();
        assert_eq!(parsed, Ping { ok: true });
    }

    #[tokio::test]
    async fn rejects_malformed_json() {
        let mut request = Request::builder().body(Body::from("not json")).unwrap();
        let result: Result<Ping, _> = json_request(&mut request).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }
}
