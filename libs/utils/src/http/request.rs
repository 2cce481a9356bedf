use hyper::{Body, Request};
use routerify::ext::RequestExt as _;
use std::str::FromStr;

use super::error::ApiError;

pub fn parse_request_param<T: FromStr>(
    request: &Request<Body>,
    param_name: &str,
) -> Result<T, ApiError>
where
    <T as FromStr>::Err: std::fmt::Display,
{
    match request.param(param_name) {
        Some(val) => val.parse().map_err(|e| {
            ApiError::BadRequest(anyhow::anyhow!(
                "failed to parse path param '{param_name}': {e}"
            ))
        }),
        None => Err(ApiError::BadRequest(anyhow::anyhow!(
            "missing path param '{param_name}'"
        ))),
    }
}

pub fn parse_query_param<T: FromStr>(
    request: &Request<Body>,
    param_name: &str,
) -> Result<Option<T>, ApiError>
where
    <T as FromStr>::Err: std::fmt::Display,
{
    let Some(query) = request.uri().query() else {
        return Ok(None);
    };

    let value = url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == param_name)
        .map(|(_, v)| v.into_owned());

    let Some(value) = value else {
        return Ok(None);
    };

    value
        .parse()
        .map(Some)
        .map_err(|e| {
            ApiError::BadRequest(anyhow::anyhow!(
                "failed to parse query param '{param_name}': {e}"
            ))
        })
}

pub fn ensure_no_body(request: &mut Request<Body>) -> Result<(), ApiError> {
    // draining with a zero-length check avoids buffering an unbounded body
    // just to reject it.
    if request.body().size_hint().lower() > 0 {
        return Err(ApiError::BadRequest(anyhow::anyhow!(
            "this endpoint does not accept a request body"
        )));
    }
    Ok(())
}
