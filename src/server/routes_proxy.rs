//! Same-origin HLS proxy endpoint.
//!
//! `GET <public_path>?url=<absolute url>` fetches the URL and returns it with
//! permissive CORS headers; playlists come back with every reference
//! rewritten to go through this endpoint again.

use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::proxy::parse_target;

use super::request_id::RequestId;
use super::AppContext;

/// Mount the proxy at its configured public path.
pub fn proxy_routes(public_path: &str) -> Router<AppContext> {
    Router::new().route(public_path, get(stream_proxy).options(proxy_preflight))
}

async fn stream_proxy(
    State(ctx): State<AppContext>,
    request_id: RequestId,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let raw_url = query.as_deref().and_then(url_param);
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok());

    let result = match parse_target(raw_url.as_deref()) {
        Ok(target) => ctx.proxy.fetch(&target, user_agent).await,
        Err(e) => Err(e),
    };

    let response = match result {
        Ok(resource) => {
            let content_type = resource
                .content_type()
                .and_then(|ct| HeaderValue::from_str(ct).ok());
            let cache_control = HeaderValue::from_static(resource.cache_control());

            let mut response = (StatusCode::OK, resource.body).into_response();
            let out = response.headers_mut();
            if let Some(ct) = content_type {
                out.insert(header::CONTENT_TYPE, ct);
            }
            out.insert(header::CACHE_CONTROL, cache_control);
            response
        }
        Err(e) => request_id.error(e).into_response(),
    };

    with_cors(response)
}

async fn proxy_preflight() -> Response {
    with_cors(StatusCode::NO_CONTENT.into_response())
}

fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Range"),
    );
    response
}

fn url_param(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == "url")
        .map(|(_, value)| value.into_owned())
}
