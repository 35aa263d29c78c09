use crate::tracing::RequestId;
use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

/// Header name for the request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Reads `x-request-id` from the incoming request (or generates one), exposes it
/// to handlers as an extension and echoes it on the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let incoming = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(RequestId::new);

    let (request_id, header_value) = match incoming
        .and_then(|rid| HeaderValue::from_str(rid.as_str()).ok().map(|hv| (rid, hv)))
    {
        Some(pair) => pair,
        None => {
            let rid = RequestId::default();
            // a uuid string is always a valid header value
            let hv = HeaderValue::from_str(rid.as_str()).unwrap_or(HeaderValue::from_static(""));
            (rid, hv)
        }
    };

    request
        .headers_mut()
        .insert(HeaderName::from_static(REQUEST_ID_HEADER), header_value.clone());
    request.extensions_mut().insert(request_id.clone());

    let mut response =
        crate::tracing::scope_request_id(request_id, async move { next.run(request).await }).await;

    response
        .headers_mut()
        .insert(HeaderName::from_static(REQUEST_ID_HEADER), header_value);

    response
}
