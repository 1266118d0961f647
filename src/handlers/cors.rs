use axum::{
    body::Body,
    http::{HeaderValue, Request, StatusCode, Uri, header},
    middleware::Next,
    response::Response,
};

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "GET,OPTIONS,PATCH,DELETE,POST,PUT";
pub const ALLOW_HEADERS: &str = "X-CSRF-Token, X-Requested-With, Accept, Accept-Version, Content-Length, Content-MD5, Content-Type, Date, X-Api-Version";

/// Stamp the permissive CORS headers on every response, errors included
pub async fn apply_cors_headers(req: Request<Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static(ALLOW_ORIGIN),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    response
}

/// `OPTIONS` preflight: 200 with an empty body
pub async fn preflight(uri: Uri) -> StatusCode {
    tracing::debug!(path = %uri.path(), "Handling OPTIONS request for CORS preflight");
    StatusCode::OK
}
