//! Canned error responses, consistent with the `SessionData::reply` contract.

use http::{HeaderMap, StatusCode};

/// Produces the body for a canned error reply. Callers pass the result to
/// `SessionData::reply`, which takes care of `Content-Length` and
/// `Connection: close` (every error status here is `>= 400`).
pub fn body_for(status: StatusCode) -> Vec<u8> {
    let reason = status.canonical_reason().unwrap_or("Error");
    format!("{} {}\n", status.as_u16(), reason).into_bytes()
}

/// `400 Bad Request` — a malformed request or status line, or a malformed
/// header.
pub fn bad_request() -> (StatusCode, Vec<u8>, HeaderMap) {
    (StatusCode::BAD_REQUEST, body_for(StatusCode::BAD_REQUEST), HeaderMap::new())
}

/// `405 Method Not Allowed` — the resource exists but does not support the
/// request's method; `allow` lists the methods it does support.
pub fn method_not_allowed(allow: &str) -> (StatusCode, Vec<u8>, HeaderMap) {
    let mut headers = HeaderMap::new();
    if let Ok(value) = http::HeaderValue::from_str(allow) {
        headers.insert(http::header::ALLOW, value);
    }
    (
        StatusCode::METHOD_NOT_ALLOWED,
        body_for(StatusCode::METHOD_NOT_ALLOWED),
        headers,
    )
}

/// `413 Payload Too Large` — the declared `Content-Length` exceeds the
/// configured cap (`SPEC_FULL.md` §7, resolving an Open Question `spec.md`
/// left undecided).
pub fn payload_too_large() -> (StatusCode, Vec<u8>, HeaderMap) {
    (
        StatusCode::PAYLOAD_TOO_LARGE,
        body_for(StatusCode::PAYLOAD_TOO_LARGE),
        HeaderMap::new(),
    )
}

/// `501 Not Implemented` — `Transfer-Encoding: chunked` was requested;
/// chunked decoding is unsupported (`SPEC_FULL.md` §7).
pub fn not_implemented() -> (StatusCode, Vec<u8>, HeaderMap) {
    (
        StatusCode::NOT_IMPLEMENTED,
        body_for(StatusCode::NOT_IMPLEMENTED),
        HeaderMap::new(),
    )
}

/// `505 HTTP Version Not Supported` — the peer's major version is `>= 2`.
pub fn version_not_supported() -> (StatusCode, Vec<u8>, HeaderMap) {
    (
        StatusCode::HTTP_VERSION_NOT_SUPPORTED,
        body_for(StatusCode::HTTP_VERSION_NOT_SUPPORTED),
        HeaderMap::new(),
    )
}
