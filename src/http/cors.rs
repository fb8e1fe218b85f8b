//! CORS preflight responder and response stamping.
//!
//! The same four headers go out on preflight answers and on every other
//! response of the proxied endpoint, errors included.

use axum::body::Body;
use axum::http::header::{
    InvalidHeaderValue, ACCEPT, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, AUTHORIZATION, CONTENT_TYPE,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;

use crate::security::{EHBP_REQUEST_HEADERS, EHBP_RESPONSE_HEADERS};

const ALLOWED_METHODS: &str = "POST, OPTIONS";

/// Pre-rendered CORS header values.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allow_headers: HeaderValue,
    expose_headers: HeaderValue,
}

impl CorsPolicy {
    /// Build the policy from the application headers on each side.
    ///
    /// `request_headers` are added to the handshake allowlist plus
    /// `Accept`, `Authorization` and `Content-Type`; `response_headers` are
    /// added to the response handshake allowlist.
    pub fn new(
        request_headers: &[HeaderName],
        response_headers: &[HeaderName],
    ) -> Result<Self, InvalidHeaderValue> {
        let allow = [ACCEPT, AUTHORIZATION, CONTENT_TYPE]
            .into_iter()
            .chain(EHBP_REQUEST_HEADERS.names())
            .chain(request_headers.iter().cloned());
        let expose = EHBP_RESPONSE_HEADERS
            .names()
            .chain(response_headers.iter().cloned());

        Ok(Self {
            allow_headers: join(allow)?,
            expose_headers: join(expose)?,
        })
    }

    /// Stamp the CORS headers onto a response.
    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
        headers.insert(ACCESS_CONTROL_EXPOSE_HEADERS, self.expose_headers.clone());
    }

    /// Answer a preflight request: 204, empty body, CORS headers.
    pub fn preflight(&self) -> Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        self.apply(response.headers_mut());
        response
    }
}

fn join(names: impl Iterator<Item = HeaderName>) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut seen: Vec<HeaderName> = Vec::new();
    for name in names {
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    let joined = seen
        .iter()
        .map(HeaderName::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    HeaderValue::from_str(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CorsPolicy {
        CorsPolicy::new(
            &[
                HeaderName::from_static("x-tinfoil-enclave-url"),
                HeaderName::from_static("x-client-context"),
            ],
            &[HeaderName::from_static("x-proxied-by")],
        )
        .unwrap()
    }

    #[test]
    fn allow_headers_cover_handshake_and_app_headers() {
        let policy = policy();
        assert_eq!(
            policy.allow_headers,
            "accept, authorization, content-type, ehbp-encapsulated-key, x-tinfoil-enclave-url, x-client-context"
        );
        assert_eq!(
            policy.expose_headers,
            "ehbp-response-nonce, ehbp-fallback, x-proxied-by"
        );
    }

    #[test]
    fn duplicates_are_listed_once() {
        let policy = CorsPolicy::new(&[ACCEPT, HeaderName::from_static("ehbp-encapsulated-key")], &[])
            .unwrap();
        assert_eq!(
            policy.allow_headers,
            "accept, authorization, content-type, ehbp-encapsulated-key"
        );
    }

    #[test]
    fn preflight_is_empty_204_with_cors() {
        let response = policy().preflight();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let headers = response.headers();
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_METHODS).unwrap(), "POST, OPTIONS");
        assert!(headers.contains_key(ACCESS_CONTROL_ALLOW_HEADERS));
        assert!(headers.contains_key(ACCESS_CONTROL_EXPOSE_HEADERS));
    }

    #[test]
    fn apply_overwrites_upstream_cors() {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("https://upstream.example"),
        );
        policy().apply(&mut headers);
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
    }
}
