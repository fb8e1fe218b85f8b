//! Request-scoped errors and their HTTP mapping.
//!
//! Every variant terminates its own request before or instead of the upstream
//! response; none touches shared state. Failures after the response status is
//! committed are not represented here: the streamer logs them and truncates.

use axum::http::header::ALLOW;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors that end a proxied request early.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Upstream-target header absent or empty. Carries the configured header name.
    #[error("{0} header required")]
    MissingUpstreamTarget(String),

    /// Upstream host rejected by the host policy.
    #[error("upstream target not allowed: {0}")]
    UpstreamNotAllowed(String),

    /// Method refused under the reject policy.
    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),

    /// No server credential was configured at startup.
    #[error("server credential not configured")]
    MissingCredential,

    /// Network-level failure before upstream response headers arrived.
    #[error("upstream request failed: {0}")]
    UpstreamUnreachable(#[source] reqwest::Error),

    /// The request scope was cancelled before the upstream answered.
    #[error("request cancelled")]
    Cancelled,
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingUpstreamTarget(_) => StatusCode::BAD_REQUEST,
            ProxyError::UpstreamNotAllowed(_) => StatusCode::FORBIDDEN,
            ProxyError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::MissingCredential => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::MissingUpstreamTarget(_) => "missing_upstream_target",
            ProxyError::UpstreamNotAllowed(_) => "upstream_not_allowed",
            ProxyError::MethodNotAllowed(_) => "method_not_allowed",
            ProxyError::MissingCredential => "missing_credential",
            ProxyError::UpstreamUnreachable(_) => "upstream_unreachable",
            ProxyError::Cancelled => "cancelled",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, format!("{}\n", self)).into_response();
        if let ProxyError::MethodNotAllowed(_) = self {
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("POST, OPTIONS"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ProxyError::MissingUpstreamTarget("X-Tinfoil-Enclave-Url".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ProxyError::UpstreamNotAllowed("https://evil.test".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ProxyError::MissingCredential.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ProxyError::Cancelled.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn missing_target_names_the_header() {
        let err = ProxyError::MissingUpstreamTarget("X-Upstream-Url".into());
        assert_eq!(err.to_string(), "X-Upstream-Url header required");
    }

    #[test]
    fn method_not_allowed_advertises_allow() {
        let response = ProxyError::MethodNotAllowed(Method::GET).into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(ALLOW).unwrap(), "POST, OPTIONS");
    }
}
