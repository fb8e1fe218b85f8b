//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4) for log correlation
//! - Apply the method policy
//! - Resolve the upstream target from the designated header
//! - Curate the header set sent upstream
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing, never forwarded upstream
//! - Target is `base + path`, concatenated literally
//! - Headers are built from scratch; nothing crosses unless named

use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::config::{HeadersConfig, MethodPolicy, UpstreamConfig};
use crate::config::validation::ValidationError;
use crate::error::ProxyError;
use crate::security::{copy_if_present, UpstreamPolicy, EHBP_REQUEST_HEADERS};

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Request ID generator for tower-http's request-id layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Read the correlation ID assigned by the request-id layer.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Apply the method policy to a non-preflight request.
pub fn check_method(policy: MethodPolicy, method: &Method) -> Result<(), ProxyError> {
    match policy {
        MethodPolicy::Reject if method != Method::POST => {
            Err(ProxyError::MethodNotAllowed(method.clone()))
        }
        _ => Ok(()),
    }
}

/// Finds the upstream target for a request.
#[derive(Debug, Clone)]
pub struct UpstreamResolver {
    header: HeaderName,
    /// Header name as configured, for client-facing messages.
    label: String,
    policy: UpstreamPolicy,
}

impl UpstreamResolver {
    pub fn new(header: HeaderName, policy: UpstreamPolicy) -> Self {
        let label = header.as_str().to_string();
        Self {
            header,
            label,
            policy,
        }
    }

    pub fn from_config(config: &UpstreamConfig) -> Result<Self, ValidationError> {
        let header = HeaderName::from_bytes(config.target_header.as_bytes()).map_err(|_| {
            ValidationError::InvalidHeaderName {
                field: "upstream.target_header",
                value: config.target_header.clone(),
            }
        })?;
        Ok(Self {
            header,
            label: config.target_header.clone(),
            policy: UpstreamPolicy::from_hosts(&config.allowed_hosts),
        })
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    /// Concatenate the header value with `path`, then apply the host policy.
    pub fn resolve(&self, headers: &HeaderMap, path: &str) -> Result<String, ProxyError> {
        let base = headers
            .get(&self.header)
            .map(|v| String::from_utf8_lossy(v.as_bytes()))
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ProxyError::MissingUpstreamTarget(self.label.clone()))?;

        let target = format!("{}{}", base, path);
        if !self.policy.permits(&target) {
            return Err(ProxyError::UpstreamNotAllowed(target));
        }
        Ok(target)
    }
}

/// Builds the header set sent upstream.
#[derive(Debug, Clone)]
pub struct RequestCurator {
    content_type: HeaderValue,
    side_channel: Vec<HeaderName>,
}

impl RequestCurator {
    pub fn new(content_type: HeaderValue, side_channel: Vec<HeaderName>) -> Self {
        Self {
            content_type,
            side_channel,
        }
    }

    pub fn from_config(config: &HeadersConfig) -> Result<Self, ValidationError> {
        let content_type = HeaderValue::from_str(&config.forced_content_type).map_err(|_| {
            ValidationError::InvalidHeaderValue {
                field: "headers.forced_content_type",
                value: config.forced_content_type.clone(),
            }
        })?;
        let side_channel = config
            .side_channel
            .iter()
            .map(|name| {
                HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                    ValidationError::InvalidHeaderName {
                        field: "headers.side_channel",
                        value: name.clone(),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(content_type, side_channel))
    }

    pub fn side_channel_headers(&self) -> &[HeaderName] {
        &self.side_channel
    }

    /// Headers for the upstream request, minus the credential.
    pub fn curate(&self, inbound: &HeaderMap) -> HeaderMap {
        let mut outbound = HeaderMap::new();
        outbound.insert(CONTENT_TYPE, self.content_type.clone());
        if let Some(accept) = inbound.get(ACCEPT).filter(|v| !v.is_empty()) {
            outbound.insert(ACCEPT, accept.clone());
        }
        copy_if_present(&mut outbound, inbound, &EHBP_REQUEST_HEADERS);
        outbound
    }

    /// Side-channel values present on the inbound request. Read locally only.
    pub fn side_channel_values<'a>(
        &'a self,
        inbound: &'a HeaderMap,
    ) -> impl Iterator<Item = (&'a HeaderName, &'a str)> + 'a {
        self.side_channel.iter().filter_map(move |name| {
            inbound
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(|v| (name, v))
        })
    }
}
