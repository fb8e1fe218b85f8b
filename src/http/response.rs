//! Response handling and transformation.
//!
//! # Responsibilities
//! - Pick the upstream response headers the client may see
//! - Add the fixed application response header
//! - Keep framing headers consistent for streamed bodies
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - `Transfer-Encoding` and `Content-Length` never travel together

use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::HeadersConfig;
use crate::config::validation::ValidationError;
use crate::security::{copy_if_present, EHBP_RESPONSE_HEADERS};

/// Builds the header set returned to the client.
#[derive(Debug, Clone)]
pub struct ResponseCurator {
    custom_name: HeaderName,
    custom_value: HeaderValue,
}

impl ResponseCurator {
    pub fn new(custom_name: HeaderName, custom_value: HeaderValue) -> Self {
        Self {
            custom_name,
            custom_value,
        }
    }

    pub fn from_config(config: &HeadersConfig) -> Result<Self, ValidationError> {
        let name = HeaderName::from_bytes(config.response_header_name.as_bytes()).map_err(|_| {
            ValidationError::InvalidHeaderName {
                field: "headers.response_header_name",
                value: config.response_header_name.clone(),
            }
        })?;
        let value = HeaderValue::from_str(&config.response_header_value).map_err(|_| {
            ValidationError::InvalidHeaderValue {
                field: "headers.response_header_value",
                value: config.response_header_value.clone(),
            }
        })?;
        Ok(Self::new(name, value))
    }

    pub fn custom_header(&self) -> &HeaderName {
        &self.custom_name
    }

    /// Headers for the client response, derived from the upstream's.
    pub fn curate(&self, upstream: &HeaderMap) -> HeaderMap {
        let mut headers = HeaderMap::new();
        copy_if_present(&mut headers, upstream, &EHBP_RESPONSE_HEADERS);

        if let Some(content_type) = upstream.get(CONTENT_TYPE).filter(|v| !v.is_empty()) {
            headers.insert(CONTENT_TYPE, content_type.clone());
        }

        headers.insert(self.custom_name.clone(), self.custom_value.clone());

        if let Some(encoding) = upstream.get(TRANSFER_ENCODING).filter(|v| !v.is_empty()) {
            headers.insert(TRANSFER_ENCODING, encoding.clone());
            headers.remove(CONTENT_LENGTH);
        }

        headers
    }
}
