//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate header names and values before they reach the hot path
//! - Validate value ranges (buffer sizes > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue};
use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: invalid header name {value:?}")]
    InvalidHeaderName { field: &'static str, value: String },

    #[error("{field}: invalid header value {value:?}")]
    InvalidHeaderValue { field: &'static str, value: String },

    #[error("upstream.paths: {0:?} must start with '/'")]
    InvalidPath(String),

    #[error("upstream.paths: {0:?} listed more than once")]
    DuplicatePath(String),

    #[error("upstream.paths: at least one path is required")]
    NoPaths,

    #[error("upstream.allowed_hosts: empty entry")]
    EmptyHost,

    #[error("streaming.bulk_chunk_bytes must be greater than zero")]
    ZeroChunkSize,

    #[error("timeouts.connect_secs must be greater than zero when set")]
    ZeroConnectTimeout,
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    check_header_name(&mut errors, "upstream.target_header", &config.upstream.target_header);
    for name in &config.headers.side_channel {
        check_header_name(&mut errors, "headers.side_channel", name);
    }
    check_header_name(
        &mut errors,
        "headers.response_header_name",
        &config.headers.response_header_name,
    );
    check_header_value(
        &mut errors,
        "headers.response_header_value",
        &config.headers.response_header_value,
    );
    check_header_value(
        &mut errors,
        "headers.forced_content_type",
        &config.headers.forced_content_type,
    );

    if config.upstream.paths.is_empty() {
        errors.push(ValidationError::NoPaths);
    }
    for (i, path) in config.upstream.paths.iter().enumerate() {
        if !path.starts_with('/') {
            errors.push(ValidationError::InvalidPath(path.clone()));
        } else if config.upstream.paths[..i].contains(path) {
            errors.push(ValidationError::DuplicatePath(path.clone()));
        }
    }

    if config.upstream.allowed_hosts.iter().any(|h| h.trim().is_empty()) {
        errors.push(ValidationError::EmptyHost);
    }

    if config.streaming.bulk_chunk_bytes == 0 {
        errors.push(ValidationError::ZeroChunkSize);
    }

    if config.timeouts.connect_secs == Some(0) {
        errors.push(ValidationError::ZeroConnectTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_header_name(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if HeaderName::from_bytes(value.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidHeaderName {
            field,
            value: value.to_string(),
        });
    }
}

fn check_header_value(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if HeaderValue::from_str(value).is_err() {
        errors.push(ValidationError::InvalidHeaderValue {
            field,
            value: value.to_string(),
        });
    }
}
