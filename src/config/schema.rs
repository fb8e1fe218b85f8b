//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream resolution and endpoint settings.
    pub upstream: UpstreamConfig,

    /// Where the server credential comes from.
    pub credential: CredentialConfig,

    /// Application headers synthesized or read by the proxy.
    pub headers: HeadersConfig,

    /// Response delivery settings.
    pub streaming: StreamingConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// How non-POST, non-OPTIONS requests are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MethodPolicy {
    /// Re-issue the request upstream as POST.
    #[default]
    Coerce,
    /// Answer 405 without contacting the upstream.
    Reject,
}

/// Upstream resolution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Header carrying the per-request upstream base address.
    pub target_header: String,

    /// Paths served by the proxy handler.
    pub paths: Vec<String>,

    /// Hosts the proxy may forward to. Empty means any host is accepted.
    pub allowed_hosts: Vec<String>,

    /// Treatment of methods other than POST and OPTIONS.
    pub method_policy: MethodPolicy,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            target_header: "X-Tinfoil-Enclave-Url".to_string(),
            paths: vec!["/v1/chat/completions".to_string()],
            allowed_hosts: Vec::new(),
            method_policy: MethodPolicy::Coerce,
        }
    }
}

/// Server credential source.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CredentialConfig {
    /// Environment variable read once at startup.
    pub env_var: String,

    /// Inline credential, used when the environment variable is unset.
    pub api_key: Option<String>,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            env_var: "TINFOIL_API_KEY".to_string(),
            api_key: None,
        }
    }
}

impl std::fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("env_var", &self.env_var)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Application header configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeadersConfig {
    /// Content type always sent upstream.
    pub forced_content_type: String,

    /// Headers read for logging only and never forwarded upstream.
    pub side_channel: Vec<String>,

    /// Name of the fixed header added to every proxied response.
    pub response_header_name: String,

    /// Value of the fixed response header.
    pub response_header_value: String,
}

impl Default for HeadersConfig {
    fn default() -> Self {
        Self {
            forced_content_type: "application/json".to_string(),
            side_channel: vec!["X-Client-Context".to_string()],
            response_header_name: "X-Proxied-By".to_string(),
            response_header_value: "ehbp-proxy".to_string(),
        }
    }
}

/// Response delivery mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Pick by client transport capability.
    #[default]
    Auto,
    /// Always emit each upstream chunk immediately.
    Flush,
    /// Always coalesce chunks before emitting.
    Bulk,
}

/// Streaming configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Delivery strategy selection.
    pub delivery: DeliveryMode,

    /// Buffer size for bulk copy in bytes.
    pub bulk_chunk_bytes: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            delivery: DeliveryMode::Auto,
            bulk_chunk_bytes: 32 * 1024,
        }
    }
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds. Unset means transport default.
    pub connect_secs: Option<u64>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
