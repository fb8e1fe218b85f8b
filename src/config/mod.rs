//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → compiled into request-time policies at server construction
//!
//! credential env var
//!     → loader.rs (read once at startup)
//!     → Credential (never re-read)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::{
    CredentialConfig, DeliveryMode, HeadersConfig, ListenerConfig, MethodPolicy,
    ObservabilityConfig, ProxyConfig, StreamingConfig, TimeoutConfig, UpstreamConfig,
};
