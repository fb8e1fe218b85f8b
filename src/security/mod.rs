//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → upstream.rs (may the credential go to this target?)
//!     → credential.rs (replace client authorization with the server credential)
//!     → headers.rs (allowlisted handshake headers cross, everything else stays)
//! ```
//!
//! # Design Decisions
//! - The client never sees or supplies the server credential
//! - Pass-through is allowlist-driven, never denylist-driven
//! - No trust in client input beyond what the upstream policy grants

pub mod credential;
pub mod headers;
pub mod upstream;

pub use credential::Credential;
pub use headers::{copy_if_present, HeaderAllowlist, EHBP_REQUEST_HEADERS, EHBP_RESPONSE_HEADERS};
pub use upstream::UpstreamPolicy;
