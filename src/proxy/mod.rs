//! Forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! curated request
//!     → forwarder.rs (single POST, inbound body streamed upstream)
//!     → upstream response headers
//!     → streamer.rs (flush-per-write or bulk copy to the client)
//!
//! scope.rs: one cancellation token per request, shared by both steps
//! ```
//!
//! # Design Decisions
//! - Exactly one upstream call per request; no retries, no redirects
//! - Bodies are streamed in both directions, never materialized
//! - Client disconnect and server shutdown both cancel the request scope

pub mod forwarder;
pub mod scope;
pub mod streamer;

pub use forwarder::{Forwarder, UpstreamRequest};
pub use scope::RequestScope;
pub use streamer::{Delivery, TransportCaps, UpstreamBody};
