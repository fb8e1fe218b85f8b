//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing span)
//!     → cors.rs (OPTIONS answered here; CORS stamped on everything else)
//!     → request.rs (method policy, upstream target, outbound headers)
//!     → [proxy::forwarder sends upstream]
//!     → response.rs (client-visible headers)
//!     → [proxy::streamer relays the body]
//! ```

pub mod cors;
pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{HttpServer, ServerError};
