//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Resolve credential → Build server → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Cancel root token → Stop accepting → In-flight copies end → Exit
//!
//!     Every request scope is a child of the root token, so shutdown does not
//!     wait for streams to finish: pending upstream calls answer 503 and
//!     response bodies already being relayed are truncated. The server then
//!     waits only for those connections to close.
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
