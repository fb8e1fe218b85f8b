//! Shutdown coordination for the proxy.

use tokio_util::sync::CancellationToken;

/// Coordinator for graceful shutdown.
///
/// Holds the root cancellation token. The server stops accepting when it
/// fires, and every request scope is a child of it, so in-flight streams
/// are cut off rather than drained.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }
}
