//! Per-request cancellation scope.

use tokio_util::sync::{CancellationToken, DropGuard};

/// Cancellation scope shared by the upstream call and the body copy of one request.
///
/// The token is a child of the server's shutdown token, so shutdown reaches
/// every request. It is also cancelled when the scope is dropped: the handler
/// future is dropped when the client goes away before the response, and the
/// response body (which owns the scope afterwards) is dropped when the client
/// goes away mid-stream.
#[derive(Debug)]
pub struct RequestScope {
    token: CancellationToken,
    request_id: String,
    _guard: DropGuard,
}

impl RequestScope {
    pub fn new(parent: &CancellationToken, request_id: impl Into<String>) -> Self {
        let token = parent.child_token();
        let guard = token.clone().drop_guard();
        Self {
            token,
            request_id: request_id.into(),
            _guard: guard,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}
