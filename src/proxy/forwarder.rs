//! Upstream call.
//!
//! One POST per inbound request. The inbound body is handed to the client as
//! a stream, so large or chunked uploads are never held in memory. Redirects
//! are not followed: a redirect would be a second upstream call, and the
//! credential must not travel to a location the resolver never checked.

use std::time::Duration;

use axum::body::Body;
use axum::http::HeaderMap;
use reqwest::redirect::Policy;
use tokio_util::sync::CancellationToken;

use crate::config::TimeoutConfig;
use crate::error::ProxyError;

/// A fully prepared upstream request.
#[derive(Debug)]
pub struct UpstreamRequest {
    pub target: String,
    pub headers: HeaderMap,
    pub body: Body,
}

/// Issues upstream calls. Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
}

impl Forwarder {
    pub fn new(timeouts: &TimeoutConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder().redirect(Policy::none());
        if let Some(secs) = timeouts.connect_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Send the request and wait for the upstream's response headers.
    ///
    /// Resolves to `Cancelled` as soon as `cancel` fires; the in-flight call is dropped.
    pub async fn forward(
        &self,
        request: UpstreamRequest,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, ProxyError> {
        let body = reqwest::Body::wrap_stream(request.body.into_data_stream());
        let call = self
            .client
            .post(&request.target)
            .headers(request.headers)
            .body(body)
            .send();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProxyError::Cancelled),
            result = call => result.map_err(ProxyError::UpstreamUnreachable),
        }
    }
}
