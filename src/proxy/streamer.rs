//! Response body delivery.
//!
//! # Strategies
//! - `FlushPerWrite`: every upstream chunk becomes its own body frame, so
//!   token-by-token completions reach the client as soon as they exist
//! - `BulkCopy`: chunks are coalesced up to a fixed buffer size; for clients
//!   whose transport cannot take incremental writes
//!
//! Both stop at the first upstream error or when the request scope is
//! cancelled. By then the status line is committed, so the failure is logged
//! and the client sees a truncated body.

use std::convert::Infallible;

use axum::body::Body;
use axum::http::Version;
use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, BoxStream, Stream, StreamExt};

use crate::config::DeliveryMode;
use crate::observability::metrics;
use crate::proxy::scope::RequestScope;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Upstream body as a fallible byte stream.
pub type UpstreamBody = BoxStream<'static, Result<Bytes, BoxError>>;

/// What the client connection can do with partial bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportCaps {
    pub can_flush: bool,
}

impl TransportCaps {
    /// HTTP/1.1 (chunked) and HTTP/2 (DATA frames) deliver partial bodies.
    pub fn from_version(version: Version) -> Self {
        let can_flush = !matches!(version, Version::HTTP_09 | Version::HTTP_10);
        Self { can_flush }
    }
}

/// A body delivery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    FlushPerWrite,
    BulkCopy { chunk_bytes: usize },
}

impl Delivery {
    /// Pick a strategy for the configured mode and the client's transport.
    pub fn select(mode: DeliveryMode, chunk_bytes: usize, transport: TransportCaps) -> Self {
        match mode {
            DeliveryMode::Flush => Delivery::FlushPerWrite,
            DeliveryMode::Bulk => Delivery::BulkCopy { chunk_bytes },
            DeliveryMode::Auto if transport.can_flush => Delivery::FlushPerWrite,
            DeliveryMode::Auto => Delivery::BulkCopy { chunk_bytes },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Delivery::FlushPerWrite => "flush",
            Delivery::BulkCopy { .. } => "bulk",
        }
    }

    /// Turn the upstream body into the client response body.
    ///
    /// The scope moves into the body: dropping the body cancels the request.
    pub fn into_body(self, upstream: UpstreamBody, scope: RequestScope) -> Body {
        let copy = BodyCopy {
            upstream,
            scope,
            mode: self.label(),
            delivered: 0,
            buffer: BytesMut::new(),
        };
        match self {
            Delivery::FlushPerWrite => Body::from_stream(flush_per_write(copy)),
            Delivery::BulkCopy { chunk_bytes } => Body::from_stream(bulk_copy(copy, chunk_bytes)),
        }
    }
}

struct BodyCopy {
    upstream: UpstreamBody,
    scope: RequestScope,
    mode: &'static str,
    delivered: u64,
    buffer: BytesMut,
}

impl BodyCopy {
    /// Next upstream chunk, or `None` once the copy is over for any reason.
    async fn next_chunk(&mut self) -> Option<Bytes> {
        let next = tokio::select! {
            biased;
            _ = self.scope.token().cancelled() => {
                tracing::debug!(
                    request_id = %self.scope.request_id(),
                    delivered = self.delivered,
                    "Request cancelled, stopping body copy"
                );
                return None;
            }
            next = self.upstream.next() => next,
        };

        match next {
            Some(Ok(chunk)) => Some(chunk),
            Some(Err(e)) => {
                tracing::warn!(
                    request_id = %self.scope.request_id(),
                    delivered = self.delivered,
                    error = %e,
                    "Stream copy failed"
                );
                metrics::record_upstream_failure("stream_copy");
                None
            }
            None => {
                tracing::debug!(
                    request_id = %self.scope.request_id(),
                    delivered = self.delivered,
                    mode = self.mode,
                    "Upstream body relayed"
                );
                None
            }
        }
    }

    fn take_buffer(&mut self) -> Bytes {
        let out = self.buffer.split().freeze();
        self.delivered += out.len() as u64;
        out
    }
}

impl Drop for BodyCopy {
    fn drop(&mut self) {
        metrics::record_stream_bytes(self.mode, self.delivered);
    }
}

fn flush_per_write(copy: BodyCopy) -> impl Stream<Item = Result<Bytes, Infallible>> {
    stream::unfold(copy, |mut copy| async move {
        loop {
            let chunk = copy.next_chunk().await?;
            if chunk.is_empty() {
                continue;
            }
            copy.delivered += chunk.len() as u64;
            return Some((Ok(chunk), copy));
        }
    })
}

fn bulk_copy(copy: BodyCopy, chunk_bytes: usize) -> impl Stream<Item = Result<Bytes, Infallible>> {
    stream::unfold(Some(copy), move |copy| async move {
        let mut copy = copy?;
        while let Some(chunk) = copy.next_chunk().await {
            copy.buffer.extend_from_slice(&chunk);
            if copy.buffer.len() >= chunk_bytes {
                let out = copy.take_buffer();
                return Some((Ok(out), Some(copy)));
            }
        }
        if copy.buffer.is_empty() {
            return None;
        }
        let out = copy.take_buffer();
        Some((Ok(out), None))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn upstream(chunks: &[&'static str]) -> UpstreamBody {
        let items: Vec<Result<Bytes, BoxError>> = chunks
            .iter()
            .map(|c| Ok(Bytes::from_static(c.as_bytes())))
            .collect();
        stream::iter(items).boxed()
    }

    async fn frames(body: Body) -> Vec<Bytes> {
        body.into_data_stream()
            .map(|frame| frame.expect("body frame"))
            .collect()
            .await
    }

    fn scope() -> RequestScope {
        RequestScope::new(&CancellationToken::new(), "test")
    }

    const TOKENS: &[&str] = &["data: {\"a\"", ":1}\n\n", "", "data: [DONE]\n\n"];

    #[test]
    fn auto_selects_by_transport() {
        let h11 = TransportCaps::from_version(Version::HTTP_11);
        let h10 = TransportCaps::from_version(Version::HTTP_10);
        let h2 = TransportCaps::from_version(Version::HTTP_2);
        assert_eq!(Delivery::select(DeliveryMode::Auto, 8, h11), Delivery::FlushPerWrite);
        assert_eq!(Delivery::select(DeliveryMode::Auto, 8, h2), Delivery::FlushPerWrite);
        assert_eq!(
            Delivery::select(DeliveryMode::Auto, 8, h10),
            Delivery::BulkCopy { chunk_bytes: 8 }
        );
        assert_eq!(
            Delivery::select(DeliveryMode::Bulk, 8, h11),
            Delivery::BulkCopy { chunk_bytes: 8 }
        );
        assert_eq!(Delivery::select(DeliveryMode::Flush, 8, h10), Delivery::FlushPerWrite);
    }

    #[tokio::test]
    async fn flush_per_write_keeps_chunk_boundaries() {
        let body = Delivery::FlushPerWrite.into_body(upstream(TOKENS), scope());
        let frames = frames(body).await;
        assert_eq!(
            frames,
            vec![
                Bytes::from_static(b"data: {\"a\""),
                Bytes::from_static(b":1}\n\n"),
                Bytes::from_static(b"data: [DONE]\n\n"),
            ]
        );
    }

    #[tokio::test]
    async fn bulk_copy_coalesces() {
        let body = Delivery::BulkCopy { chunk_bytes: 1024 }.into_body(upstream(TOKENS), scope());
        let frames = frames(body).await;
        assert_eq!(frames.len(), 1);
    }

    #[tokio::test]
    async fn both_strategies_deliver_identical_bytes() {
        let expected: Vec<u8> = TOKENS.concat().into_bytes();
        for delivery in [
            Delivery::FlushPerWrite,
            Delivery::BulkCopy { chunk_bytes: 4 },
            Delivery::BulkCopy { chunk_bytes: 1 << 16 },
        ] {
            let body = delivery.into_body(upstream(TOKENS), scope());
            let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
            assert_eq!(bytes.as_ref(), expected.as_slice(), "{:?}", delivery);
        }
    }

    #[tokio::test]
    async fn upstream_error_truncates_body() {
        for delivery in [Delivery::FlushPerWrite, Delivery::BulkCopy { chunk_bytes: 1024 }] {
            let items: Vec<Result<Bytes, BoxError>> = vec![
                Ok(Bytes::from_static(b"partial")),
                Err("connection reset".into()),
                Ok(Bytes::from_static(b"never seen")),
            ];
            let body = delivery.into_body(stream::iter(items).boxed(), scope());
            let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
            assert_eq!(bytes.as_ref(), b"partial");
        }
    }

    #[tokio::test]
    async fn cancellation_stops_copy() {
        let root = CancellationToken::new();
        let upstream: UpstreamBody = stream::iter(vec![Ok(Bytes::from_static(b"first"))])
            .chain(stream::pending())
            .boxed();

        let body = Delivery::FlushPerWrite.into_body(upstream, RequestScope::new(&root, "test"));
        let mut data = body.into_data_stream();
        assert_eq!(data.next().await.unwrap().unwrap(), Bytes::from_static(b"first"));

        root.cancel();
        let next = tokio::time::timeout(Duration::from_secs(5), data.next())
            .await
            .expect("copy should stop after cancellation");
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn dropping_body_cancels_scope() {
        let scope = scope();
        let token = scope.token().clone();
        let body = Delivery::FlushPerWrite.into_body(upstream(TOKENS), scope);
        drop(body);
        assert!(token.is_cancelled());
    }
}
