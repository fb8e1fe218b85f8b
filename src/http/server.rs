//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router for the configured endpoint paths
//! - Wire up middleware (request ID, tracing)
//! - Bind server to listener, shut down gracefully
//! - Run the per-request pipeline:
//!   preflight → method → upstream → credential → headers → forward → stream

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header::InvalidHeaderValue, Method, Request},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use futures_util::{StreamExt, TryStreamExt};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{request_id::SetRequestIdLayer, trace::TraceLayer};

use crate::config::{ConfigError, MethodPolicy, ProxyConfig, StreamingConfig};
use crate::error::ProxyError;
use crate::http::cors::CorsPolicy;
use crate::http::request::{
    check_method, request_id, MakeRequestUuid, RequestCurator, UpstreamResolver, X_REQUEST_ID,
};
use crate::http::response::ResponseCurator;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::proxy::streamer::BoxError;
use crate::proxy::{Delivery, Forwarder, RequestScope, TransportCaps, UpstreamRequest};
use crate::security::{Credential, EHBP_REQUEST_HEADERS, EHBP_RESPONSE_HEADERS};

/// Errors raised while assembling the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("invalid CORS header list: {0}")]
    Cors(#[from] InvalidHeaderValue),
}

/// Request-time policies, compiled once from the configuration.
struct ProxyState {
    resolver: UpstreamResolver,
    request_headers: RequestCurator,
    response_headers: ResponseCurator,
    cors: CorsPolicy,
    credential: Option<Credential>,
    forwarder: Forwarder,
    method_policy: MethodPolicy,
    streaming: StreamingConfig,
    shutdown: Shutdown,
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<ProxyState>,
}

impl AppState {
    fn from_config(
        config: &ProxyConfig,
        credential: Option<Credential>,
        shutdown: Shutdown,
    ) -> Result<Self, ServerError> {
        let invalid = |e| ConfigError::Validation(vec![e]);
        let resolver = UpstreamResolver::from_config(&config.upstream).map_err(invalid)?;
        let request_headers = RequestCurator::from_config(&config.headers).map_err(invalid)?;
        let response_headers = ResponseCurator::from_config(&config.headers).map_err(invalid)?;

        let mut app_request_headers = vec![resolver.header().clone()];
        app_request_headers.extend(request_headers.side_channel_headers().iter().cloned());
        let cors = CorsPolicy::new(
            &app_request_headers,
            std::slice::from_ref(response_headers.custom_header()),
        )?;

        Ok(Self {
            inner: Arc::new(ProxyState {
                resolver,
                request_headers,
                response_headers,
                cors,
                credential,
                forwarder: Forwarder::new(&config.timeouts)?,
                method_policy: config.upstream.method_policy,
                streaming: config.streaming.clone(),
                shutdown,
            }),
        })
    }
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    shutdown: Shutdown,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// `credential` is resolved by the caller at startup. Without one the
    /// server still runs and answers proxied requests with 500.
    pub fn new(
        config: &ProxyConfig,
        credential: Option<Credential>,
        shutdown: Shutdown,
    ) -> Result<Self, ServerError> {
        if credential.is_none() {
            tracing::warn!(
                env_var = %config.credential.env_var,
                "No server credential configured; proxied requests will fail with 500"
            );
        }
        if config.upstream.allowed_hosts.is_empty() {
            tracing::warn!(
                header = %config.upstream.target_header,
                "No upstream host allowlist; any client-named upstream receives the credential"
            );
        }

        tracing::debug!(
            request = %EHBP_REQUEST_HEADERS,
            response = %EHBP_RESPONSE_HEADERS,
            "Handshake header allowlists"
        );

        let state = AppState::from_config(config, credential, shutdown.clone())?;
        let router = Self::build_router(config, state);
        Ok(Self { router, shutdown })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let mut router = Router::new();
        let mut registered: Vec<&str> = Vec::new();
        for path in &config.upstream.paths {
            if registered.contains(&path.as_str()) {
                continue;
            }
            registered.push(path);
            router = router.route(path, any(proxy_handler));
        }

        router
            .with_state(state)
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id(request.headers()),
                )
            }))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    /// The router, for driving the proxy without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Returns once the shutdown signal fires and open connections finish.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let shutdown = self.shutdown.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Entry point for every request on the proxied paths.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let request_id = request_id(request.headers()).to_string();
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    tracing::info!(
        request_id = %request_id,
        method = %method,
        remote = ?remote,
        "Received request"
    );

    let mut response = if method == Method::OPTIONS {
        state.inner.cors.preflight()
    } else {
        match state.inner.forward(request, &request_id).await {
            Ok(response) => response,
            Err(e) => {
                log_failure(&request_id, &e);
                e.into_response()
            }
        }
    };

    state.inner.cors.apply(response.headers_mut());
    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}

fn log_failure(request_id: &str, error: &ProxyError) {
    match error {
        ProxyError::MissingUpstreamTarget(_)
        | ProxyError::UpstreamNotAllowed(_)
        | ProxyError::MethodNotAllowed(_) => {
            tracing::warn!(request_id = %request_id, error = %error, "Rejected request");
        }
        ProxyError::MissingCredential => {
            tracing::error!(request_id = %request_id, error = %error, "Cannot authenticate upstream");
        }
        ProxyError::UpstreamUnreachable(_) => {
            tracing::error!(request_id = %request_id, error = %error, "Upstream error");
            metrics::record_upstream_failure(error.kind());
        }
        ProxyError::Cancelled => {
            tracing::debug!(request_id = %request_id, "Request cancelled before upstream answered");
        }
    }
}

impl ProxyState {
    async fn forward(&self, request: Request<Body>, request_id: &str) -> Result<Response, ProxyError> {
        let (parts, body) = request.into_parts();

        check_method(self.method_policy, &parts.method)?;
        let target = self.resolver.resolve(&parts.headers, parts.uri.path())?;
        let credential = self.credential.as_ref().ok_or(ProxyError::MissingCredential)?;

        let mut headers = self.request_headers.curate(&parts.headers);
        credential.inject(&mut headers);

        for (name, value) in self.request_headers.side_channel_values(&parts.headers) {
            tracing::info!(request_id = %request_id, header = %name, value, "Side-channel header received");
        }

        let scope = RequestScope::new(&self.shutdown.subscribe(), request_id);
        tracing::debug!(request_id = %request_id, target = %target, "Forwarding upstream");

        let upstream = self
            .forwarder
            .forward(UpstreamRequest { target, headers, body }, scope.token())
            .await?;

        let status = upstream.status();
        let headers = self.response_headers.curate(upstream.headers());
        let delivery = Delivery::select(
            self.streaming.delivery,
            self.streaming.bulk_chunk_bytes,
            TransportCaps::from_version(parts.version),
        );

        tracing::debug!(
            request_id = %request_id,
            status = status.as_u16(),
            mode = delivery.label(),
            "Upstream responded"
        );

        let stream = upstream
            .bytes_stream()
            .map_err(|e| Box::new(e) as BoxError)
            .boxed();

        let mut response = Response::new(delivery.into_body(stream, scope));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}
