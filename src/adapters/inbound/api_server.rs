//! Geo Lookup API Server
//!
//! HTTP surface of the service:
//! - `GET /v1/metadata` describes the opened databases
//! - `GET /v1/geo/:kind/:ip` answers one lookup
//!
//! Successful responses are the JSON record with no extra framing. Errors
//! are a bare status code with an empty body.

use crate::application::{DispatchError, LookupService};
use crate::infrastructure::access_log::{AccessEntry, AccessLogger};
use crate::infrastructure::shutdown::ShutdownController;
use axum::{
    body::HttpBody,
    extract::{ConnectInfo, Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ApiState {
    pub service: LookupService,
    pub access_log: AccessLogger,
    pub shutdown: ShutdownController,
}

impl ApiState {
    pub fn new(service: LookupService, access_log: AccessLogger, shutdown: ShutdownController) -> Self {
        Self {
            service,
            access_log,
            shutdown,
        }
    }
}

/// Build the router with all routes and layers.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/v1/metadata", get(metadata_handler))
        .route("/v1/geo/:kind/:ip", get(geo_handler))
        .layer(middleware::from_fn_with_state(state.clone(), access_log_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// HTTP server for geo lookups.
pub struct ApiServer {
    listen_addr: String,
    state: ApiState,
}

impl ApiServer {
    pub fn new(listen_addr: String, state: ApiState) -> Self {
        Self { listen_addr, state }
    }

    /// Bind and serve until the shutdown controller fires, then give open
    /// requests up to `drain_timeout` to complete.
    ///
    /// Binding failures are returned before anything is served. Returns
    /// `false` if the timeout cut requests off.
    pub async fn run(&self, drain_timeout: Duration) -> anyhow::Result<bool> {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        tracing::info!("geo API listening on {}", listener.local_addr()?);
        self.serve_until_drained(listener, drain_timeout).await
    }

    /// Serve on `listener`; after shutdown, wait at most `drain_timeout`
    /// for the graceful shutdown to finish.
    pub async fn serve_until_drained(
        &self,
        listener: TcpListener,
        drain_timeout: Duration,
    ) -> anyhow::Result<bool> {
        let serve = self.serve(listener);
        tokio::pin!(serve);

        tokio::select! {
            result = &mut serve => return result.map(|_| true),
            _ = self.state.shutdown.wait_for_shutdown() => {}
        }

        match tokio::time::timeout(drain_timeout, &mut serve).await {
            Ok(result) => result.map(|_| true),
            Err(_) => {
                tracing::warn!(
                    "drain timeout: {} requests still in flight",
                    self.state.shutdown.in_flight()
                );
                Ok(false)
            }
        }
    }

    /// Serve on an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        let app = build_router(self.state.clone());
        let shutdown = self.state.shutdown.clone();

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { shutdown.wait_for_shutdown().await })
        .await?;

        tracing::info!("geo API stopped");
        Ok(())
    }
}

/// Map a dispatch failure to its HTTP status.
pub fn status_for(err: &DispatchError) -> StatusCode {
    match err {
        DispatchError::UnknownKind(_) => StatusCode::NOT_FOUND,
        DispatchError::KindNotServed(_) => StatusCode::NOT_IMPLEMENTED,
        DispatchError::BadAddress(_) => StatusCode::BAD_REQUEST,
        DispatchError::Backend(_) | DispatchError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            tracing::warn!("lookup failed: {}", self);
        } else {
            tracing::debug!("lookup rejected: {}", self);
        }
        status.into_response()
    }
}

fn json_response(result: Result<Vec<u8>, DispatchError>) -> Response {
    match result {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => e.into_response(),
    }
}

// Handler functions

async fn metadata_handler(State(state): State<ApiState>) -> Response {
    json_response(LookupService::render(&state.service.metadata()))
}

async fn geo_handler(
    State(state): State<ApiState>,
    Path((kind, ip)): Path<(String, String)>,
) -> Response {
    json_response(state.service.handle(&kind, &ip))
}

/// Record every request in the access log and count it as in flight.
async fn access_log_middleware(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Response {
    let _guard = state.shutdown.request_guard();

    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let method = request.method().to_string();
    let uri = request.uri().to_string();
    let version = format!("{:?}", request.version());
    let time = OffsetDateTime::now_utc();

    let response = next.run(request).await;

    state.access_log.record(&AccessEntry {
        remote,
        time,
        method,
        uri,
        version,
        status: response.status().as_u16(),
        size: response.body().size_hint().exact().unwrap_or(0),
    });

    response
}
