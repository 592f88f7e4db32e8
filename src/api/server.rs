//! HTTP gateway for the review UI
//!
//! Maps browser requests onto broker operations. Presentation is external:
//! an optional static directory is served under `/review`.

use crate::error::{InterludeError, Result};
use crate::events::Event;
use crate::session::SessionBroker;
use crate::types::{SessionId, SessionStatus};
use axum::{
    extract::{Query, State},
    response::{
        sse::{Event as SseEvent, KeepAlive},
        Sse,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, net::SocketAddr, path::PathBuf, time::Duration};
use tokio::net::TcpListener;
use tokio_stream::{wrappers::BroadcastStream, StreamExt as _};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{debug, info};

/// Number of consecutive ports tried when the configured one is taken
const PORT_FALLBACK_RANGE: u16 = 10;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Server address
    pub addr: SocketAddr,
    /// Directory holding the review page assets
    pub ui_dir: Option<PathBuf>,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            addr: ([127, 0, 0, 1], 3457).into(),
            ui_dir: None,
        }
    }
}

/// API server state
#[derive(Clone)]
pub struct AppState {
    pub broker: SessionBroker,
}

/// API server
pub struct ApiServer {
    config: ApiServerConfig,
    broker: SessionBroker,
}

impl ApiServer {
    /// Create new API server
    pub fn new(config: ApiServerConfig, broker: SessionBroker) -> Self {
        Self { config, broker }
    }

    /// Build router
    pub fn router(&self) -> Router {
        build_router(
            AppState {
                broker: self.broker.clone(),
            },
            self.config.ui_dir.clone(),
        )
    }

    /// Bind the listener
    ///
    /// Tries the configured address first, then the next few ports if it is
    /// in use (e.g. when several agent sessions run side by side).
    pub async fn bind(&self) -> Result<TcpListener> {
        match TcpListener::bind(self.config.addr).await {
            Ok(listener) => return Ok(listener),
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                debug!(
                    "Port {} in use, trying alternative ports...",
                    self.config.addr.port()
                );
            }
            Err(e) => return Err(e.into()),
        }

        let base_port = self.config.addr.port();
        for offset in 1..=PORT_FALLBACK_RANGE {
            let alt_addr = SocketAddr::new(self.config.addr.ip(), base_port.saturating_add(offset));
            match TcpListener::bind(alt_addr).await {
                Ok(listener) => return Ok(listener),
                Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(InterludeError::Other(format!(
            "All ports ({}-{}) are in use; review gateway unavailable",
            base_port,
            base_port.saturating_add(PORT_FALLBACK_RANGE)
        )))
    }

    /// Serve on an already-bound listener until the process exits
    pub async fn serve_on(self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        info!("Review gateway listening on http://{}", addr);

        // Keeps idle SSE clients able to detect a dead gateway
        let events = self.broker.events().clone();
        let instance_id = std::process::id().to_string();
        let heartbeat = tokio::spawn(async move {
            let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
            loop {
                interval.tick().await;
                events.publish(Event::heartbeat(instance_id.clone()));
            }
        });

        let result = axum::serve(listener, self.router()).await;
        heartbeat.abort();
        result?;
        Ok(())
    }

    /// Bind and serve
    pub async fn serve(self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve_on(listener).await
    }
}

/// Build the gateway router around a broker
pub fn build_router(state: AppState, ui_dir: Option<PathBuf>) -> Router {
    let mut router = Router::new()
        .route("/api/session-info", get(session_info_handler))
        .route("/api/submit", post(submit_handler))
        .route("/api/reprocess", post(reprocess_handler))
        .route("/events", get(events_handler))
        .route("/health", get(health_handler));

    if let Some(dir) = ui_dir {
        router = router.nest_service("/review", ServeDir::new(dir));
    }

    router
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    session: String,
}

/// Session info response; countdown fields are advisory
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfoResponse {
    pub current_content: String,
    pub status: SessionStatus,
    /// Epoch milliseconds
    pub created_at: i64,
    pub timeout_ms: u64,
}

async fn session_info_handler(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<SessionInfoResponse>> {
    let id = SessionId::parse(&query.session)?;
    let snapshot = state.broker.snapshot(id).await?;

    Ok(Json(SessionInfoResponse {
        current_content: snapshot.current_content,
        status: snapshot.status,
        created_at: snapshot.created_at.timestamp_millis(),
        timeout_ms: snapshot.timeout.as_millis() as u64,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest {
    session_id: String,
    content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub success: bool,
}

async fn submit_handler(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>> {
    let id = SessionId::parse(&req.session_id)?;
    state.broker.submit(id, req.content).await?;
    Ok(Json(SubmitResponse { success: true }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReprocessRequest {
    session_id: String,
    current_prompt: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReprocessResponse {
    pub current_content: String,
}

async fn reprocess_handler(
    State(state): State<AppState>,
    Json(req): Json<ReprocessRequest>,
) -> Result<Json<ReprocessResponse>> {
    let id = SessionId::parse(&req.session_id)?;
    let current_content = state.broker.reprocess(id, req.current_prompt).await?;
    Ok(Json(ReprocessResponse { current_content }))
}

/// SSE stream of session lifecycle events
async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = std::result::Result<SseEvent, Infallible>>> {
    debug!("New SSE client connected");

    let rx = state.broker.events().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let data = serde_json::to_string(&event).ok()?;
            Some(Ok(SseEvent::default().data(data).id(event.id)))
        }
        Err(_) => None, // Skip lagged messages
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub pending_sessions: usize,
    pub subscribers: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        pending_sessions: state.broker.pending_count().await,
        subscribers: state.broker.events().subscriber_count(),
    })
}
