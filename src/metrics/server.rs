//! HTTP exporter serving the pipeline metrics.
//!
//! Routes:
//! - `/metrics` Prometheus text exposition
//! - `/health` 200 while capture is usable, 503 once the loop has stopped
//! - `/status` one-line human summary of the session

use crate::metrics::{MetricsRegistry, MetricsSnapshot};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

/// Errors from the exporter.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind metrics listener: {0}")]
    Bind(#[from] std::io::Error),

    #[error("metrics server error: {0}")]
    Server(String),
}

/// Where the exporter listens.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    pub bind_addr: SocketAddr,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self::with_port(9090)
    }
}

impl MetricsServerConfig {
    /// Loopback-only listener on `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], port)),
        }
    }
}

/// Registry plus the most recent snapshot, shared with the handlers.
pub struct MetricsState {
    registry: MetricsRegistry,
    latest: MetricsSnapshot,
    stopped: bool,
}

impl MetricsState {
    /// Publishes a new snapshot.
    pub fn update(&mut self, snapshot: &MetricsSnapshot) {
        self.registry.update(snapshot);
        // A loop that ran and is no longer running has stopped.
        self.stopped = snapshot.ticks > 0 && !snapshot.loop_running;
        self.latest = snapshot.clone();
    }

    fn summary(&self) -> String {
        let s = &self.latest;
        format!(
            "loop={} filter={} intensity={:.2} presented={} skipped={} exports={} failures={} recording={}",
            if s.loop_running { "running" } else if self.stopped { "stopped" } else { "idle" },
            if s.filter_enabled { "on" } else { "off" },
            s.intensity,
            s.frames_presented,
            s.frames_skipped,
            s.exports,
            s.export_failures,
            s.recording,
        )
    }
}

pub type SharedMetricsState = Arc<RwLock<MetricsState>>;

/// Prometheus exporter for a single session.
pub struct MetricsServer {
    config: MetricsServerConfig,
    state: SharedMetricsState,
}

impl MetricsServer {
    pub fn new(config: MetricsServerConfig, registry: MetricsRegistry) -> Self {
        let state = MetricsState {
            registry,
            latest: MetricsSnapshot::default(),
            stopped: false,
        };
        Self {
            config,
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Handle used by the render thread to publish snapshots.
    pub fn state(&self) -> SharedMetricsState {
        Arc::clone(&self.state)
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .route("/status", get(status_handler))
            .layer(CorsLayer::permissive())
            .with_state(Arc::clone(&self.state))
    }

    /// Serves until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Metrics exporter listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Server(e.to_string()))?;

        tracing::info!("Metrics exporter shut down");
        Ok(())
    }
}

async fn metrics_handler(State(state): State<SharedMetricsState>) -> impl IntoResponse {
    match state.read().await.registry.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("metrics encoding failed: {}", e),
        ),
    }
}

async fn health_handler(State(state): State<SharedMetricsState>) -> impl IntoResponse {
    if state.read().await.stopped {
        (StatusCode::SERVICE_UNAVAILABLE, "stopped")
    } else {
        (StatusCode::OK, "ok")
    }
}

async fn status_handler(State(state): State<SharedMetricsState>) -> String {
    state.read().await.summary()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> MetricsState {
        MetricsState {
            registry: MetricsRegistry::new().unwrap(),
            latest: MetricsSnapshot::default(),
            stopped: false,
        }
    }

    #[test]
    fn test_config_port() {
        assert_eq!(MetricsServerConfig::default().bind_addr.port(), 9090);
        assert_eq!(MetricsServerConfig::with_port(8080).bind_addr.port(), 8080);
        assert!(MetricsServerConfig::default().bind_addr.ip().is_loopback());
    }

    #[test]
    fn test_stopped_after_running() {
        let mut state = state();
        assert!(!state.stopped);

        state.update(&MetricsSnapshot {
            loop_running: true,
            ticks: 3,
            ..Default::default()
        });
        assert!(!state.stopped);

        state.update(&MetricsSnapshot {
            loop_running: false,
            ticks: 3,
            ..Default::default()
        });
        assert!(state.stopped);
        assert!(state.summary().starts_with("loop=stopped"));
    }

    #[test]
    fn test_summary_fields() {
        let mut state = state();
        state.update(&MetricsSnapshot {
            loop_running: true,
            ticks: 1,
            frames_presented: 1,
            intensity: 0.85,
            filter_enabled: true,
            ..Default::default()
        });
        let summary = state.summary();
        assert!(summary.contains("loop=running"));
        assert!(summary.contains("intensity=0.85"));
        assert!(summary.contains("presented=1"));
    }
}
