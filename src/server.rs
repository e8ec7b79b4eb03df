//! HTTP server
//!
//! A single transcript route plus liveness/version probes. The fetch
//! strategies and the per-attempt timeout are injected through [`AppState`],
//! so tests can build routers around mock fetchers.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::Method;
use axum::routing::get;
use axum::{Json, Router};
use eyre::{Result, WrapErr};
use log::{error, info, warn};
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ServerConfig;
use crate::error::{ApiError, NO_TRANSCRIPT, TRANSCRIPTS_UNAVAILABLE, classify_restriction};
use crate::extract_video_id;
use crate::fetch::TranscriptFetcher;
use crate::output::TranscriptResponse;
use crate::subtitles::SubtitleFetcher;
use crate::youtube::{InnerTubeFetcher, REQUESTS_PER_FETCH};

/// Shared per-process state: the ordered fetch strategies
pub struct AppState {
    fetchers: Vec<Arc<dyn TranscriptFetcher>>,
    request_timeout: Duration,
}

impl AppState {
    pub fn new(fetchers: Vec<Arc<dyn TranscriptFetcher>>, request_timeout: Duration) -> Self {
        Self {
            fetchers,
            request_timeout,
        }
    }

    /// InnerTube first, yt-dlp subtitles second
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let client = innertube_client(config.request_timeout)?;
        let primary = InnerTubeFetcher::new(client, config.innertube_base_url.clone());
        let fallback = SubtitleFetcher::new(
            config.yt_dlp.clone(),
            config.scratch_dir.clone(),
            config.subtitle_lang.clone(),
        );
        info!("Subtitle scratch directory: {}", fallback.scratch_dir().display());

        let fetchers: Vec<Arc<dyn TranscriptFetcher>> = vec![Arc::new(primary), Arc::new(fallback)];
        Ok(Self::new(fetchers, config.request_timeout))
    }

    /// Try each strategy in order until one yields segments.
    pub async fn resolve(&self, video_id: &str) -> Result<TranscriptResponse, ApiError> {
        let mut best_title: Option<String> = None;
        let mut restriction = None;
        let mut last_failed = false;

        for fetcher in &self.fetchers {
            let name = fetcher.name();
            match tokio::time::timeout(self.request_timeout, fetcher.fetch(video_id)).await {
                Ok(Ok(transcript)) if !transcript.is_empty() => {
                    info!(
                        "{name} returned {} segments for {video_id} (source: {})",
                        transcript.segments.len(),
                        transcript.source
                    );
                    return Ok(TranscriptResponse::new(transcript, best_title.as_deref()));
                }
                Ok(Ok(transcript)) => {
                    info!("{name} returned no transcript for {video_id}");
                    best_title = best_title.or(transcript.title);
                    last_failed = false;
                }
                Ok(Err(e)) => {
                    warn!("{name} failed for {video_id}: {e:#}");
                    restriction = restriction.or_else(|| classify_restriction(&e));
                    last_failed = true;
                }
                Err(_) => {
                    warn!("{name} timed out after {:?} for {video_id}", self.request_timeout);
                    last_failed = true;
                }
            }
        }

        let video_id = video_id.to_string();
        if let Some(restriction) = restriction {
            return Err(ApiError::AccessDenied { video_id, restriction });
        }

        let message = if last_failed { TRANSCRIPTS_UNAVAILABLE } else { NO_TRANSCRIPT };
        Err(ApiError::TranscriptUnavailable { video_id, message })
    }
}

/// HTTP client whose per-call timeout leaves room for every InnerTube call in one attempt
fn innertube_client(attempt_timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(attempt_timeout / (REQUESTS_PER_FETCH + 1))
        .build()
        .wrap_err("failed to build HTTP client")
}

#[derive(Debug, Deserialize)]
pub struct TranscriptQuery {
    pub id: Option<String>,
}

/// Transcript endpoint
/// GET /?id=<video id or url>
pub async fn get_transcript(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TranscriptQuery>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let raw = query.id.unwrap_or_default();
    let video_id = extract_video_id(&raw).map_err(|e| {
        info!("Rejected transcript request for {raw:?}: {e}");
        ApiError::from(e)
    })?;
    info!("Transcript requested for {video_id}");

    // Run resolution on its own task so a panicking fetcher maps to a 500
    let task_state = Arc::clone(&state);
    let task_id = video_id.clone();
    let outcome = tokio::spawn(async move { task_state.resolve(&task_id).await }).await;

    match outcome {
        Ok(Ok(response)) => {
            info!("Responding 200 for {video_id} with {} segments", response.transcript.len());
            Ok(Json(response))
        }
        Ok(Err(e)) => {
            info!("Responding {} for {video_id}: {e}", e.status());
            Err(e)
        }
        Err(e) => {
            error!("Transcript task for {video_id} aborted: {e}");
            Err(ApiError::UpstreamFailure { video_id })
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

/// Version endpoint
pub async fn version_check() -> &'static str {
    concat!("ytx-server v", env!("CARGO_PKG_VERSION"))
}

/// Create the Axum router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS]);

    Router::new()
        .route("/", get(get_transcript))
        .route("/health", get(health_check))
        .route("/version", get(version_check))
        .layer(cors)
        .with_state(state)
}

/// The HTTP server, built once at startup from resolved configuration
pub struct Server {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Result<Self> {
        let state = Arc::new(AppState::from_config(&config)?);
        Ok(Self { config, state })
    }

    pub fn with_state(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    pub fn router(&self) -> Router {
        create_router(Arc::clone(&self.state))
    }

    /// Bind the configured address and serve until Ctrl-C
    pub async fn run(self) -> Result<()> {
        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .wrap_err_with(|| format!("failed to bind {addr}"))?;
        info!("Listening on {addr}");
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .wrap_err("server error")
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
