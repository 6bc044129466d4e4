//! HTTP query API plus health and Prometheus endpoints
//!
//! Handlers only read the store; the one side effect is token issuance.

use crate::auth::{Authenticated, OptionalAuth};
use anyhow::Context;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use vitals_pipeline::{
    health::{ComponentStatus, HealthRegistry},
    AuthError, ChartRenderer, Credentials, MetricValue, PipelineMetrics, StateStore,
    TokenService,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: StateStore,
    pub tokens: TokenService,
    pub credentials: Credentials,
    pub renderer: Arc<dyn ChartRenderer>,
    pub health_registry: HealthRegistry,
    pub metrics: PipelineMetrics,
}

impl AppState {
    pub fn new(
        store: StateStore,
        tokens: TokenService,
        credentials: Credentials,
        renderer: Arc<dyn ChartRenderer>,
        health_registry: HealthRegistry,
    ) -> Self {
        Self {
            store,
            tokens,
            credentials,
            renderer,
            health_registry,
            metrics: PipelineMetrics::new(),
        }
    }
}

/// Errors surfaced to HTTP clients
#[derive(Debug)]
pub enum ApiError {
    Auth(AuthError),
    NoPlotData,
    Render(String),
    Internal(String),
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Auth(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Auth(AuthError::BadCredentials) => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "msg": "Bad username or password" })),
            )
                .into_response(),
            ApiError::Auth(e) => {
                let mut response =
                    (StatusCode::UNAUTHORIZED, Json(json!({ "msg": e.to_string() }))).into_response();
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                response
            }
            ApiError::NoPlotData => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "No data or predictions available." })),
            )
                .into_response(),
            ApiError::Render(message) | ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": message })),
            )
                .into_response(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum PredictionResponse {
    Available {
        prediction: f64,
        index: u64,
    },
    Pending {
        prediction: Option<f64>,
        message: &'static str,
    },
}

/// Exchange credentials for an access token.
///
/// Any body that is not JSON with matching `username` and `password` is a 401.
async fn login(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<LoginResponse>, ApiError> {
    let request: Option<LoginRequest> = serde_json::from_slice(&body).ok();
    let (username, password) = match request {
        Some(LoginRequest {
            username: Some(username),
            password: Some(password),
        }) => (username, password),
        _ => {
            debug!("Login request without credentials");
            return Err(AuthError::BadCredentials.into());
        }
    };

    if !state.credentials.matches(&username, &password) {
        warn!(username = %username, "Rejected login");
        return Err(AuthError::BadCredentials.into());
    }

    let access_token = state.tokens.issue(&username)?;
    info!(username = %username, ttl_secs = state.tokens.ttl_secs(), "Issued access token");
    Ok(Json(LoginResponse { access_token }))
}

/// Recent values per metric, oldest first
async fn data(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<String, Vec<MetricValue>>> {
    Json(state.store.snapshot().await.metrics)
}

async fn prediction(
    _auth: Authenticated,
    State(state): State<Arc<AppState>>,
) -> Json<PredictionResponse> {
    let response = match state.store.latest_prediction().await {
        Some(p) => PredictionResponse::Available {
            prediction: p.value,
            index: p.index,
        },
        None => PredictionResponse::Pending {
            prediction: None,
            message: "No prediction available yet.",
        },
    };
    Json(response)
}

/// Trend chart of the predictions aligned with buffered readings
async fn plot(OptionalAuth(identity): OptionalAuth, State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let snapshot = state.store.snapshot().await;
    let points = snapshot.plot_series().map_err(|e| {
        debug!(error = %e, "Nothing to plot");
        ApiError::NoPlotData
    })?;

    debug!(points = points.len(), identity = ?identity, "Rendering plot");
    let renderer = state.renderer.clone();
    let content_type = renderer.content_type();
    let image = tokio::task::spawn_blocking(move || renderer.render(&points))
        .await
        .map_err(|e| ApiError::Internal(format!("render task failed: {e}")))?
        .map_err(|e| {
            error!(error = %e, "Chart rendering failed");
            ApiError::Render(e.to_string())
        })?;

    Ok(([(header::CONTENT_TYPE, content_type)], image).into_response())
}

/// 200 while operational (healthy or degraded), 503 otherwise
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    state
        .metrics
        .set_buffered_readings(state.store.readings_len().await);

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        buffer,
    ))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/data", get(data))
        .route("/prediction", get(prediction))
        .route("/plot", get(plot))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Bind the API listener on all interfaces
pub async fn bind(port: u16) -> anyhow::Result<TcpListener> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "API listener bound");
    Ok(listener)
}

/// Serve the API until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("API server stopped");
    Ok(())
}
