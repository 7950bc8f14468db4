//! HTTP surface for submitting URL metrics.

mod error;

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use od_core::{MetricContext, UrlMetric};
use od_extensions::{metric_context_from_config, MetricConfig};
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::{debug, info};

pub use error::ApiError;

pub const CRATE_NAME: &str = "od-web";

#[derive(Clone)]
pub struct AppState {
    pub context: Arc<MetricContext>,
}

impl AppState {
    pub fn new(context: MetricContext) -> Self {
        Self {
            context: Arc::new(context),
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/url-metrics", post(submit_handler))
        .route("/url-metrics/schema", get(schema_handler))
        .with_state(Arc::new(state))
}

pub async fn serve(config: MetricConfig) -> anyhow::Result<()> {
    let context = metric_context_from_config(&config)?;
    let listener = TcpListener::bind(("0.0.0.0", config.web_port)).await?;
    info!(port = config.web_port, context = ?context, "serving URL metrics");
    axum::serve(listener, app(AppState::new(context))).await?;
    Ok(())
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    serve(MetricConfig::from_env()).await
}

async fn healthz_handler() -> &'static str {
    "ok"
}

async fn schema_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(state.context.schema().to_json())
}

/// Clients send everything but `uuid` and `timestamp`; the server assigns both.
async fn submit_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let mut raw: Value = serde_json::from_slice(&body)?;
    state.context.schema().writable().validate(&raw, "")?;

    if let Value::Object(map) = &mut raw {
        map.insert("timestamp".to_string(), Value::from(server_timestamp()));
    }
    let metric = UrlMetric::new(raw, &state.context)?;
    debug!(uuid = %metric.uuid(), url = %metric.url(), "accepted URL metric");
    Ok((StatusCode::CREATED, Json(metric)))
}

/// Seconds since the epoch with microsecond precision.
fn server_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
