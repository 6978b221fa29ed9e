//! HTTP side of the relay: the Alertmanager webhook receiver plus health and
//! metrics endpoints.

use alertgram_core::alert::WebhookMessage;
use axum::{
  Json, Router,
  extract::State,
  http::{StatusCode, header},
  response::IntoResponse,
  routing::{get, post},
};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use crate::metrics::{CONTENT_TYPE, Metrics};

// ─── State ───────────────────────────────────────────────────────────────────

/// Shared state threaded through the webhook handlers.
#[derive(Clone)]
pub struct WebhookState {
  pub sender:  mpsc::Sender<WebhookMessage>,
  pub metrics: Metrics,
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] serving the webhook, `/health` and `/metrics`.
pub fn router(state: WebhookState) -> Router {
  Router::new()
    .route("/",        post(receive_webhook))
    .route("/webhook", post(receive_webhook))
    .route("/health",  get(health))
    .route("/metrics", get(metrics))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// Queue a batch for fan-out. Waits for channel capacity, so a slow fan-out
/// pushes back on Alertmanager instead of dropping batches.
async fn receive_webhook(
  State(state): State<WebhookState>,
  Json(webhook): Json<WebhookMessage>,
) -> StatusCode {
  state.metrics.webhook();
  tracing::debug!(
    receiver = %webhook.receiver,
    alerts = webhook.alerts.len(),
    "webhook received"
  );

  match state.sender.send(webhook).await {
    Ok(()) => StatusCode::OK,
    Err(_) => {
      tracing::error!("fan-out loop is gone, rejecting webhook");
      StatusCode::SERVICE_UNAVAILABLE
    }
  }
}

async fn health() -> &'static str { "ok" }

async fn metrics(State(state): State<WebhookState>) -> impl IntoResponse {
  ([(header::CONTENT_TYPE, CONTENT_TYPE)], state.metrics.encode())
}
