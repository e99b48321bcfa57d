// handlers/mod.rs - HTTP surface of the webhook receiver
//
// GET  /health            liveness
// POST /webhook/whatsapp  WAHA event triage

pub mod health;
pub mod webhook;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;

pub use health::health;
pub use webhook::whatsapp_webhook;

pub fn router(config: &AppConfig) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/webhook/whatsapp", post(whatsapp_webhook));

    if config.webhook.enable_cors {
        app = app.layer(CorsLayer::permissive());
    }
    if config.webhook.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }

    app
}
