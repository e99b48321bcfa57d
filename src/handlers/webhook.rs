// handlers/webhook.rs - POST /webhook/whatsapp
//
// Accepts the raw WAHA delivery and answers with the triage decision so the
// calling workflow can branch on `data.action` (skip / auto_reply / forward).

use axum::{body::Bytes, http::StatusCode, response::Json};
use serde_json::{json, Value};

use crate::webhook::{classify, WebhookOutcome};

pub async fn whatsapp_webhook(body: Bytes) -> (StatusCode, Json<Value>) {
    let webhook: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Rejected WAHA webhook with invalid JSON: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "success": false,
                    "error": format!("Invalid JSON body: {}", e),
                    "code": "INVALID_JSON"
                })),
            );
        }
    };

    let outcome = classify(&webhook, chrono::Utc::now().timestamp());
    match &outcome {
        WebhookOutcome::Skip { reason } => tracing::debug!("WAHA webhook skipped: {:?}", reason),
        WebhookOutcome::AutoReply { chat_id, .. } => tracing::info!("WAHA auto-reply to {}", chat_id),
        WebhookOutcome::Forward { chat_id, user_name, .. } => {
            tracing::info!("WAHA message from {} ({}) forwarded", user_name, chat_id)
        }
    }

    (StatusCode::OK, Json(json!({ "success": true, "data": outcome })))
}
