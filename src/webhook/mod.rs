//! Inbound WAHA webhook triage.
//!
//! Decides for each gateway event whether it is ignored, answered with a
//! canned reply, or forwarded to the assistant pipeline.

use serde::Serialize;
use serde_json::Value;

pub const TEXT_ONLY_REPLY: &str =
    "Sorry, I can only process text messages. How can I help you?";

const STATUS_BROADCAST: &str = "status@broadcast";
const DEFAULT_USER_NAME: &str = "User";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    InvalidWebhook,
    NotMessageEvent,
    InvalidMessage,
    OwnMessage,
    StatusMessage,
}

/// Result of triaging one webhook delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Skip {
        reason: SkipReason,
    },
    AutoReply {
        chat_id: String,
        response_text: String,
        message_type: String,
    },
    Forward {
        chat_id: String,
        user_name: String,
        message_text: String,
        message_id: Option<String>,
        timestamp: i64,
    },
}

impl WebhookOutcome {
    fn skip(reason: SkipReason) -> Self {
        WebhookOutcome::Skip { reason }
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Triage one webhook body; `now` is used when the message carries no timestamp
pub fn classify(webhook: &Value, now: i64) -> WebhookOutcome {
    let Some(event) = str_field(webhook, "event") else {
        return WebhookOutcome::skip(SkipReason::InvalidWebhook);
    };

    if event != "message" {
        tracing::debug!("Ignoring WAHA event '{}'", event);
        return WebhookOutcome::skip(SkipReason::NotMessageEvent);
    }

    let Some(payload) = webhook.get("payload").filter(|p| p.is_object()) else {
        return WebhookOutcome::skip(SkipReason::InvalidMessage);
    };

    let (Some(from), Some(body)) = (str_field(payload, "from"), str_field(payload, "body")) else {
        return WebhookOutcome::skip(SkipReason::InvalidMessage);
    };

    if payload.get("fromMe").and_then(Value::as_bool).unwrap_or(false) {
        return WebhookOutcome::skip(SkipReason::OwnMessage);
    }

    if from == STATUS_BROADCAST {
        return WebhookOutcome::skip(SkipReason::StatusMessage);
    }

    let message_type = str_field(payload, "type").unwrap_or("text");
    if message_type != "chat" && message_type != "text" {
        tracing::info!("Auto-replying to non-text message of type '{}'", message_type);
        return WebhookOutcome::AutoReply {
            chat_id: from.to_string(),
            response_text: TEXT_ONLY_REPLY.to_string(),
            message_type: message_type.to_string(),
        };
    }

    let user_name = payload
        .get("_data")
        .and_then(|d| str_field(d, "notifyName"))
        .or_else(|| str_field(payload, "pushName"))
        .unwrap_or(DEFAULT_USER_NAME);

    let timestamp = payload.get("timestamp").and_then(Value::as_i64).unwrap_or(now);

    WebhookOutcome::Forward {
        chat_id: from.to_string(),
        user_name: user_name.to_string(),
        message_text: body.to_string(),
        message_id: str_field(payload, "id").map(str::to_string),
        timestamp,
    }
}
