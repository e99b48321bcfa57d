use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::Session;

/// Notifications published by the session manager.
///
/// Consumers subscribe through [`super::SessionManager::subscribe`]; a
/// lagging or absent subscriber never blocks the manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionUpdated {
        session: Option<Session>,
        checked_at: DateTime<Utc>,
    },
    QrCodeUpdated(Option<String>),
    Error(String),
    Success(String),
}

impl SessionEvent {
    pub fn is_error(&self) -> bool {
        matches!(self, SessionEvent::Error(_))
    }
}
