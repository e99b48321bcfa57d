/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states reported by the WAHA gateway for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Working,
    Starting,
    ScanQrCode,
    Stopped,
    Failed,
    // Anything the gateway reports that this client does not know about
    #[serde(other)]
    Unknown,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Working => "WORKING",
            SessionStatus::Starting => "STARTING",
            SessionStatus::ScanQrCode => "SCAN_QR_CODE",
            SessionStatus::Stopped => "STOPPED",
            SessionStatus::Failed => "FAILED",
            SessionStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device linked to a working session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Me {
    pub id: String,
    #[serde(rename = "pushName", default)]
    pub push_name: String,
}

/// Last known state of a named gateway session.
///
/// This is a cache of the most recent poll, never an authoritative copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub name: String,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub me: Option<Me>,
}

impl Session {
    pub fn needs_qr(&self) -> bool {
        self.status == SessionStatus::ScanQrCode
    }
}

/// Identity of the authenticated clinic, supplied by the dashboard's auth layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicIdentity {
    pub clinic_id: String,
    #[serde(default)]
    pub subscriber: Option<String>,
}

impl ClinicIdentity {
    pub fn new(clinic_id: impl Into<String>, subscriber: Option<String>) -> Self {
        Self {
            clinic_id: clinic_id.into(),
            subscriber,
        }
    }

    /// Gateway session name: subscriber, then clinic id, then a placeholder
    pub fn session_name(&self) -> String {
        if let Some(subscriber) = self.subscriber.as_deref().map(str::trim) {
            if !subscriber.is_empty() {
                return subscriber.to_string();
            }
        }

        let clinic_id = self.clinic_id.trim();
        if !clinic_id.is_empty() {
            return clinic_id.to_string();
        }

        "clinic-unknown".to_string()
    }
}
