// Gateway client error types
use thiserror::Error;

/// Everything that can go wrong talking to the WAHA gateway or guarding a call
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WahaError {
    // Transport: DNS, connect, timeout
    #[error("Network error: {0}")]
    Network(String),

    // Non-2xx responses
    #[error("Gateway returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    // 401/403, usually an expired or wrong API key
    #[error("Gateway rejected the API key (HTTP {0})")]
    Unauthorized(u16),

    // 2xx with a body that is not what the gateway documents
    #[error("Malformed gateway response: {0}")]
    MalformedResponse(String),

    #[error("Action cancelled by user")]
    Aborted,

    #[error("No session name configured")]
    MissingSessionName,

    #[error("Another gateway call is already in progress")]
    Busy,

    #[error("Session manager has been shut down")]
    TornDown,

    #[error("Invalid gateway configuration: {0}")]
    InvalidConfig(String),
}

impl WahaError {
    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            WahaError::Network(_) => "NETWORK_ERROR",
            WahaError::Http { .. } => "HTTP_ERROR",
            WahaError::Unauthorized(_) => "UNAUTHORIZED",
            WahaError::MalformedResponse(_) => "MALFORMED_RESPONSE",
            WahaError::Aborted => "ABORTED",
            WahaError::MissingSessionName => "MISSING_SESSION_NAME",
            WahaError::Busy => "BUSY",
            WahaError::TornDown => "TORN_DOWN",
            WahaError::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }

    /// Guard errors are raised before any request leaves the client
    pub fn is_guard(&self) -> bool {
        matches!(
            self,
            WahaError::Aborted | WahaError::MissingSessionName | WahaError::Busy | WahaError::TornDown
        )
    }

    /// Build the error for a non-2xx response, preferring the gateway's own message
    pub fn from_status(status: u16, body: &str) -> Self {
        if status == 401 || status == 403 {
            return WahaError::Unauthorized(status);
        }

        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    "no response body".to_string()
                } else {
                    trimmed.chars().take(200).collect()
                }
            });

        WahaError::Http { status, message }
    }
}

impl From<reqwest::Error> for WahaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            WahaError::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            WahaError::from_status(status.as_u16(), "")
        } else {
            WahaError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for WahaError {
    fn from(err: serde_json::Error) -> Self {
        WahaError::MalformedResponse(err.to_string())
    }
}
