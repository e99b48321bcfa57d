//! HTTP client for the WAHA WhatsApp gateway.
//!
//! [`SessionGateway`] is the seam the session manager talks through;
//! [`HttpGateway`] is the reqwest-backed implementation.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::error::WahaError;
use crate::store::GatewayConfig;
use crate::types::{Session, SessionStatus};

const API_KEY_HEADER: &str = "X-Api-Key";

/// Remote session operations exposed by the gateway
#[async_trait]
pub trait SessionGateway: Send + Sync {
    /// `None` when the gateway does not know the session (HTTP 404)
    async fn get_session(&self, name: &str) -> Result<Option<Session>, WahaError>;

    async fn start_session(&self, name: &str) -> Result<Session, WahaError>;

    async fn create_session(&self, name: &str) -> Result<Session, WahaError>;

    async fn get_qr(&self, name: &str) -> Result<Option<String>, WahaError>;

    async fn stop_session(&self, name: &str) -> Result<(), WahaError>;

    async fn restart_session(&self, name: &str) -> Result<(), WahaError>;

    async fn delete_session(&self, name: &str) -> Result<(), WahaError>;

    /// Reachability and API key check, independent of any session
    async fn ping(&self) -> Result<(), WahaError>;
}

/// QR locations across WAHA versions, most current first
fn qr_endpoints(name: &str) -> [Vec<&str>; 4] {
    [
        vec!["api", "sessions", name, "auth", "qr"],
        vec!["api", name, "auth", "qr"],
        vec!["api", "sessions", name, "qr"],
        vec!["api", name, "qr"],
    ]
}

#[derive(Debug, Deserialize)]
struct QrResponse {
    #[serde(default)]
    qr: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig, timeout: Duration) -> Result<Self, WahaError> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WahaError::InvalidConfig(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<url::Url, WahaError> {
        let mut url = url::Url::parse(&self.config.url)
            .map_err(|e| WahaError::InvalidConfig(e.to_string()))?;

        url.path_segments_mut()
            .map_err(|_| WahaError::InvalidConfig(format!("{} cannot be a base URL", self.config.url)))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    /// Send one request; non-2xx statuses become errors except those in `passthrough`
    async fn send(
        &self,
        method: Method,
        url: url::Url,
        body: Option<serde_json::Value>,
        passthrough: &[StatusCode],
    ) -> Result<(StatusCode, String), WahaError> {
        tracing::debug!("WAHA {} {}", method, url);

        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .header(API_KEY_HEADER, &self.config.api_key);

        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!("WAHA {} {} failed: {}", method, url, e);
            WahaError::from(e)
        })?;

        let status = response.status();
        let text = response.text().await?;

        if status.is_success() || passthrough.contains(&status) {
            return Ok((status, text));
        }

        tracing::warn!("WAHA {} {} returned {}", method, url, status);
        Err(WahaError::from_status(status.as_u16(), &text))
    }

    fn parse_session(name: &str, text: &str, empty_status: SessionStatus) -> Result<Session, WahaError> {
        if text.trim().is_empty() {
            return Ok(Session {
                name: name.to_string(),
                status: empty_status,
                qr: None,
                me: None,
            });
        }

        let mut session: Session = serde_json::from_str(text)?;
        if session.name.is_empty() {
            session.name = name.to_string();
        }
        Ok(session)
    }
}

#[async_trait]
impl SessionGateway for HttpGateway {
    async fn get_session(&self, name: &str) -> Result<Option<Session>, WahaError> {
        let (status, text) = self
            .send(Method::GET, self.endpoint(&["api", "sessions", name])?, None, &[StatusCode::NOT_FOUND])
            .await?;

        if status == StatusCode::NOT_FOUND {
            tracing::debug!("WAHA session '{}' does not exist", name);
            return Ok(None);
        }

        if text.trim().is_empty() {
            return Err(WahaError::MalformedResponse("empty session body".to_string()));
        }

        Self::parse_session(name, &text, SessionStatus::Unknown).map(Some)
    }

    async fn start_session(&self, name: &str) -> Result<Session, WahaError> {
        let (_, text) = self
            .send(Method::POST, self.endpoint(&["api", "sessions", "start"])?, Some(json!({ "name": name })), &[])
            .await?;

        Self::parse_session(name, &text, SessionStatus::Starting)
    }

    async fn create_session(&self, name: &str) -> Result<Session, WahaError> {
        let (_, text) = self
            .send(Method::POST, self.endpoint(&["api", "sessions", ""])?, Some(json!({ "name": name })), &[])
            .await?;

        Self::parse_session(name, &text, SessionStatus::Starting)
    }

    /// First non-empty QR across the known endpoints. Missing endpoints and
    /// empty answers fall through; a rejected API key stops the search.
    async fn get_qr(&self, name: &str) -> Result<Option<String>, WahaError> {
        let mut last_error = None;

        for segments in qr_endpoints(name) {
            let path = segments.join("/");
            let url = self.endpoint(&segments)?;

            match self.send(Method::GET, url, None, &[StatusCode::NOT_FOUND]).await {
                Ok((status, _)) if status == StatusCode::NOT_FOUND => {
                    tracing::debug!("No QR endpoint at /{}", path);
                }
                Ok((_, text)) => match serde_json::from_str::<QrResponse>(&text) {
                    Ok(parsed) => match parsed.qr.filter(|qr| !qr.trim().is_empty()) {
                        Some(qr) => return Ok(Some(qr)),
                        None => tracing::debug!("Empty QR from /{}", path),
                    },
                    Err(e) => last_error = Some(WahaError::from(e)),
                },
                Err(e @ WahaError::Unauthorized(_)) => return Err(e),
                Err(e) => last_error = Some(e),
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    async fn stop_session(&self, name: &str) -> Result<(), WahaError> {
        self.send(Method::POST, self.endpoint(&["api", "sessions", name, "stop"])?, None, &[])
            .await
            .map(|_| ())
    }

    async fn restart_session(&self, name: &str) -> Result<(), WahaError> {
        self.send(Method::POST, self.endpoint(&["api", "sessions", name, "restart"])?, None, &[])
            .await
            .map(|_| ())
    }

    async fn delete_session(&self, name: &str) -> Result<(), WahaError> {
        self.send(Method::DELETE, self.endpoint(&["api", "sessions", name])?, None, &[])
            .await
            .map(|_| ())
    }

    async fn ping(&self) -> Result<(), WahaError> {
        let mut url = self.endpoint(&["api", "sessions"])?;
        url.set_query(Some("all=false"));

        self.send(Method::GET, url, None, &[]).await.map(|_| ())
    }
}
