//! Client-side lifecycle of one named WAHA session.
//!
//! The manager caches the last server response, guards against overlapping
//! calls with a loading flag, and publishes every outcome on a broadcast
//! channel. It performs no status transitions of its own: whatever the
//! gateway reports is what the manager holds.

pub mod events;
pub mod refresh;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::error::WahaError;
use crate::gateway::{HttpGateway, SessionGateway};
use crate::store::ConfigStore;
use crate::types::{ClinicIdentity, Session, SessionStatus};

pub use events::SessionEvent;
pub use refresh::ScheduledTask;

const EVENT_CAPACITY: usize = 64;

/// Tunables for a manager instance
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub refresh_period: Duration,
    /// Delay between status polls while a freshly started session is STARTING
    pub start_poll_delay: Duration,
    pub start_poll_attempts: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            refresh_period: Duration::from_secs(3 * 60),
            start_poll_delay: Duration::from_secs(2),
            start_poll_attempts: 3,
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            refresh_period: config.refresh_period(),
            ..Self::default()
        }
    }
}

/// Point-in-time copy of the manager state for rendering
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_name: String,
    pub session: Option<Session>,
    pub qr_code: Option<String>,
    pub is_loading: bool,
    pub auto_refresh: bool,
    pub last_check: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct SessionState {
    session: Option<Session>,
    qr_code: Option<String>,
    last_check: Option<DateTime<Utc>>,
}

/// Clears the loading flag when the call that set it finishes
struct LoadingGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

pub struct SessionManager {
    session_name: String,
    gateway: Arc<dyn SessionGateway>,
    options: SessionOptions,
    state: Mutex<SessionState>,
    loading: AtomicBool,
    torn_down: AtomicBool,
    events: broadcast::Sender<SessionEvent>,
    refresh: Mutex<Option<ScheduledTask>>,
}

impl SessionManager {
    pub fn new(
        session_name: impl Into<String>,
        gateway: Arc<dyn SessionGateway>,
        options: SessionOptions,
    ) -> Arc<Self> {
        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);

        Arc::new(Self {
            session_name: session_name.into().trim().to_string(),
            gateway,
            options,
            state: Mutex::new(SessionState::default()),
            loading: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
            events,
            refresh: Mutex::new(None),
        })
    }

    /// Manager for a clinic, talking to the gateway its stored config points at
    pub fn for_clinic(
        clinic: &ClinicIdentity,
        store: &dyn ConfigStore,
        config: &AppConfig,
    ) -> Result<Arc<Self>, WahaError> {
        let (gateway_config, source) = store.resolve(Some(clinic.clinic_id.as_str()), &config.gateway);

        let session_name = clinic.session_name();
        tracing::info!(
            "WAHA session '{}' for clinic '{}' uses {} ({:?} config)",
            session_name,
            clinic.clinic_id,
            gateway_config.url,
            source
        );

        let gateway = HttpGateway::new(gateway_config, config.request_timeout())?;
        Ok(Self::new(session_name, Arc::new(gateway), SessionOptions::from_config(config)))
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock_state();
        SessionSnapshot {
            session_name: self.session_name.clone(),
            session: state.session.clone(),
            qr_code: state.qr_code.clone(),
            is_loading: self.is_loading(),
            auto_refresh: self.is_auto_refresh_active(),
            last_check: state.last_check,
        }
    }

    /// Fetch the session status. Silent checks never publish errors.
    pub async fn check_session(&self, silent: bool) -> Result<Option<Session>, WahaError> {
        self.require_name(silent)?;
        let _guard = self.begin()?;

        match self.refresh_state().await {
            Ok(session) => Ok(session),
            Err(e) => Err(self.fail("Failed to check WhatsApp session", e, silent)),
        }
    }

    /// Start the session and surface its pairing QR code when the gateway asks for one.
    ///
    /// A session that is already WORKING, or waiting for a scan with a QR at
    /// hand, is reused without a start request.
    pub async fn start_and_get_qr(&self) -> Result<Session, WahaError> {
        self.require_name(false)?;
        let _guard = self.begin()?;

        match self.start_inner().await {
            Ok((session, reused)) => {
                let has_qr = self.lock_state().qr_code.is_some();
                let message = match (reused, session.status, has_qr) {
                    (true, SessionStatus::Working, _) => "WhatsApp is already connected".to_string(),
                    (true, _, true) => "QR code ready, scan it with WhatsApp".to_string(),
                    (false, _, true) => "Session started, scan the QR code with WhatsApp".to_string(),
                    _ => format!("Session started ({})", session.status),
                };
                self.notify(SessionEvent::Success(message));
                Ok(session)
            }
            Err(e) => Err(self.fail("Failed to start WhatsApp session", e, false)),
        }
    }

    /// Create the session on the gateway after a connectivity check, then re-read its status
    pub async fn create_session(&self) -> Result<Option<Session>, WahaError> {
        self.require_name(false)?;
        let _guard = self.begin()?;

        if let Err(e) = self.gateway.ping().await {
            return Err(self.fail("Cannot reach the WAHA gateway", e, false));
        }
        if let Err(e) = self.gateway.create_session(&self.session_name).await {
            return Err(self.fail("Failed to create WhatsApp session", e, false));
        }
        tracing::info!("WAHA session '{}' created", self.session_name);
        self.notify(SessionEvent::Success("WhatsApp session created".to_string()));

        match self.refresh_state().await {
            Ok(session) => Ok(session),
            Err(e) => Err(self.fail("Failed to check WhatsApp session", e, false)),
        }
    }

    /// Check that the gateway answers and accepts the API key. Needs no session name.
    pub async fn test_connection(&self) -> Result<(), WahaError> {
        let _guard = self.begin()?;

        match self.gateway.ping().await {
            Ok(()) => {
                self.ensure_live()?;
                self.notify(SessionEvent::Success("WAHA gateway is reachable".to_string()));
                Ok(())
            }
            Err(e) => Err(self.fail("Cannot reach the WAHA gateway", e, false)),
        }
    }

    /// Delete the session on the gateway once `confirm` agrees.
    ///
    /// A refusal issues no request and returns [`WahaError::Aborted`].
    pub async fn delete_session<F>(&self, confirm: F) -> Result<(), WahaError>
    where
        F: FnOnce(&str) -> bool,
    {
        self.require_name(false)?;
        if self.is_loading() {
            return Err(WahaError::Busy);
        }

        if !confirm(&self.session_name) {
            tracing::info!("Deletion of WAHA session '{}' cancelled", self.session_name);
            return Err(WahaError::Aborted);
        }

        let _guard = self.begin()?;

        match self.gateway.delete_session(&self.session_name).await {
            Ok(()) => {
                self.ensure_live()?;
                self.clear_state();
                tracing::info!("WAHA session '{}' deleted", self.session_name);
                self.notify(SessionEvent::Success("WhatsApp session deleted".to_string()));
                Ok(())
            }
            Err(e) => Err(self.fail("Failed to delete WhatsApp session", e, false)),
        }
    }

    pub async fn stop_session(&self) -> Result<(), WahaError> {
        self.require_name(false)?;
        let _guard = self.begin()?;

        match self.gateway.stop_session(&self.session_name).await {
            Ok(()) => {
                self.ensure_live()?;
                self.clear_state();
                self.notify(SessionEvent::Success("WhatsApp session stopped".to_string()));
                Ok(())
            }
            Err(e) => Err(self.fail("Failed to stop WhatsApp session", e, false)),
        }
    }

    /// Restart the session, then re-read its status
    pub async fn restart_session(&self) -> Result<Option<Session>, WahaError> {
        self.require_name(false)?;
        let _guard = self.begin()?;

        if let Err(e) = self.gateway.restart_session(&self.session_name).await {
            return Err(self.fail("Failed to restart WhatsApp session", e, false));
        }
        self.notify(SessionEvent::Success("WhatsApp session restarted".to_string()));

        match self.refresh_state().await {
            Ok(session) => Ok(session),
            Err(e) => Err(self.fail("Failed to check WhatsApp session", e, false)),
        }
    }

    /// Turn the periodic silent status check on or off.
    ///
    /// Returns whether a refresh task is running afterwards. Enabling is a
    /// no-op without a session name, after [`SessionManager::cleanup`], or
    /// when called outside a tokio runtime (the task has nowhere to run).
    pub fn set_auto_refresh(self: &Arc<Self>, enabled: bool) -> bool {
        let mut slot = self.lock_refresh();

        let runtime = tokio::runtime::Handle::try_current();
        if enabled && runtime.is_err() {
            tracing::warn!("Auto-refresh for '{}' needs a tokio runtime", self.session_name);
        }

        if !enabled || self.session_name.is_empty() || self.is_torn_down() || runtime.is_err() {
            if let Some(mut task) = slot.take() {
                task.stop();
                tracing::info!("Auto-refresh disabled for '{}'", self.session_name);
            }
            return false;
        }

        if slot.as_ref().is_some_and(ScheduledTask::is_active) {
            return true;
        }

        let period = self.options.refresh_period;
        let weak: Weak<Self> = Arc::downgrade(self);
        tracing::info!(
            "Auto-refresh every {}s for '{}'",
            period.as_secs(),
            self.session_name
        );

        *slot = Some(ScheduledTask::every(period, move || {
            let weak = weak.clone();
            async move {
                let Some(manager) = weak.upgrade() else {
                    return false;
                };
                if manager.is_torn_down() {
                    return false;
                }
                tracing::debug!("Auto-refresh tick for '{}'", manager.session_name);
                // Busy and transport errors are already logged; keep ticking
                let _ = manager.check_session(true).await;
                true
            }
        }));

        true
    }

    pub fn is_auto_refresh_active(&self) -> bool {
        self.lock_refresh().as_ref().is_some_and(ScheduledTask::is_active)
    }

    /// Stop the refresh task and ignore any result still in flight.
    /// Safe to call more than once.
    pub fn cleanup(&self) {
        let first = !self.torn_down.swap(true, Ordering::SeqCst);

        if let Some(mut task) = self.lock_refresh().take() {
            task.stop();
        }

        if first {
            tracing::debug!("Session manager for '{}' cleaned up", self.session_name);
        }
    }

    fn require_name(&self, silent: bool) -> Result<(), WahaError> {
        if self.session_name.is_empty() {
            if !silent {
                self.notify(SessionEvent::Error("No WhatsApp session name configured".to_string()));
            }
            return Err(WahaError::MissingSessionName);
        }
        Ok(())
    }

    fn begin(&self) -> Result<LoadingGuard<'_>, WahaError> {
        self.ensure_live()?;

        self.loading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| WahaError::Busy)?;

        Ok(LoadingGuard { flag: &self.loading })
    }

    fn ensure_live(&self) -> Result<(), WahaError> {
        if self.is_torn_down() {
            return Err(WahaError::TornDown);
        }
        Ok(())
    }

    /// Fetch status (and QR when needed) and store it; caller holds the loading guard
    async fn refresh_state(&self) -> Result<Option<Session>, WahaError> {
        let fetched = self.gateway.get_session(&self.session_name).await?;

        let qr_code = match &fetched {
            Some(session) => self.current_qr(session).await,
            None => None,
        };

        self.ensure_live()?;
        match &fetched {
            Some(session) => tracing::debug!("WAHA session '{}' is {}", self.session_name, session.status),
            None => tracing::info!("WAHA session '{}' does not exist", self.session_name),
        }
        self.apply(fetched.clone(), qr_code);
        Ok(fetched)
    }

    /// Start (or reuse) the session; the flag tells whether an existing one was reused
    async fn start_inner(&self) -> Result<(Session, bool), WahaError> {
        if let Some((session, qr_code)) = self.reusable_session().await? {
            tracing::info!("WAHA session '{}' already {}, not starting", self.session_name, session.status);
            self.ensure_live()?;
            self.apply(Some(session.clone()), qr_code);
            return Ok((session, true));
        }

        let mut session = self.gateway.start_session(&self.session_name).await?;
        tracing::info!("WAHA session '{}' started: {}", self.session_name, session.status);

        let mut attempts = 0;
        while session.status == SessionStatus::Starting && attempts < self.options.start_poll_attempts {
            attempts += 1;
            tokio::time::sleep(self.options.start_poll_delay).await;
            self.ensure_live()?;

            match self.gateway.get_session(&self.session_name).await? {
                Some(polled) => session = polled,
                None => break,
            }
        }

        let qr_code = self.current_qr(&session).await;

        self.ensure_live()?;
        self.apply(Some(session.clone()), qr_code);
        Ok((session, false))
    }

    /// Silent pre-start check: WORKING, or SCAN_QR_CODE with a QR available
    async fn reusable_session(&self) -> Result<Option<(Session, Option<String>)>, WahaError> {
        let existing = match self.gateway.get_session(&self.session_name).await {
            Ok(existing) => existing,
            Err(e) => {
                tracing::warn!("Pre-start check for '{}' failed: {}", self.session_name, e);
                None
            }
        };
        self.ensure_live()?;

        let Some(session) = existing else {
            return Ok(None);
        };

        match session.status {
            SessionStatus::Working => Ok(Some((session, None))),
            SessionStatus::ScanQrCode => match self.resolve_qr(&session).await {
                Ok(Some(qr)) => Ok(Some((session, Some(qr)))),
                Ok(None) => Ok(None),
                Err(e) => {
                    tracing::warn!("Could not fetch QR for '{}': {}", self.session_name, e);
                    Ok(None)
                }
            },
            _ => Ok(None),
        }
    }

    /// QR from the session body, else from the gateway; only for SCAN_QR_CODE
    async fn resolve_qr(&self, session: &Session) -> Result<Option<String>, WahaError> {
        if !session.needs_qr() {
            return Ok(None);
        }

        if let Some(qr) = session.qr.clone().filter(|qr| !qr.is_empty()) {
            return Ok(Some(qr));
        }

        self.gateway.get_qr(&self.session_name).await
    }

    /// Like `resolve_qr`, but a failed fetch keeps the QR already shown
    async fn current_qr(&self, session: &Session) -> Option<String> {
        match self.resolve_qr(session).await {
            Ok(qr) => qr,
            Err(e) => {
                tracing::warn!("Could not fetch QR for '{}': {}", self.session_name, e);
                self.lock_state().qr_code.clone()
            }
        }
    }

    fn apply(&self, session: Option<Session>, qr_code: Option<String>) {
        let checked_at = Utc::now();
        let qr_changed = {
            let mut state = self.lock_state();
            let qr_changed = state.qr_code != qr_code;
            state.session = session.clone();
            state.qr_code = qr_code.clone();
            state.last_check = Some(checked_at);
            qr_changed
        };

        self.notify(SessionEvent::SessionUpdated { session, checked_at });
        if qr_changed {
            self.notify(SessionEvent::QrCodeUpdated(qr_code));
        }
    }

    fn clear_state(&self) {
        self.apply(None, None);
    }

    /// Report a failed call; prior state stays untouched
    fn fail(&self, context: &str, err: WahaError, silent: bool) -> WahaError {
        if err.is_guard() {
            return err;
        }

        if silent {
            tracing::warn!("{} '{}' (silent): {}", context, self.session_name, err);
        } else {
            tracing::error!("{} '{}': {}", context, self.session_name, err);
            self.notify(SessionEvent::Error(format!("{}: {}", context, err)));
        }
        err
    }

    fn notify(&self, event: SessionEvent) {
        if self.is_torn_down() {
            return;
        }
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_refresh(&self) -> MutexGuard<'_, Option<ScheduledTask>> {
        self.refresh.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.cleanup();
    }
}
