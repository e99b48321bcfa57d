use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::error::WahaError;
use crate::gateway::SessionGateway;
use crate::types::{Me, Session, SessionStatus};

/// Scripted in-memory gateway that records every call
pub struct FakeGateway {
    session: Mutex<Result<Option<Session>, WahaError>>,
    queued_sessions: Mutex<VecDeque<Result<Option<Session>, WahaError>>>,
    start: Mutex<Result<Session, WahaError>>,
    qr: Mutex<Result<Option<String>, WahaError>>,
    delete: Mutex<Result<(), WahaError>>,
    ping: Mutex<Result<(), WahaError>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    hold: Mutex<Option<Arc<Notify>>>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            session: Mutex::new(Ok(None)),
            queued_sessions: Mutex::new(VecDeque::new()),
            start: Mutex::new(Ok(Session {
                name: String::new(),
                status: SessionStatus::Starting,
                qr: None,
                me: None,
            })),
            qr: Mutex::new(Ok(None)),
            delete: Mutex::new(Ok(())),
            ping: Mutex::new(Ok(())),
            calls: Mutex::new(HashMap::new()),
            hold: Mutex::new(None),
        })
    }

    pub fn set_session(&self, result: Result<Option<Session>, WahaError>) {
        *self.session.lock().unwrap() = result;
    }

    /// One-shot status results, served in order before the `set_session` value
    pub fn queue_session(&self, result: Result<Option<Session>, WahaError>) {
        self.queued_sessions.lock().unwrap().push_back(result);
    }

    pub fn set_start(&self, result: Result<Session, WahaError>) {
        *self.start.lock().unwrap() = result;
    }

    pub fn set_qr(&self, result: Result<Option<String>, WahaError>) {
        *self.qr.lock().unwrap() = result;
    }

    pub fn set_delete(&self, result: Result<(), WahaError>) {
        *self.delete.lock().unwrap() = result;
    }

    pub fn set_ping(&self, result: Result<(), WahaError>) {
        *self.ping.lock().unwrap() = result;
    }

    /// Make status fetches wait until the returned handle is notified
    pub fn hold_requests(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.hold.lock().unwrap() = Some(notify.clone());
        notify
    }

    pub fn calls_to(&self, op: &str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    fn record(&self, op: &'static str) {
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;
    }
}

#[async_trait]
impl SessionGateway for FakeGateway {
    async fn get_session(&self, _name: &str) -> Result<Option<Session>, WahaError> {
        self.record("get_session");

        let hold = self.hold.lock().unwrap().clone();
        if let Some(hold) = hold {
            hold.notified().await;
        }

        if let Some(queued) = self.queued_sessions.lock().unwrap().pop_front() {
            return queued;
        }
        self.session.lock().unwrap().clone()
    }

    async fn start_session(&self, name: &str) -> Result<Session, WahaError> {
        self.record("start_session");
        self.start.lock().unwrap().clone().map(|mut session| {
            if session.name.is_empty() {
                session.name = name.to_string();
            }
            session
        })
    }

    async fn create_session(&self, name: &str) -> Result<Session, WahaError> {
        self.record("create_session");
        Ok(Session {
            name: name.to_string(),
            status: SessionStatus::Starting,
            qr: None,
            me: None,
        })
    }

    async fn get_qr(&self, _name: &str) -> Result<Option<String>, WahaError> {
        self.record("get_qr");
        self.qr.lock().unwrap().clone()
    }

    async fn stop_session(&self, _name: &str) -> Result<(), WahaError> {
        self.record("stop_session");
        Ok(())
    }

    async fn restart_session(&self, _name: &str) -> Result<(), WahaError> {
        self.record("restart_session");
        Ok(())
    }

    async fn delete_session(&self, _name: &str) -> Result<(), WahaError> {
        self.record("delete_session");
        self.delete.lock().unwrap().clone()
    }

    async fn ping(&self) -> Result<(), WahaError> {
        self.record("ping");
        self.ping.lock().unwrap().clone()
    }
}

pub fn working_session(name: &str, id: &str, push_name: &str) -> Session {
    Session {
        name: name.to_string(),
        status: SessionStatus::Working,
        qr: None,
        me: Some(Me {
            id: id.to_string(),
            push_name: push_name.to_string(),
        }),
    }
}

pub fn scan_qr_session(name: &str, qr: Option<&str>) -> Session {
    Session {
        name: name.to_string(),
        status: SessionStatus::ScanQrCode,
        qr: qr.map(str::to_string),
        me: None,
    }
}
