//! Pure view model for the WhatsApp status card.
//!
//! Nothing here talks to the gateway: [`SessionView`] is derived from a
//! [`SessionSnapshot`] and [`Notices`] is fed from the manager's event
//! channel.

use serde::Serialize;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

use crate::session::{SessionEvent, SessionSnapshot};
use crate::types::SessionStatus;

pub const NO_SESSION_BADGE: &str = "NO_SESSION";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeVariant {
    Default,
    Secondary,
    Destructive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusIcon {
    Connected,
    Pending,
    QrCode,
    Disconnected,
    Alert,
}

impl StatusIcon {
    pub fn glyph(&self) -> &'static str {
        match self {
            StatusIcon::Connected => "●",
            StatusIcon::Pending => "◌",
            StatusIcon::QrCode => "▦",
            StatusIcon::Disconnected => "○",
            StatusIcon::Alert => "✗",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HelpMessage {
    pub title: String,
    pub description: String,
    pub destructive: bool,
}

impl HelpMessage {
    fn new(title: &str, description: impl Into<String>, destructive: bool) -> Self {
        Self {
            title: title.to_string(),
            description: description.into(),
            destructive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub push_name: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub session_name: String,
    pub badge: String,
    pub badge_variant: BadgeVariant,
    pub icon: StatusIcon,
    pub help: HelpMessage,
    pub qr_image: Option<String>,
    pub device: Option<DeviceInfo>,
    pub can_check: bool,
    pub can_start: bool,
    pub can_delete: bool,
    pub auto_refresh: bool,
    pub last_check: Option<String>,
}

impl SessionView {
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        let status = snapshot.session.as_ref().map(|s| s.status);
        let has_name = !snapshot.session_name.is_empty();

        let qr_image = match status {
            Some(SessionStatus::ScanQrCode) => snapshot.qr_code.clone(),
            _ => None,
        };

        let device = snapshot
            .session
            .as_ref()
            .and_then(|s| s.me.as_ref())
            .map(|me| DeviceInfo {
                push_name: me.push_name.clone(),
                id: me.id.clone(),
            });

        let push_name = snapshot
            .session
            .as_ref()
            .and_then(|s| s.me.as_ref())
            .map(|me| me.push_name.as_str())
            .filter(|name| !name.is_empty());

        Self {
            session_name: snapshot.session_name.clone(),
            badge: status.map_or_else(|| NO_SESSION_BADGE.to_string(), |s| s.to_string()),
            badge_variant: badge_variant(status),
            icon: status_icon(status),
            help: help_message(status, push_name),
            qr_image,
            device,
            can_check: has_name && !snapshot.is_loading,
            can_start: has_name && !snapshot.is_loading,
            can_delete: snapshot.session.is_some() && !snapshot.is_loading,
            auto_refresh: snapshot.auto_refresh,
            last_check: snapshot.last_check.map(|t| t.format("%H:%M:%S").to_string()),
        }
    }

    /// Plain-text rendering of the status card
    pub fn render_text(&self, notice: Option<&Notice>) -> String {
        let mut out = String::new();
        let session_label = if self.session_name.is_empty() {
            "not configured"
        } else {
            self.session_name.as_str()
        };

        let _ = writeln!(out, "WhatsApp Business  {} [{}]", self.icon.glyph(), self.badge);
        let _ = writeln!(out, "Session: {}", session_label);

        if let Some(notice) = notice {
            let prefix = match notice.kind {
                NoticeKind::Error => "Error",
                NoticeKind::Success => "OK",
            };
            let _ = writeln!(out, "{}: {}", prefix, notice.message);
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "{}", self.help.title);
        let _ = writeln!(out, "  {}", self.help.description);

        if let Some(qr) = &self.qr_image {
            let _ = writeln!(out);
            let _ = writeln!(out, "QR code (scan with WhatsApp > Linked devices > Link a device):");
            let _ = writeln!(out, "  {}", qr);
        }

        if let Some(device) = &self.device {
            let _ = writeln!(out);
            let _ = writeln!(out, "Device: {}", device.push_name);
            let _ = writeln!(out, "WhatsApp ID: {}", device.id);
        }

        let _ = writeln!(out);
        let _ = write!(out, "Auto-refresh: {}", if self.auto_refresh { "on" } else { "off" });
        if let Some(last) = &self.last_check {
            let _ = write!(out, "  Last check: {}", last);
        }
        out.push('\n');

        out
    }
}

fn badge_variant(status: Option<SessionStatus>) -> BadgeVariant {
    match status {
        Some(SessionStatus::Working) => BadgeVariant::Default,
        Some(SessionStatus::Failed) => BadgeVariant::Destructive,
        _ => BadgeVariant::Secondary,
    }
}

fn status_icon(status: Option<SessionStatus>) -> StatusIcon {
    match status {
        Some(SessionStatus::Working) => StatusIcon::Connected,
        Some(SessionStatus::Starting) => StatusIcon::Pending,
        Some(SessionStatus::ScanQrCode) => StatusIcon::QrCode,
        Some(SessionStatus::Failed) => StatusIcon::Alert,
        Some(SessionStatus::Stopped) | Some(SessionStatus::Unknown) | None => StatusIcon::Disconnected,
    }
}

fn help_message(status: Option<SessionStatus>, push_name: Option<&str>) -> HelpMessage {
    match status {
        None => HelpMessage::new(
            "No session",
            "There is no active WhatsApp session. Use \"Connect\" to start one.",
            false,
        ),
        Some(SessionStatus::Working) => HelpMessage::new(
            "WhatsApp connected",
            format!(
                "WhatsApp is working correctly. Connected as: {}",
                push_name.unwrap_or("User")
            ),
            false,
        ),
        Some(SessionStatus::Starting) => HelpMessage::new(
            "Starting...",
            "The session is initializing. This can take a few moments.",
            false,
        ),
        Some(SessionStatus::ScanQrCode) => HelpMessage::new(
            "Scan the QR code",
            "Open WhatsApp on your phone, go to Settings > Linked devices > Link a device and scan this QR code.",
            false,
        ),
        Some(SessionStatus::Stopped) => HelpMessage::new(
            "Session stopped",
            "The WhatsApp session is stopped. Use \"Connect\" to restart it.",
            true,
        ),
        Some(SessionStatus::Failed) => HelpMessage::new(
            "Connection error",
            "Could not connect to WhatsApp. Try deleting the session and creating a new one.",
            true,
        ),
        Some(SessionStatus::Unknown) => HelpMessage::new(
            "Unknown status",
            "The WhatsApp status reported by the gateway is not recognized.",
            true,
        ),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Error,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    posted_at: Instant,
}

/// Inline banner: the latest error or success message, hidden after a delay
#[derive(Debug, Clone)]
pub struct Notices {
    clear_after: Duration,
    current: Option<Notice>,
}

impl Notices {
    pub fn new(clear_after: Duration) -> Self {
        Self {
            clear_after,
            current: None,
        }
    }

    /// Take an event from the manager; only errors and successes touch the banner
    pub fn apply(&mut self, event: &SessionEvent, now: Instant) {
        let (kind, message) = match event {
            SessionEvent::Error(message) => (NoticeKind::Error, message),
            SessionEvent::Success(message) => (NoticeKind::Success, message),
            _ => return,
        };

        // A new message replaces the other kind
        self.current = Some(Notice {
            kind,
            message: message.clone(),
            posted_at: now,
        });
    }

    pub fn visible(&self, now: Instant) -> Option<&Notice> {
        self.current
            .as_ref()
            .filter(|n| now.saturating_duration_since(n.posted_at) < self.clear_after)
    }

    pub fn error(&self, now: Instant) -> Option<&str> {
        self.visible(now)
            .filter(|n| n.kind == NoticeKind::Error)
            .map(|n| n.message.as_str())
    }
}
