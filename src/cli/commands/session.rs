use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::cli::commands::config::open_store;
use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::error::WahaError;
use crate::presentation::{Notices, SessionView};
use crate::session::{SessionEvent, SessionManager};
use crate::types::ClinicIdentity;

/// Store lookups are blocking file I/O
async fn manager_for(clinic: &ClinicIdentity) -> anyhow::Result<Arc<SessionManager>> {
    let clinic = clinic.clone();
    tokio::task::spawn_blocking(move || -> anyhow::Result<Arc<SessionManager>> {
        let store = open_store()?;
        Ok(SessionManager::for_clinic(&clinic, &store, config())?)
    })
    .await?
}

fn drain(events: &mut broadcast::Receiver<SessionEvent>, notices: &mut Notices) {
    let now = Instant::now();
    while let Ok(event) = events.try_recv() {
        notices.apply(&event, now);
    }
}

fn render(manager: &SessionManager, notices: &Notices, output_format: &OutputFormat) -> anyhow::Result<()> {
    let snapshot = manager.snapshot();
    let view = SessionView::from_snapshot(&snapshot);

    match output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "success": true,
                    "session": snapshot.session,
                    "view": view,
                }))?
            );
        }
        OutputFormat::Text => {
            print!("{}", view.render_text(notices.visible(Instant::now())));
        }
    }
    Ok(())
}

/// Render the outcome of one manager call and release the manager
fn finish(
    manager: &SessionManager,
    mut events: broadcast::Receiver<SessionEvent>,
    result: Result<(), WahaError>,
    output_format: &OutputFormat,
) -> anyhow::Result<()> {
    let mut notices = Notices::new(config().notice_clear_delay());
    drain(&mut events, &mut notices);

    let outcome = match result {
        Ok(()) => render(manager, &notices, output_format),
        Err(WahaError::Aborted) => output_success(output_format, "Nothing deleted", Some(json!({ "aborted": true }))),
        Err(e) => {
            let message = notices
                .error(Instant::now())
                .map(str::to_string)
                .unwrap_or_else(|| e.to_string());

            if let OutputFormat::Json = output_format {
                output_error(output_format, &message, Some(e.error_code()))?;
            }
            Err(anyhow::anyhow!(message))
        }
    };

    manager.cleanup();
    outcome
}

pub async fn status(clinic: &ClinicIdentity, output_format: OutputFormat) -> anyhow::Result<()> {
    let manager = manager_for(clinic).await?;
    let events = manager.subscribe();

    let result = manager.check_session(false).await.map(|_| ());
    finish(&manager, events, result, &output_format)
}

pub async fn start(clinic: &ClinicIdentity, output_format: OutputFormat) -> anyhow::Result<()> {
    let manager = manager_for(clinic).await?;
    let events = manager.subscribe();

    let result = manager.start_and_get_qr().await.map(|_| ());
    finish(&manager, events, result, &output_format)
}

pub async fn stop(clinic: &ClinicIdentity, output_format: OutputFormat) -> anyhow::Result<()> {
    let manager = manager_for(clinic).await?;
    let events = manager.subscribe();

    let result = manager.stop_session().await;
    finish(&manager, events, result, &output_format)
}

pub async fn restart(clinic: &ClinicIdentity, output_format: OutputFormat) -> anyhow::Result<()> {
    let manager = manager_for(clinic).await?;
    let events = manager.subscribe();

    let result = manager.restart_session().await.map(|_| ());
    finish(&manager, events, result, &output_format)
}

pub async fn create(clinic: &ClinicIdentity, output_format: OutputFormat) -> anyhow::Result<()> {
    let manager = manager_for(clinic).await?;
    let events = manager.subscribe();

    let result = manager.create_session().await.map(|_| ());
    finish(&manager, events, result, &output_format)
}

pub async fn ping(clinic: &ClinicIdentity, output_format: OutputFormat) -> anyhow::Result<()> {
    let manager = manager_for(clinic).await?;
    let events = manager.subscribe();

    let result = manager.test_connection().await;
    finish(&manager, events, result, &output_format)
}

pub async fn delete(clinic: &ClinicIdentity, yes: bool, output_format: OutputFormat) -> anyhow::Result<()> {
    let manager = manager_for(clinic).await?;
    let events = manager.subscribe();

    let confirmed = yes || {
        let prompt = format!(
            "Delete WhatsApp session '{}'? This will disconnect WhatsApp from this device.",
            manager.session_name()
        );
        tokio::task::spawn_blocking(move || confirm(&prompt)).await?
    };

    let result = manager.delete_session(|_| confirmed).await;
    finish(&manager, events, result, &output_format)
}

pub async fn qr(clinic: &ClinicIdentity, output_format: OutputFormat) -> anyhow::Result<()> {
    let manager = manager_for(clinic).await?;
    let events = manager.subscribe();

    if let Err(e) = manager.check_session(false).await {
        return finish(&manager, events, Err(e), &output_format);
    }

    let snapshot = manager.snapshot();
    manager.cleanup();

    match (snapshot.qr_code, snapshot.session) {
        (Some(qr), _) => match output_format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&json!({ "success": true, "qr": qr }))?),
            OutputFormat::Text => println!("{}", qr),
        },
        (None, Some(session)) => output_success(
            &output_format,
            &format!("Session '{}' is {}, no QR code pending", session.name, session.status),
            Some(json!({ "qr": null, "status": session.status })),
        )?,
        (None, None) => output_success(
            &output_format,
            "No WhatsApp session exists yet, run 'waha start' first",
            Some(json!({ "qr": null })),
        )?,
    }
    Ok(())
}

pub async fn watch(clinic: &ClinicIdentity, output_format: OutputFormat) -> anyhow::Result<()> {
    let manager = manager_for(clinic).await?;
    let mut events = manager.subscribe();
    let mut notices = Notices::new(config().notice_clear_delay());

    if let Err(e) = manager.check_session(false).await {
        tracing::warn!("Initial session check failed: {}", e);
    }
    drain(&mut events, &mut notices);
    render(&manager, &notices, &output_format)?;

    if !manager.set_auto_refresh(true) {
        manager.cleanup();
        anyhow::bail!("No WhatsApp session name configured, pass --clinic or --subscriber");
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => {
                    notices.apply(&event, Instant::now());
                    if matches!(event, SessionEvent::SessionUpdated { .. }) {
                        render(&manager, &notices, &output_format)?;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Watch fell behind by {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    manager.cleanup();
    Ok(())
}
