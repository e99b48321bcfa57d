use clinic_waha::{config, handlers, is_production};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up WAHA_WEBHOOK_PORT and friends
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = config::config();
    tracing::info!("Starting WAHA webhook receiver in {:?} mode", config.environment);
    if is_production!() && !config.webhook.enable_request_logging {
        tracing::info!("Request logging disabled");
    }

    let app = handlers::router(config);

    let bind_addr = format!("0.0.0.0:{}", config.webhook.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", bind_addr, e))?;

    tracing::info!("WAHA webhook receiver listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
