use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::store::{ConfigStore, FileStore, GatewayConfig, StoreKey};
use crate::types::ClinicIdentity;

#[derive(Subcommand)]
pub enum ConfigCommands {
    #[command(about = "Show the gateway the current clinic resolves to")]
    Get,

    #[command(about = "Store gateway URL and API key for the clinic (or globally)")]
    Set {
        #[arg(help = "Gateway base URL, e.g. http://localhost:3000")]
        url: String,
        #[arg(help = "Gateway API key")]
        api_key: String,
        #[arg(long, help = "Store as the fallback for every clinic")]
        global: bool,
    },

    #[command(about = "Remove the stored gateway for the clinic (or the global fallback)")]
    Clear {
        #[arg(long, help = "Remove the global fallback instead")]
        global: bool,
    },
}

pub fn open_store() -> anyhow::Result<FileStore> {
    Ok(FileStore::open_default(config().store.config_dir.as_deref())?)
}

fn target_key(clinic: &ClinicIdentity, global: bool) -> anyhow::Result<StoreKey> {
    if global {
        return Ok(StoreKey::Global);
    }

    let clinic_id = clinic.clinic_id.trim();
    if clinic_id.is_empty() {
        anyhow::bail!("No clinic selected, pass --clinic <id> or --global");
    }
    Ok(StoreKey::clinic(clinic_id))
}

pub async fn handle(cmd: ConfigCommands, clinic: &ClinicIdentity, output_format: OutputFormat) -> anyhow::Result<()> {
    let clinic = clinic.clone();
    tokio::task::spawn_blocking(move || handle_blocking(cmd, &clinic, output_format)).await?
}

fn handle_blocking(cmd: ConfigCommands, clinic: &ClinicIdentity, output_format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store()?;

    match cmd {
        ConfigCommands::Get => {
            let (gateway, source) = store.resolve(Some(clinic.clinic_id.as_str()), &config().gateway);

            match output_format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&json!({
                            "clinic_id": clinic.clinic_id,
                            "session_name": clinic.session_name(),
                            "url": gateway.url,
                            "api_key": mask_secret(&gateway.api_key),
                            "source": source,
                        }))?
                    );
                }
                OutputFormat::Text => {
                    println!("Clinic: {}", if clinic.clinic_id.is_empty() { "(none)" } else { clinic.clinic_id.as_str() });
                    println!("Session: {}", clinic.session_name());
                    println!("URL: {}", gateway.url);
                    println!("API key: {}", mask_secret(&gateway.api_key));
                    println!("Source: {:?}", source);
                }
            }
            Ok(())
        }
        ConfigCommands::Set { url, api_key, global } => {
            let key = target_key(clinic, global)?;
            let gateway = GatewayConfig::new(url, api_key);
            gateway.validate()?;

            store.set(&key, gateway.clone())?;
            tracing::info!("Stored gateway {} under {}", gateway.url, key.as_key());

            output_success(
                &output_format,
                &format!("Gateway saved for {}", key.as_key()),
                Some(json!({ "key": key.as_key(), "url": gateway.url })),
            )
        }
        ConfigCommands::Clear { global } => {
            let key = target_key(clinic, global)?;

            if !store.remove(&key)? {
                return Err(anyhow::anyhow!("No gateway stored under {}", key.as_key()));
            }

            output_success(
                &output_format,
                &format!("Gateway removed for {}", key.as_key()),
                Some(json!({ "key": key.as_key() })),
            )
        }
    }
}
