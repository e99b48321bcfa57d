pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::types::ClinicIdentity;

#[derive(Parser)]
#[command(name = "waha")]
#[command(about = "WhatsApp (WAHA) session control for clinic dashboards")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, help = "Clinic id (defaults to WAHA_CLINIC_ID)")]
    pub clinic: Option<String>,

    #[arg(long, global = true, help = "Clinic subscriber name used as session name (defaults to WAHA_SUBSCRIBER)")]
    pub subscriber: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Check the WhatsApp session status")]
    Status,

    #[command(about = "Start the session and show the pairing QR code")]
    Start,

    #[command(about = "Create the session on the gateway after a connectivity check")]
    Create,

    #[command(about = "Check that the gateway is reachable and accepts the API key")]
    Ping,

    #[command(about = "Stop the session")]
    Stop,

    #[command(about = "Restart the session and re-check its status")]
    Restart,

    #[command(about = "Delete the session (disconnects WhatsApp from this device)")]
    Delete {
        #[arg(long, short, help = "Skip the confirmation prompt")]
        yes: bool,
    },

    #[command(about = "Show the current QR code if the session is waiting for a scan")]
    Qr,

    #[command(about = "Keep checking the session on the refresh period until Ctrl-C")]
    Watch,

    #[command(about = "Per-clinic gateway configuration")]
    Config {
        #[command(subcommand)]
        cmd: commands::config::ConfigCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Clinic identity from flags, falling back to the environment
pub fn clinic_from_cli(cli: &Cli) -> ClinicIdentity {
    let clinic_id = cli
        .clinic
        .clone()
        .or_else(|| std::env::var("WAHA_CLINIC_ID").ok())
        .unwrap_or_default();
    let subscriber = cli
        .subscriber
        .clone()
        .or_else(|| std::env::var("WAHA_SUBSCRIBER").ok());

    ClinicIdentity::new(clinic_id, subscriber)
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let clinic = clinic_from_cli(&cli);

    match cli.command {
        Commands::Config { cmd } => commands::config::handle(cmd, &clinic, output_format).await,
        Commands::Status => commands::session::status(&clinic, output_format).await,
        Commands::Start => commands::session::start(&clinic, output_format).await,
        Commands::Create => commands::session::create(&clinic, output_format).await,
        Commands::Ping => commands::session::ping(&clinic, output_format).await,
        Commands::Stop => commands::session::stop(&clinic, output_format).await,
        Commands::Restart => commands::session::restart(&clinic, output_format).await,
        Commands::Delete { yes } => commands::session::delete(&clinic, yes, output_format).await,
        Commands::Qr => commands::session::qr(&clinic, output_format).await,
        Commands::Watch => commands::session::watch(&clinic, output_format).await,
    }
}
