//! Infisical Secrets Bridge
//!
//! Serves the secrets plugin over HTTP, or resolves keys once from the
//! command line.
//!
//! # Usage
//! ```bash
//! # Serve plugin requests
//! infisical-secrets-bridge serve --bind 0.0.0.0:8080
//!
//! # Resolve keys once
//! INFISICAL_CLIENT_ID=... INFISICAL_CLIENT_SECRET=... \
//! infisical-secrets-bridge lookup \
//!   --url https://app.infisical.com \
//!   --project-id 6f1c... --environment prod \
//!   DB_PASS API_KEY
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

use infisical_secrets_bridge::config::{
    RawConfig, CLIENT_ID_KEY, CLIENT_SECRET_KEY, ENVIRONMENT_SLUG_KEY, PROJECT_ID_KEY,
    SECRET_PATH_KEY, URL_KEY,
};
use infisical_secrets_bridge::plugin::LookupRequestBody;
use infisical_secrets_bridge::settings::{HttpSettings, LogFormat};
use infisical_secrets_bridge::{server, InfisicalClient, LookupOrchestrator, LookupRequest, SecretsPlugin};

// ============================================================
// CLI Definition
// ============================================================

#[derive(Parser)]
#[command(name = "infisical-secrets-bridge")]
#[command(about = "Resolve secrets from Infisical for a plugin host", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, env = "BRIDGE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    #[command(flatten)]
    http: HttpSettings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve plugin requests over HTTP
    Serve {
        /// Address to listen on
        #[arg(long, env = "BRIDGE_BIND_ADDR", default_value = "0.0.0.0:8080")]
        bind: SocketAddr,
    },

    /// Resolve keys once and print them as JSON
    Lookup {
        /// Infisical instance URL
        #[arg(long, env = "INFISICAL_URL")]
        url: String,

        /// Universal Auth client ID
        #[arg(long, env = "INFISICAL_CLIENT_ID", hide_env_values = true)]
        client_id: String,

        /// Universal Auth client secret
        #[arg(long, env = "INFISICAL_CLIENT_SECRET", hide_env_values = true)]
        client_secret: String,

        /// Project (workspace) ID
        #[arg(long, env = "INFISICAL_PROJECT_ID")]
        project_id: String,

        /// Environment slug (e.g., dev, prod)
        #[arg(long, env = "INFISICAL_ENVIRONMENT")]
        environment: String,

        /// Folder path to list secrets from
        #[arg(long, env = "INFISICAL_SECRET_PATH")]
        secret_path: Option<String>,

        /// Secret keys to resolve
        #[arg(required = true)]
        keys: Vec<String>,
    },
}

// ============================================================
// Main Entry Point
// ============================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format)?;

    let client = InfisicalClient::new(&cli.http)?;
    let orchestrator = LookupOrchestrator::from_client(client);

    match cli.command {
        Commands::Serve { bind } => {
            info!(
                timeout_secs = cli.http.timeout_secs,
                "🚀 Starting Infisical secrets bridge"
            );
            server::serve(bind, SecretsPlugin::new(orchestrator)).await?;
        }

        Commands::Lookup {
            url,
            client_id,
            client_secret,
            project_id,
            environment,
            secret_path,
            keys,
        } => {
            let mut configuration = RawConfig::new();
            configuration.insert(URL_KEY.to_string(), url);
            configuration.insert(CLIENT_ID_KEY.to_string(), client_id);
            configuration.insert(CLIENT_SECRET_KEY.to_string(), client_secret);
            configuration.insert(PROJECT_ID_KEY.to_string(), project_id);
            configuration.insert(ENVIRONMENT_SLUG_KEY.to_string(), environment);
            if let Some(path) = secret_path {
                configuration.insert(SECRET_PATH_KEY.to_string(), path);
            }

            let request = LookupRequest::try_from(LookupRequestBody {
                configuration,
                keys,
            })?;
            let result = orchestrator.lookup(&request).await?;
            info!("✅ Resolved {} of {} keys", result.len(), request.keys.len());

            println!(
                "{}",
                serde_json::to_string_pretty(&result).context("Failed to encode lookup result")?
            );
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, format: LogFormat) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}
