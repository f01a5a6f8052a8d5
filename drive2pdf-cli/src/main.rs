//! drive2pdf — batch office-document to PDF conversion via Google Drive.
//!
//! Uploads each supported file in the input directory with an import MIME
//! type so Drive converts it, exports the result as PDF into the output
//! directory, and deletes the temporary cloud copy.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use bridge_http::ReqwestHttpClient;
use core_auth::{ClientCredentials, CredentialProvider, ServiceAccountKey, TokenStore};
use core_batch::BatchRunner;
use core_runtime::logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
use core_runtime::ConvertConfig;
use provider_google_drive::DriveConnector;

#[derive(Parser, Debug)]
#[command(
    name = "drive2pdf",
    version,
    about = "Convert office documents to PDF via Google Drive import/export"
)]
struct Cli {
    /// Directory containing source office documents
    #[arg(long, default_value = "input")]
    input: PathBuf,

    /// Directory receiving exported PDFs
    #[arg(long, default_value = "output")]
    output: PathBuf,

    /// Path of the persisted OAuth token file
    #[arg(long, default_value = "token.json")]
    token: PathBuf,

    /// Authenticate with a service-account key file instead of the
    /// interactive browser flow
    #[arg(long, value_name = "KEY.json")]
    service_account: Option<PathBuf>,

    /// Number of files converted concurrently
    #[arg(short = 'j', long, default_value_t = 4)]
    concurrency: usize,

    /// Attempt budget per file
    #[arg(long, default_value_t = 3)]
    attempts: u32,

    /// Emit logs as JSON instead of the compact format
    #[arg(long)]
    json_logs: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LogLevel::Info,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    if let Err(e) = init_logging(
        LoggingConfig::default()
            .with_level(level)
            .with_format(format),
    ) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::from(1);
    }

    tokio::select! {
        result = run(cli) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!("Fatal error: {e:?}");
                ExitCode::from(1)
            }
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted.");
            ExitCode::from(130)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = ConvertConfig::builder()
        .input_dir(&cli.input)
        .output_dir(&cli.output)
        .token_path(&cli.token)
        .max_concurrent(cli.concurrency)
        .max_attempts(cli.attempts)
        .build()
        .context("Invalid configuration")?;

    ensure_directories(&config).await?;

    let http_client = Arc::new(ReqwestHttpClient::new());

    let credentials = match &cli.service_account {
        Some(key_path) => {
            let key = ServiceAccountKey::from_file(key_path)
                .await
                .context("Failed to load service-account key")?;
            CredentialProvider::service_account(key, http_client.clone())
        }
        None => {
            let client_credentials =
                ClientCredentials::from_env().context("OAuth client credentials unavailable")?;
            CredentialProvider::interactive(
                client_credentials,
                TokenStore::new(&config.token_path),
                http_client.clone(),
            )
        }
    };

    credentials
        .authorize()
        .await
        .context("Authorization failed")?;

    let connector = DriveConnector::with_chunk_size(http_client, config.upload_chunk_bytes);
    let runner = BatchRunner::new(connector, Arc::new(credentials), config.clone());

    let summary = runner.run().await.context("Batch run failed")?;

    info!("Batch summary: {summary}");
    info!("Done.");
    info!(
        "Place additional files in '{}' and run again.",
        config.input_dir.display()
    );

    Ok(())
}

async fn ensure_directories(config: &ConvertConfig) -> Result<()> {
    tokio::fs::create_dir_all(&config.input_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.input_dir.display()))?;
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.output_dir.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["drive2pdf"]);

        assert_eq!(cli.input, PathBuf::from("input"));
        assert_eq!(cli.output, PathBuf::from("output"));
        assert_eq!(cli.token, PathBuf::from("token.json"));
        assert_eq!(cli.concurrency, 4);
        assert_eq!(cli.attempts, 3);
        assert!(cli.service_account.is_none());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "drive2pdf",
            "--input",
            "/docs",
            "--output",
            "/pdfs",
            "-j",
            "8",
            "--attempts",
            "5",
            "--service-account",
            "key.json",
            "-vv",
        ]);

        assert_eq!(cli.input, PathBuf::from("/docs"));
        assert_eq!(cli.output, PathBuf::from("/pdfs"));
        assert_eq!(cli.concurrency, 8);
        assert_eq!(cli.attempts, 5);
        assert_eq!(cli.service_account, Some(PathBuf::from("key.json")));
        assert_eq!(cli.verbose, 2);
    }
}
