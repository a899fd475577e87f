#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use modkit_mtls::{HttpClient, MtlsClientConfig, build_tls_context};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Prefix of environment variables overriding the YAML file (`MTLS__POOL__IDLE_TIMEOUT=30s`)
const ENV_PREFIX: &str = "MTLS__";

/// mTLS probe - validate a merged-trust client configuration against a server
#[derive(Parser)]
#[command(name = "mtls-probe")]
#[command(about = "mTLS probe - validate a merged-trust client configuration against a server")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load identity and trust stores and build the TLS context, then exit
    Check,
    /// Issue one GET request and print the response status
    Get {
        /// Absolute `https://` URL
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if let Some(ref path) = cli.config
        && !path.is_file()
    {
        anyhow::bail!("config file does not exist: {}", path.display());
    }

    let config = load_config(cli.config.as_deref(), Env::prefixed(ENV_PREFIX).split("__"))?;

    match cli.command {
        Commands::Check => {
            let context = build_tls_context(&config).context("TLS setup failed")?;
            tracing::info!(protocol = %context.protocol(), "configuration is valid");
            println!("ok: TLS context built for {}", context.protocol());
        }
        Commands::Get { url } => {
            let client = HttpClient::builder(config)
                .build()
                .context("failed to build mTLS client")?;
            let response = client
                .get(&url)
                .await
                .with_context(|| format!("GET {url} failed"))?;
            tracing::debug!(headers = ?response.headers(), "response headers");
            println!("{}", response.status());
        }
    }

    Ok(())
}

/// Layered configuration: YAML file (if provided), then environment overrides.
fn load_config(path: Option<&Path>, env: Env) -> Result<MtlsClientConfig> {
    let mut figment = Figment::new();
    if let Some(path) = path {
        figment = figment.merge(Yaml::file(path));
    }
    figment
        .merge(env)
        .extract()
        .context("invalid mTLS client configuration")
}

fn verbosity_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// `RUST_LOG` wins over `-v` when set.
fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity_filter(verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
