//! Command-line driver for the connector.
//!
//! Runs a single upload-blob-metadata invocation against a named
//! connection from the YAML configuration and prints the structured
//! result payload.

use clap::Parser;
use tracing::info;

use azure_storage_connector::context::{self, MessageContext};
use azure_storage_connector::{ConnectionHandler, HostError};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "azure-storage-connector",
    version,
    about = "Replace user metadata on an Azure blob"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "connector.example.yaml")]
    config: String,

    /// Name of the connection to use.
    #[arg(long, default_value = "primary")]
    connection: String,

    /// Target container name.
    #[arg(long)]
    container: String,

    /// Target blob name.
    #[arg(long)]
    file: String,

    /// Metadata as a JSON object of string values.
    #[arg(long)]
    metadata: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = azure_storage_connector::config::load_config(&cli.config)?;
    init_tracing(&config.logging);
    info!("Loaded configuration from {}", cli.config);

    let handler = ConnectionHandler::from_config(&config);

    let mut ctx = MessageContext::new();
    ctx.set_property(context::CONNECTION_NAME, &cli.connection);
    ctx.set_property(context::CONTAINER_NAME, &cli.container);
    ctx.set_property(context::FILE_NAME, &cli.file);
    ctx.set_property(context::METADATA, &cli.metadata);

    let result =
        azure_storage_connector::operations::upload_metadata::connect(&handler, &mut ctx).await;

    if let Some(payload) = ctx.payload() {
        println!("{}", payload);
    }

    match result {
        Ok(()) => Ok(()),
        Err(HostError::Recoverable(message)) => Err(anyhow::anyhow!(message)),
        Err(HostError::Fatal(message)) => Err(anyhow::anyhow!(message)),
    }
}

/// Initialize tracing from the logging section, honoring `RUST_LOG`
/// when set.
fn init_tracing(logging: &azure_storage_connector::config::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(logging.level.clone()));

    if logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
