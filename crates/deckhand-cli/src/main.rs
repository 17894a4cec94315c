//! Deckhand CLI tool.

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "deckhand")]
#[command(about = "Compose applications into Kubernetes resource plans", long_about = None)]
struct Cli {
    /// Log output format
    #[arg(long, env = "DECKHAND_LOG_FORMAT", value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an application description
    Validate {
        /// Path to the application description
        #[arg(default_value = "app.kdl")]
        path: String,
        /// Also compose against this platform description
        #[arg(long)]
        platform: Option<String>,
        /// Name of the target cluster when composing
        #[arg(long, default_value = "default")]
        cluster: String,
    },
    /// Compose an application and print the resolved resource plan
    Render {
        /// Path to the application description
        #[arg(default_value = "app.kdl")]
        path: String,
        /// Path to the platform description
        #[arg(long, env = "DECKHAND_PLATFORM", default_value = "platform.kdl")]
        platform: String,
        /// Name of the target cluster
        #[arg(long, default_value = "default")]
        cluster: String,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Commands::Validate {
            path,
            platform,
            cluster,
        } => {
            commands::validate(&path, platform.as_deref(), &cluster).await?;
        }
        Commands::Render {
            path,
            platform,
            cluster,
        } => {
            commands::render::render(&path, &platform, &cluster).await?;
        }
    }

    Ok(())
}
