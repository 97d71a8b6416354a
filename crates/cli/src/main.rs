//! SecondBrain CLI, the main entry point.
//!
//! Commands:
//! - `onboard`  Write the default config
//! - `serve`    Start the HTTP gateway
//! - `ask`      Ask one question and stream the answer
//! - `chat`     Interactive chat against a running gateway
//! - `add`      Add a note, file or web page to the knowledge base
//! - `list`     List knowledge items and their processing status

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "secondbrain",
    about = "SecondBrain: chat with your personal knowledge base",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of ~/.secondbrain/config.toml
    #[arg(long, global = true, env = "SECONDBRAIN_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file
    Onboard,

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a single question
    Ask {
        /// The question
        #[arg(short, long)]
        message: String,

        /// Gateway base URL (defaults to the configured host and port)
        #[arg(long)]
        url: Option<String>,
    },

    /// Chat interactively
    Chat {
        #[arg(long)]
        url: Option<String>,
    },

    /// Add content to the knowledge base
    Add {
        /// Free text note
        #[arg(long, conflicts_with_all = ["url", "file"])]
        text: Option<String>,

        /// Web page to extract
        #[arg(long, conflicts_with = "file")]
        url: Option<String>,

        /// File path readable by the gateway
        #[arg(long)]
        file: Option<String>,

        #[arg(long)]
        title: Option<String>,

        /// document, audio, web, text or image; inferred when omitted
        #[arg(long)]
        modality: Option<String>,

        /// Gateway base URL
        #[arg(long)]
        gateway: Option<String>,
    },

    /// List knowledge items
    List {
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Onboard => commands::onboard::run(config_path).await?,
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Ask { message, url } => commands::ask::run(config_path, &message, url).await?,
        Commands::Chat { url } => commands::chat::run(config_path, url).await?,
        Commands::Add {
            text,
            url,
            file,
            title,
            modality,
            gateway,
        } => {
            let source = commands::knowledge::Source::from_args(text, url, file)?;
            commands::knowledge::add(config_path, source, title, modality, gateway).await?
        }
        Commands::List { url } => commands::knowledge::list(config_path, url).await?,
    }

    Ok(())
}
