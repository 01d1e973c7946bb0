//! toolloop CLI: the main entry point.
//!
//! Commands:
//! - `functions`: list the registered functions
//! - `config`: show, locate or validate the configuration
//! - `demo`: run an offline conversation against the helper functions

use clap::{Parser, Subcommand};

mod commands;
mod demo_provider;

#[derive(Parser)]
#[command(
    name = "toolloop",
    about = "toolloop: let a language model call your functions",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered functions
    Functions {
        /// Only show this namespace
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run a demo conversation with a scripted offline model
    Demo {
        /// City to ask about
        #[arg(short, long, default_value = "Paris")]
        city: String,

        /// Consume the model output as a stream
        #[arg(long)]
        stream: bool,

        /// Suspend on tool calls and supply the results from the CLI
        #[arg(long)]
        manual: bool,

        /// Override the tool-call budget per user turn
        #[arg(long)]
        max_iterations: Option<u32>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
    /// Validate the configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Functions { namespace } => commands::functions::run(namespace.as_deref()).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
        },
        Commands::Demo {
            city,
            stream,
            manual,
            max_iterations,
        } => {
            commands::demo::run(commands::demo::DemoOptions {
                city,
                stream,
                manual,
                max_iterations,
            })
            .await?
        }
    }

    Ok(())
}
