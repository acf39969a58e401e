use anyhow::Result;
use clap::{Parser, Subcommand};
use logicsrv::{check, compile, config, logging, serve, shutdown};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML, TOML or JSON)
    #[arg(short, long, value_name = "FILE", env = "LOGICSRV_CONFIG")]
    config: Option<PathBuf>,

    /// Log level override (RUST_LOG still takes precedence)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run rules over JSON-lines updates on stdin, writing outputs to stdout
    Run,

    /// Compile every configured rule and report which would start
    Check,

    /// Print the prefix form of an infix expression
    Compile {
        /// Infix expression, e.g. "[0,1] and not [0,2]"
        expression: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = config::load(args.config.as_deref())?;
    let _log_guard = logging::init_logging(&config.logging, args.log_level.as_deref())?;

    match args.command {
        Some(Commands::Run) | None => {
            info!("Starting logicsrv");
            let summary = serve(
                &config,
                tokio::io::stdin(),
                tokio::io::stdout(),
                shutdown::wait_for_shutdown(),
            )
            .await?;
            info!(
                "Stopped: {} rules, {} updates, {} outputs",
                summary.report.activated.len(),
                summary.updates,
                summary.outputs
            );
        },
        Some(Commands::Check) => {
            let report = check(&config)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        },
        Some(Commands::Compile { expression }) => {
            println!("{}", compile(&expression)?);
        },
    }

    Ok(())
}
