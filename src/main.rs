use anyhow::Result;
use clap::Parser;
use neo_debugger::cli::{Cli, Commands};
use neo_debugger::DebuggerConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();
    let verbosity = cli.verbosity();

    // Initialize logging with verbosity-aware level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| verbosity.to_log_level().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = DebuggerConfig::discover(cli.config.as_deref())?;
    tracing::debug!(?config, "configuration");

    match cli.command {
        Commands::Inspect(args) => {
            neo_debugger::cli::commands::inspect(args, verbosity)?;
        }
        Commands::CheckBreakpoints(args) => {
            neo_debugger::cli::commands::check_breakpoints(args, verbosity)?;
        }
    }

    Ok(())
}
