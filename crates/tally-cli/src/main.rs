use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tally_cli::commands::{catalog, connections, entries, providers};
use tally_cli::{App, Cli, Commands, Config};

async fn dispatch<W: Write>(writer: &mut W, app: &App, command: &Commands) -> Result<()> {
    let service = &app.service;
    let user = &app.user_id;
    match command {
        Commands::Providers { json } => providers::run(writer, service, *json),
        Commands::Connect { provider, token } => {
            connections::connect(writer, service, user, provider, token).await
        }
        Commands::Disconnect { connection_id } => {
            connections::disconnect(writer, service, user, connection_id).await
        }
        Commands::Connections { json } => connections::list(writer, service, user, *json).await,
        Commands::Workspaces { provider, json } => {
            catalog::workspaces(writer, service, user, provider, *json).await
        }
        Commands::Projects {
            provider,
            workspace,
            json,
        } => catalog::projects(writer, service, user, provider, workspace, *json).await,
        Commands::Clients {
            provider,
            workspace,
            json,
        } => catalog::clients(writer, service, user, provider, workspace, *json).await,
        Commands::Entries(args) => entries::run(writer, service, user, args).await,
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        // No subcommand, show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    let app = App::open(config, cli.user.as_deref())?;

    let runtime = tokio::runtime::Runtime::new().context("failed to initialize tokio runtime")?;
    let mut stdout = std::io::stdout().lock();
    runtime.block_on(dispatch(&mut stdout, &app, command))
}
