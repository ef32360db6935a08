//! td-stream
//!
//! Command-line client for renting TensorDock marketplace GPU servers and
//! preparing them for game streaming.

mod cli;
mod commands;
mod output;
mod remote;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, InstallCommand, ServersCommand, StockCommand, WolfCommand};
use commands::{ConfigUpdate, Marketplace, ServerAction};
use remote::{ShellOptions, Task};
use std::path::Path;
use tensordock_core::MarketplaceConfig;
use tensordock_marketplace::MarketplaceClient;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => MarketplaceConfig::default_path()?,
    };

    // Loading runs before the subscriber exists; failures surface when the
    // settings are first needed.
    let settings = load_settings(&cli, &config_path);
    init_logging(settings.as_ref().map_or(cli.debug, |config| config.debug));

    run(cli, &config_path, settings).await
}

fn log_filter(debug: bool) -> &'static str {
    if debug {
        "warn,tensordock::wire=info,tensordock_core=debug,tensordock_marketplace=debug,td_stream=debug"
    } else {
        "warn"
    }
}

fn init_logging(debug: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter(debug))),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// The configuration file with command-line flags layered on top.
fn load_settings(cli: &Cli, config_path: &Path) -> Result<MarketplaceConfig> {
    Ok(cli.apply_overrides(MarketplaceConfig::load(config_path)?))
}

fn connect(
    settings: Result<MarketplaceConfig>,
    config_path: &Path,
) -> Result<(MarketplaceClient, MarketplaceConfig)> {
    let config = settings?;
    if !config_path.exists() {
        warn!("config file {} not found, using defaults", config_path.display());
    }
    let client = MarketplaceClient::from_config(&config)?;
    Ok((client, config))
}

async fn run(cli: Cli, config_path: &Path, settings: Result<MarketplaceConfig>) -> Result<()> {
    let (server, task, shell) = match cli.command {
        Commands::Config { service_url } => {
            let update = ConfigUpdate {
                api_key: cli.api_key,
                api_token: cli.api_token,
                service_url,
                key_path: cli.key_path,
            };
            println!("{}", commands::configure(config_path, update)?);
            return Ok(());
        }
        Commands::Servers(command) => {
            let (client, _) = connect(settings, config_path)?;
            println!("{}", servers(&client, command).await?);
            return Ok(());
        }
        Commands::Stock(StockCommand::List { all }) => {
            let (client, _) = connect(settings, config_path)?;
            println!("{}", commands::stock(&client, all).await?);
            return Ok(());
        }
        Commands::Billing => {
            let (client, _) = connect(settings, config_path)?;
            println!("{}", commands::billing(&client).await?);
            return Ok(());
        }
        Commands::Ssh {
            server,
            command,
            shell,
        } => (server, Task::Shell(command), shell),
        Commands::Setup { server, shell } => (server, Task::Setup, shell),
        Commands::Nvidia(InstallCommand::Install { server, shell }) => {
            (server, Task::NvidiaInstall, shell)
        }
        Commands::Vpn(InstallCommand::Install { server, shell }) => {
            (server, Task::VpnInstall, shell)
        }
        Commands::Wolf(WolfCommand::Install { server, shell }) => {
            (server, Task::WolfInstall, shell)
        }
        Commands::Wolf(WolfCommand::Logs { server, shell }) => (server, Task::WolfLogs, shell),
    };

    let (client, config) = connect(settings, config_path)?;
    run_remote(&client, &server, &task, &shell.options(&config.key_path)).await
}

async fn servers(api: &dyn Marketplace, command: ServersCommand) -> Result<String> {
    match command {
        ServersCommand::List => commands::list_servers(api).await,
        ServersCommand::Info { server } => commands::server_info(api, &server).await,
        ServersCommand::Status { server } => commands::server_status(api, &server).await,
        ServersCommand::Start { server } => {
            commands::server_action(api, ServerAction::Start, &server).await
        }
        ServersCommand::Stop { server } => {
            commands::server_action(api, ServerAction::Stop, &server).await
        }
        ServersCommand::Restart { server } => {
            commands::server_action(api, ServerAction::Restart, &server).await
        }
        ServersCommand::Delete { server } => {
            commands::server_action(api, ServerAction::Delete, &server).await
        }
        ServersCommand::Deploy(args) => commands::deploy(api, &args.into()).await,
        ServersCommand::Modify(args) => commands::modify(api, &args.into()).await,
    }
}

async fn run_remote(
    api: &dyn Marketplace,
    server: &str,
    task: &Task,
    options: &ShellOptions,
) -> Result<()> {
    for step in commands::remote_plan(api, server, task, options).await? {
        step.run()?;
    }
    Ok(())
}
