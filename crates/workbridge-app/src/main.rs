use std::io::IsTerminal;

use anyhow::{Context, Result};
use integration_azure_devops::{
    build_provider_with_config, AzCliClientConfig, RemoteProviderFactoryConfig,
};
use tracing::debug;
use workbridge_app::{
    execute, parse_cli_args, print_cli_help, CliCommand, Workbridge, WorkbridgeSettings,
};
use workbridge_config::WorkbridgeConfig;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = parse_cli_args(std::env::args().skip(1))?;
    if args.command == CliCommand::Help {
        print_cli_help();
        return Ok(());
    }

    let config = workbridge_config::load_from_env().context("loading workbridge config")?;
    debug!(provider = %config.remote_provider, "loaded configuration");
    let client = build_provider_with_config(
        &config.remote_provider,
        RemoteProviderFactoryConfig {
            azure_cli: azure_cli_config(&config),
        },
    )?
    .into_client();
    let app = Workbridge::new(client, WorkbridgeSettings::from_config(&config))?;

    let output = execute(&app, &args).await?;
    for warning in &output.warnings {
        eprintln!("warning: {}: {}", warning.subject, warning.message);
    }
    println!("{}", output.stdout);

    Ok(())
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();
}

fn azure_cli_config(config: &WorkbridgeConfig) -> AzCliClientConfig {
    let settings = config.azure_cli_settings();
    AzCliClientConfig {
        binary: settings.binary.into(),
        allow_unsafe_command_paths: settings.allow_unsafe_command_paths,
        command_timeout: settings.command_timeout,
        organization: config.repository_settings().organization,
    }
}
