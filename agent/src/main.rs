//! DDI Agent - Entry Point
//!
//! Polls an update server over the device integration API, installs the
//! firmware it deploys and reports the outcome back.

use std::collections::HashMap;
use std::env;
use std::process::ExitCode;

use anyhow::Context;
use ddi_agent::app::options::AppOptions;
use ddi_agent::app::run::{run, RunExit};
use ddi_agent::logs::{init_logging, LogOptions};
use ddi_agent::storage::settings::{Settings, DEFAULT_SETTINGS_PATH};
use ddi_agent::utils::version_info;

use tracing::{error, info};

/// Exit code asking the supervisor to start the agent again
const RESTART_EXIT_CODE: u8 = 75;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => eprintln!("{}", e),
        }
        return ExitCode::SUCCESS;
    }

    match run_agent(&cli_args).await {
        Ok(RunExit::Shutdown) => ExitCode::SUCCESS,
        Ok(RunExit::Restart) => {
            info!("Exiting for restart");
            ExitCode::from(RESTART_EXIT_CODE)
        }
        Err(e) => {
            error!("Failed to run the agent: {:#}", e);
            eprintln!("ddi-agent: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_agent(cli_args: &HashMap<String, String>) -> anyhow::Result<RunExit> {
    // Retrieve the settings file
    let settings_path = cli_args
        .get("settings")
        .map(String::as_str)
        .unwrap_or(DEFAULT_SETTINGS_PATH);
    let settings = Settings::load(settings_path)
        .await
        .with_context(|| format!("Unable to load settings from {}", settings_path))?;

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        log_dir: settings.log_dir.clone(),
        json_format: settings.json_logs,
        ..Default::default()
    };
    let _log_guard = init_logging(log_options).context("Failed to initialize logging")?;

    let options = AppOptions::from_settings(&settings);
    info!("Running DDI Agent with options: {:?}", options);

    let exit = run(options, await_shutdown_signal()).await?;
    Ok(exit)
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Unable to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("Ctrl+C received, shutting down...");
    }
}
