//! `crashrec` - CLI for crashrecorder
//!
//! This binary runs the recorder against an in-process bus fed by JSON lines on
//! stdin, and provides commands for inspecting configuration.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tracing::{error, info, warn};

use crashrecorder::bridge;
use crashrecorder::cli::{Cli, Command, ConfigCommand};
use crashrecorder::{init_logging, Config, EventBus, LocalBus, Recorder};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    match cli.command {
        Command::Run(run_cmd) => {
            let mut config = Config::load_from(cli.config.clone())?;
            run_cmd.apply(&mut config);
            config.validate()?;
            handle_run(config)
        }
        Command::Config(config_cmd) => handle_config(cli.config, config_cmd),
    }
}

fn handle_run(config: Config) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(run(config))
}

async fn run(config: Config) -> anyhow::Result<()> {
    let bus = Arc::new(LocalBus::new());
    let response_topic = config.channels.response.clone();

    let responses = bus.subscribe_topic(&response_topic).await?;
    let output = tokio::spawn(async move {
        bridge::pump_output(responses, &response_topic, tokio::io::stdout()).await
    });

    let input_bus = LocalBus::clone(&bus);
    tokio::spawn(async move {
        match bridge::pump_input(BufReader::new(tokio::io::stdin()), input_bus).await {
            Ok(routed) => info!(routed, "Input closed; recording continues until interrupted"),
            Err(e) => warn!(error = %e, "Input bridge failed"),
        }
    });

    let recorder = Recorder::new(config, Arc::clone(&bus), Arc::clone(&bus));
    let handle = recorder.handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Interrupt received, stopping"),
            Err(e) => error!(error = %e, "Failed to listen for interrupt, stopping"),
        }
        handle.stop();
    });

    let result = recorder.run().await;
    output.abort();

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_fatal() => {
            error!(error = %e, "Recorder died");
            Err(e).context("recorder died while running")
        }
        Err(e) => Err(e).context("recorder failed to start"),
    }
}

fn handle_config(
    config_path: Option<std::path::PathBuf>,
    cmd: ConfigCommand,
) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(config_path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Sampler]");
                println!("  Period (ms):        {}", config.sampler.period_ms);
                println!("  Capacity:           {}", config.sampler.capacity);
                println!();
                println!("[Channels]");
                println!("  Trigger:            {}", config.channels.trigger);
                println!("  Response:           {}", config.channels.response);
                println!();
                println!("[Signals]");
                for signal in crashrecorder::Signal::ALL {
                    println!("  {:<20}{}", format!("{signal}:"), config.signals.path(signal));
                }
                println!();
                println!("[Output]");
                println!("  Path:               {}", config.output_path().display());
                println!();
                println!("[Trigger]");
                println!("  Ack on failure:     {}", config.trigger.ack_on_failure);
                println!("  Ack on no-op:       {}", config.trigger.ack_on_noop);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file
                .or(config_path)
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
