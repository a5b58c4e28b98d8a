// Windows Services Observer
// Main entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use winsvc_observer::app::{App, RunMode};
use winsvc_observer::config::Config;
use winsvc_observer::host::{self, LaunchOverrides};
use winsvc_observer::logging::{self, DiagnosticsSink, LogOptions};
use winsvc_observer::version::build_info;

#[derive(Parser, Debug)]
#[command(name = "winsvc-observer")]
#[command(author, about, long_about = None)]
#[command(disable_version_flag = true)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Service to monitor (repeatable, replaces the configured list)
    #[arg(short = 's', long = "service", global = true)]
    services: Vec<String>,

    /// Collection interval in seconds
    #[arg(short, long, global = true)]
    interval: Option<u64>,

    /// Metrics endpoint port for the selected mode
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Show version information
    #[arg(short = 'V', long)]
    version: bool,

    /// Show detailed build information
    #[arg(long)]
    build_info: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Collect in the foreground until Ctrl-C (default)
    Run,
    /// Run a single collection pass and print the totals
    Check,
    /// Entry point used by the Windows service control manager
    Service,
    /// Register the observer with the service control manager.
    /// --service, --interval and --port are kept in its launch arguments.
    Install,
    /// Unregister the observer service
    Remove,
    /// Start the registered observer service
    Start,
    /// Stop the registered observer service
    Stop,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("{}", build_info().format_display());
        return Ok(());
    }

    if cli.build_info {
        println!("{}", build_info().format_display());
        println!("\n{}", build_info().format_build_info());
        return Ok(());
    }

    let command = cli.command.unwrap_or(Command::Run);
    let mut config = Config::load(cli.config.clone())?;
    apply_overrides(&cli, command, &mut config);

    if cli.debug {
        config.log_level = "debug".to_string();
    }

    let diagnostics = if command == Command::Service {
        DiagnosticsSink::File(config.status_log_path.with_file_name("winsvc-observer.log"))
    } else {
        DiagnosticsSink::Stderr
    };
    logging::init(&LogOptions {
        level: config.log_level.clone(),
        status_log_path: config.status_log_path.clone(),
        diagnostics,
    })?;

    match command {
        Command::Run => run_foreground(config).await,
        Command::Check => run_check(config).await,
        Command::Service => host::run_dispatcher(config),
        Command::Install => {
            let overrides = LaunchOverrides {
                services: cli.services.clone(),
                interval: cli.interval,
                port: cli.port,
            };
            host::install(cli.config, &overrides)
        }
        Command::Remove => host::remove(),
        Command::Start => host::start(),
        Command::Stop => host::stop(),
    }
}

fn apply_overrides(cli: &Cli, command: Command, config: &mut Config) {
    if !cli.services.is_empty() {
        config.services = cli.services.clone();
    }
    if let Some(interval) = cli.interval {
        config.interval_secs = interval;
    }
    if let Some(port) = cli.port {
        match command {
            Command::Service | Command::Install => config.service_port = port,
            _ => config.foreground_port = port,
        }
    }
}

async fn run_foreground(config: Config) -> Result<()> {
    let app = App::new(config, RunMode::Foreground)?;

    let stop = app.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, finishing current pass");
            stop.stop();
        }
    });

    app.run().await
}

async fn run_check(config: Config) -> Result<()> {
    let app = App::new(config, RunMode::Foreground)?;
    let snapshot = app.check().await?;
    println!("{}", snapshot.summary());
    Ok(())
}
