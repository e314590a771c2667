//! farewatch agent
//!
//! Long-running daemon that schedules flight check-ins and watches for
//! fare drops. One monitor task runs per configured account and per
//! directly-specified reservation; all of them shut down cooperatively on
//! Ctrl-C, reporting any flights left unchecked.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use farewatch_config::GlobalConfig;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use farewatch_agent::api::RestClient;
use farewatch_agent::notify::{HttpTransport, Notifier};
use farewatch_agent::orchestrator::Orchestrator;
use farewatch_agent::timer::SystemClock;

#[derive(Parser)]
#[command(
    name = "farewatch",
    version,
    about = "Schedules flight check-ins and watches for fare drops"
)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Airline API base URL
    #[arg(long, env = "FAREWATCH_API_URL", default_value = "https://api.airline.example")]
    api_url: String,

    /// Send a test message to every configured notification endpoint,
    /// then exit
    #[arg(long)]
    test_notifications: bool,

    /// Increase log verbosity
    #[arg(short, long)]
    verbose: bool,

    /// `USERNAME PASSWORD` to monitor one account, or
    /// `CONFIRMATION FIRST_NAME LAST_NAME` for one reservation
    #[arg(value_name = "ENTITY")]
    entity: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = match GlobalConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            print_error(&format!("Invalid configuration: {e}"));
            std::process::exit(2);
        }
    };

    let added = match cli.entity.as_slice() {
        [] => Ok(()),
        [username, password] => config.add_account(username, password),
        [confirmation, first_name, last_name] => {
            config.add_reservation(confirmation, first_name, last_name)
        }
        other => {
            print_error(&format!(
                "Expected USERNAME PASSWORD or CONFIRMATION FIRST_NAME LAST_NAME, \
                 got {} argument(s)",
                other.len()
            ));
            std::process::exit(2);
        }
    };
    if let Err(e) = added {
        print_error(&format!("Invalid command-line entity: {e}"));
        std::process::exit(2);
    }

    if cli.test_notifications {
        info!("Sending test notifications");
        let transport = Arc::new(HttpTransport::new());
        let mut settings = config.defaults.clone();
        settings.notifications = config.all_notification_endpoints();
        let notifier = Notifier::new(&settings, "farewatch", transport);
        notifier.send_test().await;
        return Ok(());
    }

    if config.accounts.is_empty() && config.reservations.is_empty() {
        print_error("Nothing to monitor: no accounts or reservations configured");
        std::process::exit(2);
    }

    info!(
        accounts = config.accounts.len(),
        reservations = config.reservations.len(),
        "Starting farewatch agent"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, stopping monitors");
            let _ = shutdown_tx.send(true);
        }
    });

    let orchestrator = Orchestrator::new(
        Arc::new(RestClient::new(cli.api_url)),
        Arc::new(HttpTransport::new()),
        Arc::new(SystemClock),
    );
    let summary = orchestrator.run(config, shutdown_rx).await;

    for label in summary.interrupted() {
        eprintln!(
            "{} {label} was interrupted before its check-ins completed",
            "warning:".yellow().bold()
        );
    }
    for (label, reason) in summary.failures() {
        eprintln!("{} {label}: {reason}", "error:".red().bold());
    }

    std::process::exit(summary.exit_code());
}

fn print_error(message: &str) {
    eprintln!("{} {message}", "error:".red().bold());
}
