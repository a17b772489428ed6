//! CertSentry - TLS certificate expiry monitor
//!
//! Watches a configured list of domains, extracts their TLS certificates
//! through layered probe strategies, and sends expiry alerts and daily
//! reports on a cron schedule.

use anyhow::Result;
use certsentry::{app::App, cli::Cli, config::Config};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| "certsentry.toml".into());
    let once = cli.once;

    let config = Config::load(&config_path.to_string_lossy(), cli).unwrap_or_else(|err| {
        eprintln!("Failed to load configuration: {err}");
        std::process::exit(1);
    });

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    info!("CertSentry starting up...");
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Domains: {}", config.domains.len());
    info!("Warning Threshold: {} days", config.warning_days);
    info!("Concurrency: {}", config.concurrency);
    info!("Schedule: {} ({})", config.schedule.cron_expression, config.schedule.timezone);
    info!("Probe Port: {}", config.probe.port);
    info!("Static Overrides: {}", config.overrides.len());
    info!("Email Enabled: {}", config.email.enabled);
    info!("-------------------------------------------------------");

    if config.domains.is_empty() {
        warn!("no domains configured, nothing to monitor");
    }

    let app = App::build(&config)?;
    let scheduler = app.scheduler();

    if once {
        let sweep = scheduler.manual_check().await?;
        println!("{}", serde_json::to_string_pretty(&*sweep)?);
        return Ok(());
    }

    if config.schedule.enabled {
        if let Err(e) = scheduler
            .start(&config.schedule.cron_expression, &config.schedule.timezone)
            .await
        {
            // A broken schedule leaves the process up for manual checks
            // instead of crash-looping.
            error!(error = %e, "scheduler failed to start");
        }
    } else {
        info!("scheduler disabled by configuration");
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Stopping scheduler...");
    scheduler.stop().await;
    info!("Shutdown complete.");
    Ok(())
}
