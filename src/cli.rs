//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using
//! the `clap` crate. These arguments are parsed at startup and then merged
//! with the configuration from the `certsentry.toml` file and environment
//! variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// A TLS certificate expiry monitor with layered probe fallback.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run one sweep, print the result as JSON, and exit.
    #[arg(long)]
    pub once: bool,

    /// Warning threshold in days.
    #[arg(long, value_name = "DAYS")]
    pub warning_days: Option<u32>,

    /// Cron expression for scheduled sweeps.
    #[arg(long, value_name = "EXPR")]
    pub cron: Option<String>,

    /// IANA timezone for the schedule and dispatch windows.
    #[arg(long, value_name = "TZ")]
    pub timezone: Option<String>,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(days) = self.warning_days {
            dict.insert("warning_days".into(), Value::from(days));
        }

        let mut schedule = Dict::new();

        if let Some(cron) = &self.cron {
            schedule.insert("cron_expression".into(), Value::from(cron.clone()));
        }

        if let Some(tz) = &self.timezone {
            schedule.insert("timezone".into(), Value::from(tz.clone()));
        }

        if !schedule.is_empty() {
            dict.insert("schedule".into(), Value::from(schedule));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
