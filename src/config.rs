//! Configuration management for CertSentry
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to load configuration from a `certsentry.toml` file and merge it
//! with environment variables and command-line arguments.

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment, Provider,
};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::probes::overrides::{OverrideEntry, StaticCertificate};

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// The domains to monitor.
    pub domains: Vec<String>,
    /// Remaining-lifetime threshold in days below which a certificate is
    /// considered expiring.
    pub warning_days: u32,
    /// How many domains to resolve concurrently during a sweep.
    pub concurrency: usize,
    /// Configuration for the cron-driven scheduler.
    pub schedule: ScheduleConfig,
    /// Configuration for the probe strategies.
    pub probe: ProbeConfig,
    /// Configuration for CDN-front detection.
    pub cdn: CdnConfig,
    /// Operator-recorded certificates for domains that refuse probing.
    #[serde(default)]
    pub overrides: Vec<OverrideEntry>,
    /// Configuration for outbound email.
    pub email: EmailConfig,
}

/// Configuration for the cron-driven scheduler.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScheduleConfig {
    /// Whether the scheduler starts with the application.
    pub enabled: bool,
    /// Five-field cron expression for sweep firings.
    pub cron_expression: String,
    /// IANA timezone the cron expression and dispatch windows live in.
    pub timezone: String,
}

/// Configuration for the probe strategies.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProbeConfig {
    /// TLS port probed on each domain.
    pub port: u16,
    /// Per-connection budget for the socket probes, in seconds.
    pub tls_timeout_secs: u64,
    /// Budget for DNS lookups, in seconds.
    pub dns_timeout_secs: u64,
    /// Certificate Transparency lookup endpoints.
    pub ct: CtConfig,
}

/// Certificate Transparency lookup endpoints.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CtConfig {
    /// Base URL of the primary issuance API.
    pub primary_url: String,
    /// Base URL of the secondary lookup API.
    pub secondary_url: String,
    /// HTTP budget for CT queries, in seconds.
    pub timeout_secs: u64,
}

/// Configuration for CDN-front detection.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CdnConfig {
    /// Address prefixes owned by the fronting CDN.
    pub networks: Vec<IpNetwork>,
    /// Hostname suffixes used as a fallback when DNS is unavailable.
    #[serde(default)]
    pub domain_suffixes: Vec<String>,
    /// Edge certificate reported for proxied domains whose direct probes
    /// all fail. Without it, such domains fall through to CT lookups.
    #[serde(default)]
    pub known_certificate: Option<StaticCertificate>,
}

/// Configuration for outbound email.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmailConfig {
    /// Master switch; when false, notifications are logged instead of sent.
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// From address on outbound mail.
    pub from: String,
    /// Recipients of alerts and reports.
    pub recipients: Vec<String>,
    /// Whether the scheduled daily summary report is sent.
    pub daily_report: bool,
    /// Whether an operator-requested report may resend over an existing
    /// same-day claim.
    pub allow_same_day_resend: bool,
}

impl Config {
    /// Loads the application configuration from the specified file, then
    /// layers environment variables and CLI arguments on top.
    ///
    /// # Arguments
    /// * `config_path` - The path to the TOML configuration file.
    /// * `cli` - CLI overrides, applied last.
    pub fn load(config_path: &str, cli: impl Provider) -> Result<Self> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            // Allow overriding with environment variables, e.g.
            // CERTSENTRY_WARNING_DAYS=14 or CERTSENTRY_EMAIL__SMTP_HOST=...
            .merge(Env::prefixed("CERTSENTRY_").split("__"))
            .merge(cli)
            .extract()?;
        Ok(config)
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            domains: vec![],
            warning_days: 30,
            concurrency: 4,
            schedule: ScheduleConfig {
                enabled: true,
                cron_expression: "0 9 * * *".to_string(),
                timezone: "Asia/Shanghai".to_string(),
            },
            probe: ProbeConfig {
                port: 443,
                tls_timeout_secs: 15,
                dns_timeout_secs: 5,
                ct: CtConfig {
                    primary_url: "https://api.certspotter.com".to_string(),
                    secondary_url: "https://crt.sh".to_string(),
                    timeout_secs: 15,
                },
            },
            cdn: CdnConfig {
                networks: default_cdn_networks(),
                domain_suffixes: vec![],
                known_certificate: None,
            },
            overrides: vec![],
            email: EmailConfig {
                enabled: false,
                smtp_host: "localhost".to_string(),
                smtp_port: 587,
                username: String::new(),
                password: String::new(),
                from: "certsentry@localhost".to_string(),
                recipients: vec![],
                daily_report: true,
                allow_same_day_resend: false,
            },
        }
    }
}

/// Published Cloudflare anycast ranges, the common case for proxied
/// domains this monitor encounters.
fn default_cdn_networks() -> Vec<IpNetwork> {
    [
        "104.16.0.0/13",
        "104.24.0.0/14",
        "108.162.192.0/18",
        "131.0.72.0/22",
        "141.101.64.0/18",
        "162.158.0.0/15",
        "172.64.0.0/13",
        "173.245.48.0/20",
        "188.114.96.0/20",
        "190.93.240.0/20",
        "197.234.240.0/22",
        "198.41.128.0/17",
        "2400:cb00::/32",
        "2405:b500::/32",
        "2606:4700::/32",
        "2803:f800::/32",
        "2a06:98c0::/29",
        "2c0f:f248::/32",
    ]
    .iter()
    .filter_map(|s| s.parse().ok())
    .collect()
}
