//! Outbound notification channels.

pub mod email;

pub use email::{LogMailer, SmtpMailer};

use crate::core::{CertificateRecord, SweepResult};

/// Subject line for the expiry alert.
pub(crate) fn alert_subject(expiring: usize) -> String {
    if expiring == 1 {
        "[certsentry] 1 certificate is about to expire".to_string()
    } else {
        format!("[certsentry] {expiring} certificates are about to expire")
    }
}

/// Plain-text body listing certificates inside the warning window.
pub(crate) fn alert_body(expiring: &[CertificateRecord], warning_days: u32) -> String {
    let mut body = format!(
        "The following certificates expire within {warning_days} days:\n\n"
    );
    for record in expiring {
        let days = record.days_until_expiry.unwrap_or(0);
        let valid_to = record
            .valid_to
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let issuer = record.issuer.as_deref().unwrap_or("unknown issuer");
        body.push_str(&format!(
            "  {domain}: {days} day(s) left, expires {valid_to} ({issuer})\n",
            domain = record.domain,
        ));
    }
    body.push_str("\nRenew them before the window closes.\n");
    body
}

pub(crate) fn report_subject(sweep: &SweepResult) -> String {
    format!(
        "[certsentry] daily report: {healthy} healthy, {expiring} expiring, {failed} failed",
        healthy = sweep.healthy,
        expiring = sweep.expiring,
        failed = sweep.failed,
    )
}

/// Plain-text body summarizing one sweep, domain by domain.
pub(crate) fn report_body(sweep: &SweepResult) -> String {
    let mut body = format!(
        "Certificate sweep at {time}\n\
         Domains checked: {total}\n\
         Healthy: {healthy}\n\
         Expiring within {warning} days: {expiring}\n\
         Failed: {failed}\n\n",
        time = sweep.sweep_time.format("%Y-%m-%d %H:%M UTC"),
        total = sweep.total,
        healthy = sweep.healthy,
        warning = sweep.warning_days,
        expiring = sweep.expiring,
        failed = sweep.failed,
    );

    for record in &sweep.records {
        match record.status {
            crate::core::CheckStatus::Success => {
                let days = record.days_until_expiry.unwrap_or(0);
                let method = record
                    .method
                    .map(|m| m.as_str())
                    .unwrap_or("unknown");
                body.push_str(&format!(
                    "  OK    {domain}: {days} day(s) left (via {method})\n",
                    domain = record.domain,
                ));
            }
            crate::core::CheckStatus::Error => {
                let message = record.error_message.as_deref().unwrap_or("unknown error");
                body.push_str(&format!(
                    "  FAIL  {domain}: {message}\n",
                    domain = record.domain,
                ));
            }
        }
    }
    body
}
