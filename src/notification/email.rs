//! SMTP delivery for alerts and reports.
//!
//! One message per recipient, plain text. Delivery is attempted exactly
//! once per dispatch; the dispatch gate decides whether a window may be
//! retried, not this layer.

use super::{alert_body, alert_subject, report_body, report_subject};
use crate::core::{CertificateRecord, Mailer, SweepResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(
        smtp_host: &str,
        smtp_port: u16,
        username: &str,
        password: &str,
        from: &str,
    ) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)
            .context("invalid SMTP relay host")?
            .port(smtp_port);

        if !username.is_empty() {
            builder = builder.credentials(Credentials::new(
                username.to_string(),
                password.to_string(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from: from.to_string(),
        })
    }

    async fn deliver(&self, recipients: &[String], subject: &str, body: &str) -> Result<()> {
        for recipient in recipients {
            let message = Message::builder()
                .from(self.from.parse().context("invalid from address")?)
                .to(recipient
                    .parse()
                    .with_context(|| format!("invalid recipient address {recipient}"))?)
                .subject(subject)
                .header(ContentType::TEXT_PLAIN)
                .body(body.to_string())?;

            self.transport
                .send(message)
                .await
                .with_context(|| format!("SMTP delivery to {recipient} failed"))?;
            debug!(recipient, subject, "email delivered");
        }
        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_alert(
        &self,
        expiring: &[CertificateRecord],
        recipients: &[String],
        warning_days: u32,
    ) -> Result<()> {
        self.deliver(
            recipients,
            &alert_subject(expiring.len()),
            &alert_body(expiring, warning_days),
        )
        .await
    }

    async fn send_daily_report(&self, recipients: &[String], sweep: &SweepResult) -> Result<()> {
        self.deliver(recipients, &report_subject(sweep), &report_body(sweep))
            .await
    }
}

/// Stand-in mailer used when email is disabled: the rendered notification
/// goes to the log instead of the wire, keeping the dispatch-gate behavior
/// identical to a real deployment.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_alert(
        &self,
        expiring: &[CertificateRecord],
        _recipients: &[String],
        warning_days: u32,
    ) -> Result<()> {
        info!(
            "email disabled, alert not sent:\n{}",
            alert_body(expiring, warning_days)
        );
        Ok(())
    }

    async fn send_daily_report(&self, _recipients: &[String], sweep: &SweepResult) -> Result<()> {
        info!(
            "email disabled, daily report not sent:\n{}",
            report_body(sweep)
        );
        Ok(())
    }
}
