//! Cron-driven sweep scheduling.
//!
//! One trigger task sleeps until the next cron firing, then kicks off a
//! sweep-and-dispatch cycle. Restarting the scheduler tears the previous
//! trigger down before installing the new one, so a restart (including a
//! schedule change) never produces duplicate firings. Sweeps are
//! single-flight: a firing or manual request that arrives while a sweep is
//! running is rejected rather than queued.

use crate::core::SweepResult;
use crate::dispatch::ReportDispatcher;
use crate::sweep::SweepRunner;
use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use serde::Serialize;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },
    #[error("unknown timezone '{0}'")]
    InvalidTimezone(String),
    #[error("a sweep is already in progress")]
    SweepInFlight,
}

/// Parses an operator-supplied cron expression.
///
/// Operators write the conventional five-field form; the parser works on
/// six fields with leading seconds, so five-field input is normalized by
/// pinning seconds to zero.
pub fn parse_cron(expression: &str) -> Result<Schedule, SchedulerError> {
    let trimmed = expression.trim();
    let normalized = if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    };
    Schedule::from_str(&normalized).map_err(|e| SchedulerError::InvalidCron {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

pub fn parse_timezone(name: &str) -> Result<Tz, SchedulerError> {
    name.parse::<Tz>()
        .map_err(|_| SchedulerError::InvalidTimezone(name.to_string()))
}

/// Snapshot of scheduler state for the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cron_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sweep_time: Option<DateTime<Utc>>,
}

struct TriggerHandle {
    cron_expression: String,
    timezone: Tz,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct Scheduler {
    runner: Arc<SweepRunner>,
    dispatcher: Arc<ReportDispatcher>,
    trigger: Mutex<Option<TriggerHandle>>,
    sweep_in_flight: AtomicBool,
    last_sweep: ArcSwapOption<SweepResult>,
}

impl Scheduler {
    pub fn new(runner: Arc<SweepRunner>, dispatcher: Arc<ReportDispatcher>) -> Self {
        Self {
            runner,
            dispatcher,
            trigger: Mutex::new(None),
            sweep_in_flight: AtomicBool::new(false),
            last_sweep: ArcSwapOption::empty(),
        }
    }

    /// Installs (or replaces) the cron trigger.
    ///
    /// Validation happens before the existing trigger is touched: an
    /// invalid expression or timezone leaves the scheduler in its previous
    /// state. Calling `start` with a schedule identical to the running one
    /// still replaces the trigger task, which is harmless.
    pub async fn start(
        self: &Arc<Self>,
        cron_expression: &str,
        timezone: &str,
    ) -> Result<(), SchedulerError> {
        let schedule = parse_cron(cron_expression)?;
        let tz = parse_timezone(timezone)?;

        let mut trigger = self.trigger.lock().await;
        if let Some(previous) = trigger.take() {
            debug!("tearing down previous trigger before restart");
            teardown(previous).await;
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(trigger_loop(Arc::clone(self), schedule, tz, cancel_rx));
        *trigger = Some(TriggerHandle {
            cron_expression: cron_expression.to_string(),
            timezone: tz,
            cancel: cancel_tx,
            task,
        });
        info!(cron = cron_expression, timezone, "scheduler started");
        Ok(())
    }

    /// Tears down the trigger. Idempotent; an in-flight cycle finishes on
    /// its own.
    pub async fn stop(&self) {
        let mut trigger = self.trigger.lock().await;
        if let Some(handle) = trigger.take() {
            teardown(handle).await;
            info!("scheduler stopped");
        }
    }

    /// Runs one sweep immediately, outside the cron schedule.
    ///
    /// Rejected while another sweep (scheduled or manual) is in flight.
    pub async fn manual_check(&self) -> Result<Arc<SweepResult>, SchedulerError> {
        let sweep = self.run_single_flight().await?;
        Ok(sweep)
    }

    /// Runs a fresh sweep and dispatches the daily report for it on the
    /// operator path, which may resend over an existing claim.
    pub async fn execute_daily_report(&self) -> Result<Arc<SweepResult>, SchedulerError> {
        let sweep = self.run_single_flight().await?;
        if let Err(e) = self.dispatcher.dispatch_daily_report(&sweep, true).await {
            error!(error = %e, "operator-requested daily report dispatch failed");
        }
        Ok(sweep)
    }

    /// The most recently completed sweep, if any.
    pub fn last_sweep(&self) -> Option<Arc<SweepResult>> {
        self.last_sweep.load_full()
    }

    pub async fn status(&self) -> SchedulerStatus {
        let trigger = self.trigger.lock().await;
        SchedulerStatus {
            active: trigger.is_some(),
            cron_expression: trigger.as_ref().map(|t| t.cron_expression.clone()),
            timezone: trigger.as_ref().map(|t| t.timezone.name().to_string()),
            last_sweep_time: self.last_sweep.load_full().map(|s| s.sweep_time),
        }
    }

    /// One scheduled cycle: sweep, then alert and report dispatch. A
    /// firing that lands while a sweep is already running is dropped.
    async fn run_scheduled_cycle(&self) {
        let sweep = match self.run_single_flight().await {
            Ok(sweep) => sweep,
            Err(SchedulerError::SweepInFlight) => {
                warn!("scheduled firing overlapped a running sweep, skipping");
                return;
            }
            Err(e) => {
                error!(error = %e, "scheduled cycle failed");
                return;
            }
        };
        if let Err(e) = self.dispatcher.dispatch_alert(&sweep).await {
            error!(error = %e, "alert dispatch failed");
        }
        if let Err(e) = self.dispatcher.dispatch_daily_report(&sweep, false).await {
            error!(error = %e, "daily report dispatch failed");
        }
    }

    async fn run_single_flight(&self) -> Result<Arc<SweepResult>, SchedulerError> {
        if self
            .sweep_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SchedulerError::SweepInFlight);
        }
        // Clears the flag even if a probe panics mid-sweep, so the gate
        // cannot wedge permanently.
        let _guard = InFlightGuard(&self.sweep_in_flight);
        let sweep = Arc::new(self.runner.run().await);
        self.last_sweep.store(Some(Arc::clone(&sweep)));
        Ok(sweep)
    }
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

async fn teardown(handle: TriggerHandle) {
    let _ = handle.cancel.send(true);
    if let Err(e) = handle.task.await {
        if !e.is_cancelled() {
            error!(error = %e, "trigger task ended abnormally");
        }
    }
}

async fn trigger_loop(
    scheduler: Arc<Scheduler>,
    schedule: Schedule,
    tz: Tz,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        let next = match schedule.upcoming(tz).next() {
            Some(next) => next,
            None => {
                warn!("cron expression yields no future firings, trigger exiting");
                return;
            }
        };
        let wait = (next.with_timezone(&Utc) - Utc::now())
            .to_std()
            .unwrap_or_default();
        debug!(next = %next, wait_secs = wait.as_secs(), "trigger sleeping until next firing");

        tokio::select! {
            biased;
            _ = cancel.changed() => {
                debug!("trigger cancelled");
                return;
            }
            _ = tokio::time::sleep(wait) => {
                // Detached so a long sweep never delays computing the
                // next firing; the single-flight gate drops overlaps.
                let scheduler = Arc::clone(&scheduler);
                tokio::spawn(async move { scheduler.run_scheduled_cycle().await });
            }
        }
    }
}
