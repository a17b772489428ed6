//! Scheduler lifecycle: cron firings, restarts, and single-flight sweeps.

mod helpers;

use certsentry::core::{ClaimStore, HistorySink, Mailer, ProbeMethod, ProbeStrategy, ProxyDetector};
use certsentry::dispatch::{DispatchGate, ReportDispatcher};
use certsentry::probes::overrides::OverrideTable;
use certsentry::resolver::CertificateResolver;
use certsentry::scheduler::{Scheduler, SchedulerError};
use certsentry::storage::{MemoryClaimStore, MemoryHistory};
use certsentry::sweep::SweepRunner;
use helpers::{raw_cert, MockMailer, MockProbe, MockProxy};
use std::sync::Arc;
use std::time::Duration;

fn build_with_probe(
    http: MockProbe,
    mailer: Arc<MockMailer>,
    recipients: Vec<String>,
    report_enabled: bool,
) -> (Arc<Scheduler>, Arc<MemoryHistory>) {
    let resolver = Arc::new(CertificateResolver::new(
        OverrideTable::default(),
        Arc::new(MockProxy::new(false)) as Arc<dyn ProxyDetector>,
        vec![Arc::new(http) as Arc<dyn ProbeStrategy>],
        Arc::new(MockProbe::new(ProbeMethod::CtLogs)) as Arc<dyn ProbeStrategy>,
        None,
        443,
    ));
    let history = Arc::new(MemoryHistory::new());
    let runner = Arc::new(SweepRunner::new(
        resolver,
        Arc::clone(&history) as Arc<dyn HistorySink>,
        vec!["good.example.com".to_string()],
        30,
        1,
    ));
    let dispatcher = Arc::new(ReportDispatcher::new(
        DispatchGate::new(Arc::new(MemoryClaimStore::new()) as Arc<dyn ClaimStore>, false),
        mailer as Arc<dyn Mailer>,
        recipients,
        report_enabled,
        chrono_tz::UTC,
    ));
    (Arc::new(Scheduler::new(runner, dispatcher)), history)
}

fn build(probe_delay: Option<Duration>) -> (Arc<Scheduler>, Arc<MemoryHistory>) {
    let mut http = MockProbe::new(ProbeMethod::Http)
        .succeed_for("good.example.com", raw_cert(100, ProbeMethod::Http));
    if let Some(delay) = probe_delay {
        http = http.with_delay(delay);
    }
    build_with_probe(http, Arc::new(MockMailer::new()), vec![], false)
}

#[tokio::test]
async fn manual_check_populates_the_sweep_cache() {
    let (scheduler, _history) = build(None);
    assert!(scheduler.last_sweep().is_none());

    let sweep = scheduler.manual_check().await.unwrap();
    assert_eq!(sweep.total, 1);
    assert_eq!(sweep.healthy, 1);

    let cached = scheduler.last_sweep().unwrap();
    assert_eq!(cached.sweep_time, sweep.sweep_time);

    let status = scheduler.status().await;
    assert!(!status.active);
    assert_eq!(status.last_sweep_time, Some(sweep.sweep_time));
}

#[tokio::test]
async fn overlapping_manual_checks_are_rejected() {
    let (scheduler, _history) = build(Some(Duration::from_millis(300)));

    let (first, second) = tokio::join!(scheduler.manual_check(), async {
        // Give the first call time to take the in-flight slot.
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.manual_check().await
    });

    assert!(first.is_ok());
    assert!(matches!(second, Err(SchedulerError::SweepInFlight)));

    // The slot frees up once the first sweep completes.
    assert!(scheduler.manual_check().await.is_ok());
}

#[tokio::test]
async fn invalid_schedule_leaves_the_scheduler_stopped() {
    let (scheduler, _history) = build(None);

    let result = scheduler.start("not a cron", "UTC").await;
    assert!(matches!(result, Err(SchedulerError::InvalidCron { .. })));

    let result = scheduler.start("* * * * *", "Mars/Olympus").await;
    assert!(matches!(result, Err(SchedulerError::InvalidTimezone(_))));

    assert!(!scheduler.status().await.active);
}

#[tokio::test]
async fn status_reflects_the_installed_trigger() {
    let (scheduler, _history) = build(None);
    scheduler.start("0 9 * * *", "Asia/Shanghai").await.unwrap();

    let status = scheduler.status().await;
    assert!(status.active);
    assert_eq!(status.cron_expression.as_deref(), Some("0 9 * * *"));
    assert_eq!(status.timezone.as_deref(), Some("Asia/Shanghai"));

    scheduler.stop().await;
    assert!(!scheduler.status().await.active);
}

#[tokio::test]
async fn restart_does_not_duplicate_firings() {
    let (scheduler, history) = build(None);

    // Six-field expression firing every second; the restart must tear the
    // first trigger down or firings would double up.
    scheduler.start("* * * * * *", "UTC").await.unwrap();
    scheduler.start("* * * * * *", "UTC").await.unwrap();

    tokio::time::sleep(Duration::from_millis(2200)).await;
    scheduler.stop().await;
    // Let a cycle spawned just before the stop finish.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let sweeps = history.all().unwrap().len();
    assert!(
        (1..=3).contains(&sweeps),
        "expected 1-3 sweeps from a single trigger, got {sweeps}"
    );
}

#[tokio::test]
async fn scheduled_firing_dispatches_the_expiry_alert() {
    let mailer = Arc::new(MockMailer::new());
    let http = MockProbe::new(ProbeMethod::Http)
        .succeed_for("good.example.com", raw_cert(5, ProbeMethod::Http));
    let (scheduler, _history) = build_with_probe(
        http,
        Arc::clone(&mailer),
        vec!["ops@example.com".to_string()],
        false,
    );

    scheduler.start("* * * * * *", "UTC").await.unwrap();
    tokio::time::sleep(Duration::from_millis(2200)).await;
    scheduler.stop().await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    // The cert is inside the warning window, so the firing must alert,
    // and the dispatch window caps it at one send despite repeat firings.
    assert_eq!(mailer.alert_count(), 1);
    let alerted = &mailer.alerts.lock().unwrap()[0];
    assert_eq!(alerted.len(), 1);
    assert_eq!(alerted[0].domain, "good.example.com");
    // The daily report stays off while its flag is disabled.
    assert_eq!(mailer.report_count(), 0);
}

#[tokio::test]
async fn scheduled_firing_sends_the_report_but_not_an_alert_when_healthy() {
    let mailer = Arc::new(MockMailer::new());
    let http = MockProbe::new(ProbeMethod::Http)
        .succeed_for("good.example.com", raw_cert(200, ProbeMethod::Http));
    let (scheduler, _history) = build_with_probe(
        http,
        Arc::clone(&mailer),
        vec!["ops@example.com".to_string()],
        true,
    );

    scheduler.start("* * * * * *", "UTC").await.unwrap();
    tokio::time::sleep(Duration::from_millis(2200)).await;
    scheduler.stop().await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(mailer.alert_count(), 0);
    assert_eq!(mailer.report_count(), 1);
    assert_eq!(mailer.reports.lock().unwrap()[0].healthy, 1);
}

#[tokio::test]
async fn panicking_probe_does_not_wedge_the_single_flight_gate() {
    struct PanickingProbe;

    #[async_trait::async_trait]
    impl certsentry::core::ProbeStrategy for PanickingProbe {
        fn method(&self) -> ProbeMethod {
            ProbeMethod::Http
        }

        async fn attempt(
            &self,
            _domain: &str,
            _port: u16,
        ) -> Result<certsentry::core::RawCertificate, certsentry::probes::ProbeError> {
            panic!("probe blew up");
        }
    }

    let resolver = Arc::new(CertificateResolver::new(
        OverrideTable::default(),
        Arc::new(MockProxy::new(false)) as Arc<dyn ProxyDetector>,
        vec![Arc::new(PanickingProbe) as Arc<dyn ProbeStrategy>],
        Arc::new(MockProbe::new(ProbeMethod::CtLogs)) as Arc<dyn ProbeStrategy>,
        None,
        443,
    ));
    let history = Arc::new(MemoryHistory::new());
    let runner = Arc::new(SweepRunner::new(
        resolver,
        history as Arc<dyn HistorySink>,
        vec!["good.example.com".to_string()],
        30,
        1,
    ));
    let dispatcher = Arc::new(ReportDispatcher::new(
        DispatchGate::new(Arc::new(MemoryClaimStore::new()) as Arc<dyn ClaimStore>, false),
        Arc::new(MockMailer::new()) as Arc<dyn Mailer>,
        vec![],
        false,
        chrono_tz::UTC,
    ));
    let scheduler = Arc::new(Scheduler::new(runner, dispatcher));

    let crashed = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        async move { scheduler.manual_check().await.map(|_| ()) }
    })
    .await;
    assert!(crashed.unwrap_err().is_panic());

    // The in-flight slot must be free again: the next attempt reaches the
    // probe (and panics the same way) instead of being rejected as an
    // overlapping sweep.
    let second = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        async move { scheduler.manual_check().await.map(|_| ()) }
    })
    .await;
    match second {
        Err(join_err) => assert!(join_err.is_panic()),
        Ok(result) => panic!("expected the sweep to run again, got {result:?}"),
    }
}

#[tokio::test]
async fn stop_halts_further_firings() {
    let (scheduler, history) = build(None);
    scheduler.start("* * * * * *", "UTC").await.unwrap();

    tokio::time::sleep(Duration::from_millis(1200)).await;
    scheduler.stop().await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    let after_stop = history.all().unwrap().len();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(history.all().unwrap().len(), after_stop);
}
