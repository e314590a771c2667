//! Spawns and supervises the monitor tasks for one run of the agent.

use std::sync::Arc;

use farewatch_config::GlobalConfig;
use farewatch_model::MonitorOutcome;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::api::AirlineApi;
use crate::monitor::{AccountMonitor, ReservationMonitor, RetryPolicy};
use crate::notify::{NotificationTransport, Notifier};
use crate::timer::Clock;

/// Exit status for an interrupted run, mirroring a SIGINT death.
const EXIT_INTERRUPTED: i32 = 130;

/// Builds and runs the monitor set described by a [`GlobalConfig`].
pub struct Orchestrator {
    api: Arc<dyn AirlineApi>,
    transport: Arc<dyn NotificationTransport>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl Orchestrator {
    pub fn new(
        api: Arc<dyn AirlineApi>,
        transport: Arc<dyn NotificationTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            api,
            transport,
            clock,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Spawn one task per account and per directly-configured reservation,
    /// then wait for all of them. Shutdown is cooperative: every monitor
    /// watches the same channel and unwinds at its next wake.
    pub async fn run(&self, config: GlobalConfig, shutdown: watch::Receiver<bool>) -> RunSummary {
        let mut units: Vec<(String, JoinHandle<MonitorOutcome>)> = Vec::new();

        for account in config.accounts {
            let label = format!("account {}", account.username);
            let notifier = Notifier::new(
                &account.settings,
                account.username.clone(),
                Arc::clone(&self.transport),
            );
            let monitor = AccountMonitor::new(
                account.username,
                account.password,
                account.settings,
                Arc::clone(&self.api),
                notifier,
                Arc::clone(&self.transport),
                Arc::clone(&self.clock),
                self.retry.clone(),
                shutdown.clone(),
            );
            units.push((label, tokio::spawn(monitor.run())));
        }

        for entry in config.reservations {
            let label = format!("reservation {}", entry.reservation.confirmation_number);
            let notifier = Notifier::new(
                &entry.settings,
                entry.reservation.traveler_name(),
                Arc::clone(&self.transport),
            );
            let monitor = ReservationMonitor::new(
                entry.reservation,
                entry.settings,
                Arc::clone(&self.api),
                notifier,
                Arc::clone(&self.clock),
                self.retry.clone(),
                shutdown.clone(),
            );
            units.push((label, tokio::spawn(monitor.run())));
        }

        info!(monitors = units.len(), "Monitoring started");

        let mut outcomes = Vec::new();
        for (label, handle) in units {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(unit = %label, error = %e, "Monitor task panicked");
                    MonitorOutcome::failed("monitor task panicked")
                }
            };
            match &outcome {
                MonitorOutcome::Completed => info!(unit = %label, "Monitor finished"),
                MonitorOutcome::Failed { reason } => {
                    error!(unit = %label, reason = %reason, "Monitor failed");
                }
                MonitorOutcome::Interrupted => {
                    warn!(unit = %label, "Monitor interrupted; its work is incomplete");
                }
            }
            outcomes.push((label, outcome));
        }

        RunSummary { outcomes }
    }
}

/// Terminal outcomes of every monitor, labelled for reporting.
pub struct RunSummary {
    pub outcomes: Vec<(String, MonitorOutcome)>,
}

impl RunSummary {
    /// Process exit code: failure wins over interruption, interruption
    /// over success.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.outcomes.iter().any(|(_, o)| o.is_failure()) {
            return 1;
        }
        if self
            .outcomes
            .iter()
            .any(|(_, o)| matches!(o, MonitorOutcome::Interrupted))
        {
            return EXIT_INTERRUPTED;
        }
        0
    }

    /// Labels of monitors that were interrupted before finishing.
    pub fn interrupted(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, MonitorOutcome::Interrupted))
            .map(|(label, _)| label.as_str())
            .collect()
    }

    /// Labels and reasons of monitors that failed.
    pub fn failures(&self) -> Vec<(&str, &str)> {
        self.outcomes
            .iter()
            .filter_map(|(label, o)| match o {
                MonitorOutcome::Failed { reason } => Some((label.as_str(), reason.as_str())),
                _ => None,
            })
            .collect()
    }
}
