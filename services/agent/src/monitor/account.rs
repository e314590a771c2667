//! Account monitor: polls the reservation listing and reconciles a set of
//! per-flight check-in monitors.
//!
//! Keyed by flight number: a flight number already being monitored is left
//! alone (its monitor detects reschedules itself), a new one gets a
//! monitor spawned, and a number that disappeared from the listing gets
//! its monitor cancelled. Finished monitors stay in the map until their
//! flight leaves the listing, so a checked-in flight is not re-scheduled
//! on the next poll.

use std::collections::HashMap;
use std::sync::Arc;

use farewatch_config::ResolvedConfig;
use farewatch_model::{
    Flight, FlightNumber, FlightStatus, MonitorOutcome, ReservationKind, ReservationRef, Session,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::AirlineApi;
use crate::notify::{NotificationTransport, Notifier};
use crate::timer::{self, Clock, WaitResult};

use super::{ReservationMonitor, RetryPolicy};

/// Window within which two flights' check-in periods overlap.
fn same_day_window() -> chrono::Duration {
    chrono::Duration::hours(24)
}

/// A spawned per-flight monitor owned by the account monitor.
pub struct ChildMonitor {
    flight: Flight,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<MonitorOutcome>,
}

impl ChildMonitor {
    fn cancel(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Whether this monitor has been told to stop.
    pub fn is_cancelled(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    pub fn flight(&self) -> &Flight {
        &self.flight
    }
}

/// Result of one polling pass.
#[derive(Debug, PartialEq, Eq)]
pub enum PollResult {
    /// Poll finished (possibly skipped); keep the schedule running.
    Continue,
    /// Unrecoverable account error; stop polling.
    Fatal(String),
    /// Shutdown was signalled mid-pass.
    Shutdown,
}

/// Monitors one account's reservations.
pub struct AccountMonitor {
    username: String,
    password: String,
    settings: ResolvedConfig,
    api: Arc<dyn AirlineApi>,
    notifier: Notifier,
    transport: Arc<dyn NotificationTransport>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    shutdown: watch::Receiver<bool>,
    children: HashMap<FlightNumber, ChildMonitor>,
    retired: Vec<(FlightNumber, ChildMonitor)>,
}

impl AccountMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        settings: ResolvedConfig,
        api: Arc<dyn AirlineApi>,
        notifier: Notifier,
        transport: Arc<dyn NotificationTransport>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            settings,
            api,
            notifier,
            transport,
            clock,
            retry,
            shutdown,
            children: HashMap::new(),
            retired: Vec::new(),
        }
    }

    /// Flight numbers with an active (or finished, not yet retired)
    /// monitor.
    pub fn child_flight_numbers(&self) -> Vec<FlightNumber> {
        let mut numbers: Vec<FlightNumber> = self.children.keys().cloned().collect();
        numbers.sort();
        numbers
    }

    /// Monitors cancelled because their flight left the listing.
    pub fn retired_children(&self) -> &[(FlightNumber, ChildMonitor)] {
        &self.retired
    }

    /// Run to a terminal state. A zero retrieval interval polls exactly
    /// once; otherwise polling repeats until shutdown or a fatal account
    /// error. Either way, spawned check-in monitors are waited on before
    /// returning, since their work outlives the polling schedule.
    pub async fn run(mut self) -> MonitorOutcome {
        info!(username = %self.username, "Starting account monitor");

        let mut fatal: Option<String> = None;
        let mut interrupted = false;

        loop {
            let pass_started = self.clock.now();
            match self.poll_once().await {
                PollResult::Continue => {}
                PollResult::Fatal(reason) => {
                    fatal = Some(reason);
                    break;
                }
                PollResult::Shutdown => {
                    interrupted = true;
                    break;
                }
            }

            if self.settings.retrieval_interval.is_zero() {
                debug!(username = %self.username, "Retrieval interval is zero, polled once");
                break;
            }

            let next = pass_started + timer::chrono_interval(self.settings.retrieval_interval);
            if timer::sleep_until(next, self.clock.as_ref(), &mut self.shutdown).await
                == WaitResult::Shutdown
            {
                interrupted = true;
                break;
            }
        }

        if interrupted {
            self.cancel_children();
        }
        let failed_children = self.join_children().await;

        match fatal {
            Some(reason) => MonitorOutcome::failed(reason),
            None if interrupted => MonitorOutcome::Interrupted,
            None if failed_children > 0 => MonitorOutcome::failed(format!(
                "{failed_children} check-in monitor(s) failed for account {}",
                self.username
            )),
            None => MonitorOutcome::Completed,
        }
    }

    /// One polling pass: authenticate, list reservations, fetch each
    /// flight, reconcile monitors. Transient trouble skips the pass; only
    /// rejected credentials are fatal.
    pub async fn poll_once(&mut self) -> PollResult {
        let session = match self.authenticate_with_retry().await {
            Ok(Some(session)) => session,
            Ok(None) => return PollResult::Continue,
            Err(result) => return result,
        };

        let summaries = match self.api.list_reservations(&session).await {
            Ok(summaries) => summaries,
            Err(e) => {
                warn!(
                    username = %self.username,
                    error = %e,
                    "Failed to list reservations, skipping this pass"
                );
                return PollResult::Continue;
            }
        };

        let mut flights = Vec::new();
        for summary in &summaries {
            if summary.kind != ReservationKind::Flight {
                debug!(
                    confirmation = %summary.confirmation_number,
                    "Skipping non-flight reservation"
                );
                continue;
            }
            let reservation = ReservationRef::new(
                summary.confirmation_number.clone(),
                session.first_name.clone(),
                session.last_name.clone(),
            );
            match self.api.fetch_flight(&reservation).await {
                Ok(FlightStatus::Scheduled(flight)) if flight.departure_time > self.clock.now() => {
                    flights.push(flight);
                }
                Ok(_) => {
                    debug!(
                        confirmation = %summary.confirmation_number,
                        "Reservation has no upcoming flight"
                    );
                }
                // One bad reservation never poisons the pass; the flight
                // will be picked up on a later poll.
                Err(e) => {
                    warn!(
                        confirmation = %summary.confirmation_number,
                        error = %e,
                        "Failed to fetch reservation, skipping it this pass"
                    );
                }
            }
        }

        mark_same_day(&mut flights);
        self.reconcile(flights, &session).await;
        PollResult::Continue
    }

    /// Authenticate with a single transient retry. `Ok(None)` means the
    /// pass should be skipped (rate limited through the retry).
    async fn authenticate_with_retry(&mut self) -> Result<Option<Session>, PollResult> {
        for attempt in 1..=2 {
            match self.api.authenticate(&self.username, &self.password).await {
                Ok(session) => return Ok(Some(session)),
                Err(e) if e.is_transient() && attempt < 2 => {
                    warn!(username = %self.username, error = %e, "Transient login failure, retrying");
                    if timer::sleep_for(self.retry.backoff, &mut self.shutdown).await
                        == WaitResult::Shutdown
                    {
                        return Err(PollResult::Shutdown);
                    }
                }
                Err(e) if e.is_transient() => {
                    warn!(username = %self.username, error = %e, "Login still failing, skipping this pass");
                    self.notifier.login_rate_limited(&self.username).await;
                    return Ok(None);
                }
                Err(e) => {
                    error!(username = %self.username, error = %e, "Login rejected");
                    self.notifier.failed_login(&self.username, &e).await;
                    return Err(PollResult::Fatal(format!(
                        "login failed for account {}: {e}",
                        self.username
                    )));
                }
            }
        }
        Ok(None)
    }

    /// Diff the current listing against running monitors by flight number.
    async fn reconcile(&mut self, flights: Vec<Flight>, session: &Session) {
        let current: Vec<FlightNumber> = flights.iter().map(|f| f.flight_number.clone()).collect();

        let stale: Vec<FlightNumber> = self
            .children
            .keys()
            .filter(|number| !current.contains(number))
            .cloned()
            .collect();
        for number in stale {
            if let Some(child) = self.children.remove(&number) {
                info!(
                    username = %self.username,
                    flight = %number,
                    "Flight left the reservation listing, cancelling its monitor"
                );
                child.cancel();
                self.retired.push((number, child));
            }
        }

        let new_flights: Vec<Flight> = flights
            .into_iter()
            .filter(|f| !self.children.contains_key(&f.flight_number))
            .collect();
        if new_flights.is_empty() {
            return;
        }

        info!(
            username = %self.username,
            count = new_flights.len(),
            "Scheduling check-ins for new flights"
        );
        self.notifier.new_flights(&new_flights).await;
        for flight in new_flights {
            self.spawn_child(flight, session);
        }
    }

    fn spawn_child(&mut self, flight: Flight, session: &Session) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reservation = ReservationRef::new(
            flight.confirmation_number.clone(),
            session.first_name.clone(),
            session.last_name.clone(),
        );
        let notifier = Notifier::new(
            &self.settings,
            reservation.traveler_name(),
            Arc::clone(&self.transport),
        );
        let monitor = ReservationMonitor::new(
            reservation,
            self.settings.clone(),
            Arc::clone(&self.api),
            notifier,
            Arc::clone(&self.clock),
            self.retry.clone(),
            shutdown_rx,
        )
        .with_flight(flight.clone());

        debug!(flight = %flight.flight_number, "Spawning check-in monitor");
        let handle = tokio::spawn(monitor.run());
        self.children.insert(
            flight.flight_number.clone(),
            ChildMonitor {
                flight,
                shutdown_tx,
                handle,
            },
        );
    }

    fn cancel_children(&self) {
        for child in self.children.values() {
            child.cancel();
        }
        for (_, child) in &self.retired {
            child.cancel();
        }
    }

    /// Wait for every spawned monitor and count failures. A shutdown
    /// signalled while waiting is forwarded so children unwind promptly.
    async fn join_children(&mut self) -> usize {
        let mut all: Vec<(FlightNumber, ChildMonitor)> = self.children.drain().collect();
        all.append(&mut self.retired);

        let mut failed = 0;
        for (number, child) in all {
            let ChildMonitor {
                shutdown_tx,
                mut handle,
                ..
            } = child;

            let mut shutdown_seen = *self.shutdown.borrow();
            let result = loop {
                if shutdown_seen {
                    let _ = shutdown_tx.send(true);
                    break handle.await;
                }
                tokio::select! {
                    result = &mut handle => break result,
                    _ = self.shutdown.changed() => shutdown_seen = true,
                }
            };

            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(flight = %number, error = %e, "Check-in monitor panicked");
                    MonitorOutcome::failed("monitor task panicked")
                }
            };
            match &outcome {
                MonitorOutcome::Completed => {
                    debug!(flight = %number, "Check-in monitor finished");
                }
                MonitorOutcome::Failed { reason } => {
                    warn!(flight = %number, reason = %reason, "Check-in monitor failed");
                    failed += 1;
                }
                MonitorOutcome::Interrupted => {
                    warn!(flight = %number, "Check-in monitor interrupted before completion");
                }
            }
        }
        failed
    }
}

/// Flag flights whose check-in windows overlap an earlier flight's. The
/// earlier leg checks in normally; the later one is flagged so its monitor
/// can warn that ordering between the two is not guaranteed.
fn mark_same_day(flights: &mut [Flight]) {
    flights.sort_by_key(|f| f.departure_time);
    for later in 1..flights.len() {
        let departure = flights[later].departure_time;
        let overlaps = flights[..later]
            .iter()
            .any(|earlier| departure - earlier.departure_time < same_day_window());
        if overlaps && !flights[later].is_same_day {
            warn!(
                flight = %flights[later].flight_number,
                "Check-in window overlaps an earlier flight on this account"
            );
            flights[later].is_same_day = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn flight(number: &str, departure: chrono::DateTime<Utc>) -> Flight {
        Flight {
            confirmation_number: "ABC123".into(),
            flight_number: number.into(),
            departure_airport: "AUS".to_string(),
            destination_airport: "DEN".to_string(),
            departure_time: departure,
            is_international: false,
            is_same_day: false,
        }
    }

    #[test]
    fn overlapping_windows_flag_the_later_flight() {
        let base = Utc.with_ymd_and_hms(2026, 3, 14, 8, 0, 0).unwrap();
        let mut flights = vec![
            flight("200", base + chrono::Duration::hours(10)),
            flight("100", base),
        ];
        mark_same_day(&mut flights);
        assert!(!flights[0].is_same_day, "earlier flight stays unflagged");
        assert!(flights[1].is_same_day, "later flight is flagged");
    }

    #[test]
    fn distant_flights_are_not_flagged() {
        let base = Utc.with_ymd_and_hms(2026, 3, 14, 8, 0, 0).unwrap();
        let mut flights = vec![
            flight("100", base),
            flight("200", base + chrono::Duration::hours(48)),
        ];
        mark_same_day(&mut flights);
        assert!(flights.iter().all(|f| !f.is_same_day));
    }

    #[test]
    fn exactly_24h_apart_is_not_overlapping() {
        let base = Utc.with_ymd_and_hms(2026, 3, 14, 8, 0, 0).unwrap();
        let mut flights = vec![
            flight("100", base),
            flight("200", base + chrono::Duration::hours(24)),
        ];
        mark_same_day(&mut flights);
        assert!(!flights[1].is_same_day);
    }
}
