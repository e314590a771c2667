//! Per-flight check-in monitor.
//!
//! Sleeps until the check-in window opens (24 hours before departure),
//! running fare checks on their own interval along the way. Just before
//! submitting, the flight is re-fetched so a schedule change made while we
//! slept re-arms the timer instead of checking in against stale data.

use std::sync::Arc;

use farewatch_config::ResolvedConfig;
use farewatch_model::{
    ApiError, CheckInSuccess, FareTracker, Flight, FlightStatus, MonitorOutcome, ReservationRef,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::AirlineApi;
use crate::notify::Notifier;
use crate::timer::{self, Clock, WaitResult};

use super::RetryPolicy;

/// Why a step stopped before producing a value.
enum StepError {
    Api(ApiError),
    Shutdown,
}

/// Monitors one reservation's flight through to check-in.
pub struct ReservationMonitor {
    reservation: ReservationRef,
    settings: ResolvedConfig,
    api: Arc<dyn AirlineApi>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    shutdown: watch::Receiver<bool>,
    initial_flight: Option<Flight>,
}

impl ReservationMonitor {
    pub fn new(
        reservation: ReservationRef,
        settings: ResolvedConfig,
        api: Arc<dyn AirlineApi>,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            reservation,
            settings,
            api,
            notifier,
            clock,
            retry,
            shutdown,
            initial_flight: None,
        }
    }

    /// Start from a flight the account monitor already fetched, skipping
    /// the initial lookup and its new-flight notification.
    pub fn with_flight(mut self, flight: Flight) -> Self {
        self.initial_flight = Some(flight);
        self
    }

    /// Run to a terminal state: checked in, failed, or interrupted.
    pub async fn run(mut self) -> MonitorOutcome {
        info!(
            confirmation = %self.reservation.confirmation_number,
            "Starting reservation monitor"
        );

        let mut flight = match self.initial_flight.take() {
            Some(flight) => flight,
            None => match self.initialize().await {
                Ok(flight) => flight,
                Err(outcome) => return outcome,
            },
        };

        let fare_interval = timer::chrono_interval(self.settings.fare_check_interval);
        let mut fares = FareTracker::new();
        let mut next_fare_check = self
            .settings
            .check_fares
            .is_enabled()
            .then(|| self.clock.now() + fare_interval);

        loop {
            let checkin_at = flight.checkin_time();
            let fare_wake = next_fare_check.filter(|at| *at < checkin_at);
            let target = fare_wake.unwrap_or(checkin_at);

            debug!(
                confirmation = %self.reservation.confirmation_number,
                target = %target,
                fare_check = fare_wake.is_some(),
                "Sleeping until next wake"
            );
            if timer::sleep_until(target, self.clock.as_ref(), &mut self.shutdown).await
                == WaitResult::Shutdown
            {
                return self.interrupted(&flight);
            }

            if fare_wake.is_some() {
                self.run_fare_check(&flight, &mut fares).await;
                next_fare_check = Some(self.clock.now() + fare_interval);
                continue;
            }

            // Check-in window opened. Re-fetch so we act on current data.
            match self.fetch_status_with_retry().await {
                Ok(FlightStatus::Scheduled(current)) => {
                    if current.departure_time == flight.departure_time {
                        return self.perform_check_in(&flight).await;
                    }

                    info!(
                        flight = %flight.flight_number,
                        old_departure = %flight.departure_time,
                        new_departure = %current.departure_time,
                        "Departure time changed while waiting"
                    );
                    let is_same_day = flight.is_same_day;
                    flight = Flight {
                        is_same_day,
                        ..current
                    };

                    if self.clock.now() >= flight.checkin_time() {
                        // Still due; no point announcing a re-arm.
                        return self.perform_check_in(&flight).await;
                    }
                    self.notifier.flight_changed(&flight).await;
                }
                Ok(FlightStatus::Cancelled) => {
                    warn!(flight = %flight.flight_number, "Flight was cancelled");
                    self.notifier.flight_cancelled(&flight).await;
                    return MonitorOutcome::failed(format!(
                        "flight {} was cancelled",
                        flight.flight_number
                    ));
                }
                Ok(FlightStatus::Departed) => {
                    warn!(flight = %flight.flight_number, "Flight already departed");
                    self.notifier.flight_departed(&flight).await;
                    return MonitorOutcome::failed(format!(
                        "flight {} departed before check-in",
                        flight.flight_number
                    ));
                }
                Err(StepError::Api(ApiError::NotFound)) => {
                    warn!(flight = %flight.flight_number, "Reservation no longer exists");
                    self.notifier.flight_cancelled(&flight).await;
                    return MonitorOutcome::failed(format!(
                        "reservation {} no longer exists",
                        self.reservation.confirmation_number
                    ));
                }
                Err(StepError::Api(e)) => {
                    self.notifier.checkin_failed(&flight, &e).await;
                    return MonitorOutcome::failed(format!(
                        "could not confirm flight {} before check-in: {e}",
                        flight.flight_number
                    ));
                }
                Err(StepError::Shutdown) => return self.interrupted(&flight),
            }
        }
    }

    /// Initial lookup for directly-configured reservations. Announces the
    /// flight the same way account discovery does.
    async fn initialize(&mut self) -> Result<Flight, MonitorOutcome> {
        match self.fetch_status_with_retry().await {
            Ok(FlightStatus::Scheduled(flight)) => {
                info!(
                    flight = %flight.flight_number,
                    route = %flight.route(),
                    departure = %flight.departure_time,
                    "Found scheduled flight"
                );
                self.notifier.new_flights(std::slice::from_ref(&flight)).await;
                Ok(flight)
            }
            Ok(FlightStatus::Departed) => Err(MonitorOutcome::failed(format!(
                "reservation {} has no upcoming flights",
                self.reservation.confirmation_number
            ))),
            Ok(FlightStatus::Cancelled) | Err(StepError::Api(ApiError::NotFound)) => {
                let err = ApiError::NotFound;
                self.notifier
                    .failed_reservation_retrieval(self.reservation.confirmation_number.as_str(), &err)
                    .await;
                Err(MonitorOutcome::failed(format!(
                    "reservation {} was cancelled or does not exist",
                    self.reservation.confirmation_number
                )))
            }
            Err(StepError::Api(e)) => {
                self.notifier
                    .failed_reservation_retrieval(self.reservation.confirmation_number.as_str(), &e)
                    .await;
                Err(MonitorOutcome::failed(format!(
                    "failed to retrieve reservation {}: {e}",
                    self.reservation.confirmation_number
                )))
            }
            Err(StepError::Shutdown) => Err(MonitorOutcome::Interrupted),
        }
    }

    async fn fetch_status_with_retry(&mut self) -> Result<FlightStatus, StepError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.api.fetch_flight(&self.reservation).await {
                Ok(status) => return Ok(status),
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    warn!(
                        confirmation = %self.reservation.confirmation_number,
                        attempt,
                        error = %e,
                        "Transient error fetching reservation, retrying"
                    );
                    if timer::sleep_for(self.retry.backoff, &mut self.shutdown).await
                        == WaitResult::Shutdown
                    {
                        return Err(StepError::Shutdown);
                    }
                }
                Err(e) => return Err(StepError::Api(e)),
            }
        }
    }

    async fn perform_check_in(&mut self, flight: &Flight) -> MonitorOutcome {
        info!(
            flight = %flight.flight_number,
            route = %flight.route(),
            "Check-in window open, submitting"
        );
        if flight.is_same_day {
            warn!(
                flight = %flight.flight_number,
                "Overlapping check-in windows on this account; a later leg \
                 may check in before an earlier one"
            );
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.api.check_in(&self.reservation).await {
                Ok(result) => {
                    info!(flight = %flight.flight_number, "Check-in succeeded");
                    self.notifier.checkin_succeeded(flight, &result).await;
                    self.notifier
                        .ping_health(true, format!("checked in flight {}", flight.flight_number));
                    return MonitorOutcome::Completed;
                }
                Err(ApiError::AlreadyCheckedIn) => {
                    info!(flight = %flight.flight_number, "Already checked in");
                    self.notifier
                        .checkin_succeeded(flight, &CheckInSuccess::default())
                        .await;
                    return MonitorOutcome::Completed;
                }
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    warn!(
                        flight = %flight.flight_number,
                        attempt,
                        error = %e,
                        "Transient check-in failure, retrying"
                    );
                    if timer::sleep_for(self.retry.backoff, &mut self.shutdown).await
                        == WaitResult::Shutdown
                    {
                        return self.interrupted(flight);
                    }
                }
                Err(ApiError::AirportCheckInRequired) => {
                    warn!(flight = %flight.flight_number, "Airport check-in required");
                    self.notifier.airport_checkin_required(flight).await;
                    self.notifier.ping_health(
                        false,
                        format!("airport check-in required for flight {}", flight.flight_number),
                    );
                    return MonitorOutcome::failed(format!(
                        "flight {} requires airport check-in",
                        flight.flight_number
                    ));
                }
                Err(e) => {
                    warn!(flight = %flight.flight_number, error = %e, "Check-in failed");
                    self.notifier.checkin_failed(flight, &e).await;
                    self.notifier.ping_health(
                        false,
                        format!("check-in failed for flight {}", flight.flight_number),
                    );
                    return MonitorOutcome::failed(format!(
                        "check-in failed for flight {}: {e}",
                        flight.flight_number
                    ));
                }
            }
        }
    }

    /// A failed fare check never fails the monitor; the next interval
    /// tries again.
    async fn run_fare_check(&mut self, flight: &Flight, fares: &mut FareTracker) {
        debug!(flight = %flight.flight_number, "Checking fare");
        match self
            .api
            .fetch_fare(&self.reservation, flight, self.settings.check_fares)
            .await
        {
            Ok(Some(snapshot)) => {
                if let Some(drop) = fares.observe(snapshot.clone()) {
                    info!(
                        flight = %flight.flight_number,
                        fare = %snapshot.display(),
                        dropped_by = drop.amount,
                        "Fare dropped"
                    );
                    self.notifier.lower_fare(flight, &snapshot, &drop).await;
                }
                self.notifier
                    .ping_health(true, format!("fare check for flight {}", flight.flight_number));
            }
            Ok(None) => {
                debug!(
                    flight = %flight.flight_number,
                    "Fare class unavailable, skipping comparison"
                );
                self.notifier
                    .ping_health(true, format!("fare check for flight {}", flight.flight_number));
            }
            Err(e) => {
                warn!(
                    flight = %flight.flight_number,
                    error = %e,
                    "Fare check failed, will retry next interval"
                );
                self.notifier
                    .ping_health(false, format!("fare check failed for flight {}", flight.flight_number));
            }
        }
    }

    fn interrupted(&self, flight: &Flight) -> MonitorOutcome {
        warn!(
            flight = %flight.flight_number,
            departure = %flight.departure_time,
            "Shutting down before check-in completed; this flight is NOT checked in"
        );
        MonitorOutcome::Interrupted
    }
}
