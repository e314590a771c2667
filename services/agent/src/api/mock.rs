//! Scripted airline API for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use farewatch_config::FareCheckMode;
use farewatch_model::{
    ApiError, CheckInSuccess, ConfirmationNumber, FareSnapshot, Flight, FlightStatus,
    ReservationRef, ReservationSummary, Session,
};

use super::AirlineApi;

/// In-memory [`AirlineApi`] with scripted responses.
///
/// Each operation consumes from a per-operation queue first and falls back
/// to a fixed default; with neither configured the call fails, which makes
/// unscripted calls visible in tests. Call counters record how often each
/// operation was invoked.
#[derive(Default)]
pub struct MockApi {
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    flight_queues: HashMap<ConfirmationNumber, VecDeque<Result<FlightStatus, ApiError>>>,
    flight_defaults: HashMap<ConfirmationNumber, FlightStatus>,

    fare_queue: VecDeque<Result<Option<FareSnapshot>, ApiError>>,
    fare_default: Option<Result<Option<FareSnapshot>, ApiError>>,

    check_in_queue: VecDeque<Result<CheckInSuccess, ApiError>>,
    check_in_default: Option<Result<CheckInSuccess, ApiError>>,

    auth_queue: VecDeque<Result<Session, ApiError>>,
    auth_default: Option<Result<Session, ApiError>>,

    list_queue: VecDeque<Result<Vec<ReservationSummary>, ApiError>>,
    list_default: Option<Result<Vec<ReservationSummary>, ApiError>>,

    fetch_flight_calls: usize,
    fare_calls: usize,
    check_in_calls: usize,
    auth_calls: usize,
    list_calls: usize,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Queue one response for `fetch_flight` on a confirmation number.
    pub fn push_flight(
        &self,
        confirmation: impl Into<ConfirmationNumber>,
        result: Result<FlightStatus, ApiError>,
    ) {
        self.lock()
            .flight_queues
            .entry(confirmation.into())
            .or_default()
            .push_back(result);
    }

    /// Standing response for `fetch_flight` once its queue is drained.
    pub fn set_flight(&self, confirmation: impl Into<ConfirmationNumber>, status: FlightStatus) {
        self.lock()
            .flight_defaults
            .insert(confirmation.into(), status);
    }

    /// Remove the standing `fetch_flight` response, as when a reservation
    /// disappears from an account.
    pub fn clear_flight(&self, confirmation: impl Into<ConfirmationNumber>) {
        self.lock().flight_defaults.remove(&confirmation.into());
    }

    pub fn push_fare(&self, result: Result<Option<FareSnapshot>, ApiError>) {
        self.lock().fare_queue.push_back(result);
    }

    pub fn set_fare(&self, result: Result<Option<FareSnapshot>, ApiError>) {
        self.lock().fare_default = Some(result);
    }

    pub fn push_check_in(&self, result: Result<CheckInSuccess, ApiError>) {
        self.lock().check_in_queue.push_back(result);
    }

    pub fn set_check_in(&self, result: Result<CheckInSuccess, ApiError>) {
        self.lock().check_in_default = Some(result);
    }

    pub fn push_auth(&self, result: Result<Session, ApiError>) {
        self.lock().auth_queue.push_back(result);
    }

    pub fn set_auth(&self, result: Result<Session, ApiError>) {
        self.lock().auth_default = Some(result);
    }

    pub fn push_reservations(&self, result: Result<Vec<ReservationSummary>, ApiError>) {
        self.lock().list_queue.push_back(result);
    }

    pub fn set_reservations(&self, result: Result<Vec<ReservationSummary>, ApiError>) {
        self.lock().list_default = Some(result);
    }

    pub fn fetch_flight_calls(&self) -> usize {
        self.lock().fetch_flight_calls
    }

    pub fn fare_calls(&self) -> usize {
        self.lock().fare_calls
    }

    pub fn check_in_calls(&self) -> usize {
        self.lock().check_in_calls
    }

    pub fn auth_calls(&self) -> usize {
        self.lock().auth_calls
    }

    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    /// A plausible session for tests that do not care about its contents.
    pub fn default_session() -> Session {
        Session {
            token: "mock-token".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
        }
    }
}

fn unscripted<T>(operation: &str) -> Result<T, ApiError> {
    Err(ApiError::fatal(format!("no scripted {operation} response")))
}

#[async_trait]
impl AirlineApi for MockApi {
    async fn fetch_flight(&self, reservation: &ReservationRef) -> Result<FlightStatus, ApiError> {
        let mut state = self.lock();
        state.fetch_flight_calls += 1;
        if let Some(result) = state
            .flight_queues
            .get_mut(&reservation.confirmation_number)
            .and_then(VecDeque::pop_front)
        {
            return result;
        }
        match state.flight_defaults.get(&reservation.confirmation_number) {
            Some(status) => Ok(status.clone()),
            None => unscripted("fetch_flight"),
        }
    }

    async fn fetch_fare(
        &self,
        _reservation: &ReservationRef,
        _flight: &Flight,
        _mode: FareCheckMode,
    ) -> Result<Option<FareSnapshot>, ApiError> {
        let mut state = self.lock();
        state.fare_calls += 1;
        if let Some(result) = state.fare_queue.pop_front() {
            return result;
        }
        state
            .fare_default
            .clone()
            .unwrap_or_else(|| unscripted("fetch_fare"))
    }

    async fn check_in(&self, _reservation: &ReservationRef) -> Result<CheckInSuccess, ApiError> {
        let mut state = self.lock();
        state.check_in_calls += 1;
        if let Some(result) = state.check_in_queue.pop_front() {
            return result;
        }
        state
            .check_in_default
            .clone()
            .unwrap_or_else(|| unscripted("check_in"))
    }

    async fn authenticate(&self, _username: &str, _password: &str) -> Result<Session, ApiError> {
        let mut state = self.lock();
        state.auth_calls += 1;
        if let Some(result) = state.auth_queue.pop_front() {
            return result;
        }
        match &state.auth_default {
            Some(Ok(session)) => Ok(session.clone()),
            Some(Err(e)) => Err(e.clone()),
            None => unscripted("authenticate"),
        }
    }

    async fn list_reservations(
        &self,
        _session: &Session,
    ) -> Result<Vec<ReservationSummary>, ApiError> {
        let mut state = self.lock();
        state.list_calls += 1;
        if let Some(result) = state.list_queue.pop_front() {
            return result;
        }
        state
            .list_default
            .clone()
            .unwrap_or_else(|| unscripted("list_reservations"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queued_responses_are_consumed_in_order() {
        let api = MockApi::new();
        let reservation = ReservationRef::new("ABC123", "Jane", "Doe");
        api.push_flight("ABC123", Err(ApiError::transient("first")));
        api.push_flight("ABC123", Ok(FlightStatus::Cancelled));

        assert!(api.fetch_flight(&reservation).await.is_err());
        assert_eq!(
            api.fetch_flight(&reservation).await.unwrap(),
            FlightStatus::Cancelled
        );
        assert_eq!(api.fetch_flight_calls(), 2);
    }

    #[tokio::test]
    async fn default_applies_after_queue_drains() {
        let api = MockApi::new();
        let reservation = ReservationRef::new("ABC123", "Jane", "Doe");
        api.set_flight("ABC123", FlightStatus::Departed);
        api.push_flight("ABC123", Ok(FlightStatus::Cancelled));

        assert_eq!(
            api.fetch_flight(&reservation).await.unwrap(),
            FlightStatus::Cancelled
        );
        assert_eq!(
            api.fetch_flight(&reservation).await.unwrap(),
            FlightStatus::Departed
        );
    }

    #[tokio::test]
    async fn unscripted_calls_fail_loudly() {
        let api = MockApi::new();
        let reservation = ReservationRef::new("ABC123", "Jane", "Doe");
        let err = api.check_in(&reservation).await.unwrap_err();
        assert!(matches!(err, ApiError::Fatal { .. }));
    }
}
