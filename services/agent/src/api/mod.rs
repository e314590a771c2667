//! Airline API boundary.
//!
//! Monitors never touch HTTP directly; everything goes through the
//! [`AirlineApi`] trait. [`RestClient`] is the production implementation,
//! [`MockApi`] scripts responses for tests.

use async_trait::async_trait;
use farewatch_config::FareCheckMode;
use farewatch_model::{
    ApiError, CheckInSuccess, FareSnapshot, Flight, FlightStatus, ReservationRef,
    ReservationSummary, Session,
};

pub mod mock;
pub mod rest;

pub use mock::MockApi;
pub use rest::RestClient;

/// Operations the airline exposes to the monitors.
#[async_trait]
pub trait AirlineApi: Send + Sync {
    /// Current state of one reservation's flight. On success this carries
    /// the authoritative snapshot; callers compare departure times against
    /// what they last saw to detect schedule changes.
    async fn fetch_flight(&self, reservation: &ReservationRef) -> Result<FlightStatus, ApiError>;

    /// Lowest matching fare for a flight under the given search mode.
    /// `Ok(None)` means the original fare class is sold out or otherwise
    /// unavailable; the caller skips comparison for this cycle.
    async fn fetch_fare(
        &self,
        reservation: &ReservationRef,
        flight: &Flight,
        mode: FareCheckMode,
    ) -> Result<Option<FareSnapshot>, ApiError>;

    /// Submit the check-in for a reservation.
    async fn check_in(&self, reservation: &ReservationRef) -> Result<CheckInSuccess, ApiError>;

    /// Log in to an account and obtain a session.
    async fn authenticate(&self, username: &str, password: &str) -> Result<Session, ApiError>;

    /// Upcoming reservations on the authenticated account.
    async fn list_reservations(
        &self,
        session: &Session,
    ) -> Result<Vec<ReservationSummary>, ApiError>;
}
