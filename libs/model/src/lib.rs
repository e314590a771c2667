//! # farewatch-model
//!
//! Domain types shared by the farewatch monitors and their boundaries.
//!
//! ## Design Principles
//!
//! - Flights are identified by flight number + departure time; that identity
//!   is what lets a monitor tell a rescheduled flight apart from a new one
//! - Fare amounts are integers in minor currency units; comparisons never
//!   touch floating point
//! - The error taxonomy is explicit: callers match on `ApiError` variants
//!   instead of inspecting strings or status codes

mod error;
mod fare;
mod types;

pub use error::{ApiError, MonitorOutcome};
pub use fare::{FareDrop, FareSnapshot, FareTracker, FARE_NOISE_THRESHOLD};
pub use types::{
    BoardingPosition, CheckInSuccess, ConfirmationNumber, Flight, FlightNumber, FlightStatus,
    NotificationLevel, ReservationKind, ReservationRef, ReservationSummary, Session,
};
