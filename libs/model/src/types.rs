//! Core reservation and flight types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lead time between check-in opening and departure.
pub(crate) const CHECKIN_LEAD_HOURS: i64 = 24;

/// A flight number as reported by the airline, e.g. `"1234"` or `"100/200"`
/// for multi-leg itineraries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlightNumber(String);

impl FlightNumber {
    pub fn new(number: impl Into<String>) -> Self {
        Self(number.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FlightNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FlightNumber {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A booking confirmation number (record locator).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfirmationNumber(String);

impl ConfirmationNumber {
    pub fn new(number: impl Into<String>) -> Self {
        Self(number.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConfirmationNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConfirmationNumber {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// What the airline needs to look up or check in one traveler's reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRef {
    pub confirmation_number: ConfirmationNumber,
    pub first_name: String,
    pub last_name: String,
}

impl ReservationRef {
    pub fn new(
        confirmation_number: impl Into<ConfirmationNumber>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            confirmation_number: confirmation_number.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    /// Traveler's display name, used in notifications.
    #[must_use]
    pub fn traveler_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A single scheduled flight on a reservation.
///
/// Departure times are timezone-aware and stored in UTC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub confirmation_number: ConfirmationNumber,
    pub flight_number: FlightNumber,
    pub departure_airport: String,
    pub destination_airport: String,
    pub departure_time: DateTime<Utc>,

    /// The arrival airport is outside the carrier's home country. Used for
    /// the passport-information reminder.
    #[serde(default)]
    pub is_international: bool,

    /// Another flight on the same account departs within 24 hours of this
    /// one, so the check-in windows overlap.
    #[serde(default)]
    pub is_same_day: bool,
}

impl Flight {
    /// The instant check-in opens: 24 hours before departure.
    #[must_use]
    pub fn checkin_time(&self) -> DateTime<Utc> {
        self.departure_time - Duration::hours(CHECKIN_LEAD_HOURS)
    }

    /// Short description safe for logs (no traveler names).
    #[must_use]
    pub fn route(&self) -> String {
        format!("{} -> {}", self.departure_airport, self.destination_airport)
    }
}

/// Two flights are the same logical flight when the flight number and the
/// departure time match. A rescheduled flight keeps its number but moves its
/// time, which is how monitors detect a change rather than a new flight.
impl PartialEq for Flight {
    fn eq(&self, other: &Self) -> bool {
        self.flight_number == other.flight_number && self.departure_time == other.departure_time
    }
}

impl Eq for Flight {}

/// Authoritative flight state returned by the airline boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum FlightStatus {
    /// The flight is still scheduled. Carries the current snapshot; its
    /// departure time may differ from what the caller last saw.
    Scheduled(Flight),
    /// The flight already departed.
    Departed,
    /// The flight was cancelled.
    Cancelled,
}

/// Kind of item returned by an account's reservation listing. Only flights
/// are monitored; companion passes and other reservation types are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationKind {
    Flight,
    CompanionPass,
    Other,
}

/// One entry from an account's upcoming-reservations listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationSummary {
    pub confirmation_number: ConfirmationNumber,
    pub kind: ReservationKind,
}

/// An authenticated account session. The token is opaque to the monitors;
/// the traveler name comes from the login response and is used to build
/// reservation refs for discovered flights.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub first_name: String,
    pub last_name: String,
}

/// One passenger's assigned boarding slot after a successful check-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardingPosition {
    pub passenger: String,
    pub group: String,
    pub position: String,
}

/// Result of a successful check-in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInSuccess {
    pub positions: Vec<BoardingPosition>,
}

/// Notification severity, ordered from least to most urgent. An endpoint
/// configured at a given level receives messages at that level or above.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Notice,
    Info,
    Error,
}

impl NotificationLevel {
    /// Parse the numeric form accepted in environment variables
    /// (1 = notice, 2 = info, 3 = error).
    pub fn from_priority(priority: u8) -> Option<Self> {
        match priority {
            1 => Some(Self::Notice),
            2 => Some(Self::Info),
            3 => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Notice => "notice",
            Self::Info => "info",
            Self::Error => "error",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn flight(number: &str, departure: DateTime<Utc>) -> Flight {
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
    fn checkin_time_is_24h_before_departure() {
        let departure = Utc.with_ymd_and_hms(2026, 3, 14, 18, 0, 0).unwrap();
        let f = flight("100", departure);
        assert_eq!(f.checkin_time(), departure - Duration::hours(24));
    }

    #[test]
    fn rescheduled_flight_is_not_equal() {
        let departure = Utc.with_ymd_and_hms(2026, 3, 14, 18, 0, 0).unwrap();
        let original = flight("100", departure);
        let rescheduled = flight("100", departure + Duration::hours(2));
        assert_ne!(original, rescheduled);
    }

    #[test]
    fn same_flight_ignores_airport_fields() {
        let departure = Utc.with_ymd_and_hms(2026, 3, 14, 18, 0, 0).unwrap();
        let a = flight("100", departure);
        let mut b = flight("100", departure);
        b.destination_airport = "Denver".to_string();
        assert_eq!(a, b);
    }

    #[test]
    fn notification_levels_are_ordered() {
        assert!(NotificationLevel::Notice < NotificationLevel::Info);
        assert!(NotificationLevel::Info < NotificationLevel::Error);
    }

    #[test]
    fn notification_level_from_priority() {
        assert_eq!(
            NotificationLevel::from_priority(2),
            Some(NotificationLevel::Info)
        );
        assert_eq!(NotificationLevel::from_priority(9), None);
    }

    #[test]
    fn level_serde_roundtrip() {
        let json = serde_json::to_string(&NotificationLevel::Error).unwrap();
        assert_eq!(json, "\"error\"");
    }
}
