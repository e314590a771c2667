//! Airline REST client.
//!
//! Maps HTTP status codes and airline error codes onto the [`ApiError`]
//! taxonomy so retry decisions happen in the monitors, never here.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use farewatch_config::FareCheckMode;
use farewatch_model::{
    ApiError, BoardingPosition, CheckInSuccess, ConfirmationNumber, FareSnapshot, Flight,
    FlightStatus, ReservationKind, ReservationRef, ReservationSummary, Session,
};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use super::AirlineApi;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Production airline API client.
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Send a request and surface transport failures as transient errors.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        request
            .send()
            .await
            .map_err(|e| ApiError::transient(e.to_string()))
    }

    /// Classify a non-success response. The airline's JSON error body
    /// carries a machine-readable `code`; status codes cover the rest.
    async fn classify_error(response: reqwest::Response) -> ApiError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if let Ok(err) = serde_json::from_str::<ErrorBody>(&body) {
            match err.code.as_str() {
                "already_checked_in" => return ApiError::AlreadyCheckedIn,
                "airport_checkin_required" => return ApiError::AirportCheckInRequired,
                "reservation_not_found" => return ApiError::NotFound,
                "invalid_credentials" => return ApiError::InvalidCredentials,
                _ => {}
            }
        }

        match status {
            StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
                ApiError::transient(format!("{status}: {body}"))
            }
            s if s.is_server_error() => ApiError::transient(format!("{status}: {body}")),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::InvalidCredentials,
            StatusCode::NOT_FOUND => ApiError::NotFound,
            _ => ApiError::fatal(format!("{status}: {body}")),
        }
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        if !response.status().is_success() {
            return Err(Self::classify_error(response).await);
        }
        // A single malformed response is treated like a dropped connection.
        response
            .json()
            .await
            .map_err(|e| ApiError::transient(format!("malformed response: {e}")))
    }
}

#[async_trait]
impl AirlineApi for RestClient {
    async fn fetch_flight(&self, reservation: &ReservationRef) -> Result<FlightStatus, ApiError> {
        let url = format!(
            "{}/v1/reservations/{}",
            self.base_url, reservation.confirmation_number
        );
        debug!(url = %url, "Fetching reservation");

        let request = self.client.get(&url).query(&[
            ("first-name", reservation.first_name.as_str()),
            ("last-name", reservation.last_name.as_str()),
        ]);
        let body: ReservationResponse = Self::parse(self.send(request).await?).await?;
        Ok(body.into_status(reservation))
    }

    async fn fetch_fare(
        &self,
        reservation: &ReservationRef,
        flight: &Flight,
        mode: FareCheckMode,
    ) -> Result<Option<FareSnapshot>, ApiError> {
        let url = format!(
            "{}/v1/reservations/{}/fare",
            self.base_url, reservation.confirmation_number
        );
        debug!(url = %url, flight = %flight.flight_number, "Fetching fare");

        let request = self.client.get(&url).query(&[
            ("first-name", reservation.first_name.as_str()),
            ("last-name", reservation.last_name.as_str()),
            ("search", mode_param(mode)),
        ]);
        let body: FareResponse = Self::parse(self.send(request).await?).await?;
        Ok(body.fare.map(FareDto::into_snapshot))
    }

    async fn check_in(&self, reservation: &ReservationRef) -> Result<CheckInSuccess, ApiError> {
        let url = format!(
            "{}/v1/reservations/{}/check-in",
            self.base_url, reservation.confirmation_number
        );
        debug!(url = %url, "Submitting check-in");

        let request = self.client.post(&url).json(&serde_json::json!({
            "first_name": reservation.first_name,
            "last_name": reservation.last_name,
        }));
        let body: CheckInResponse = Self::parse(self.send(request).await?).await?;
        Ok(CheckInSuccess {
            positions: body
                .positions
                .into_iter()
                .map(PositionDto::into_position)
                .collect(),
        })
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<Session, ApiError> {
        let url = format!("{}/v1/auth/login", self.base_url);
        debug!(url = %url, "Authenticating");

        let request = self.client.post(&url).json(&serde_json::json!({
            "username": username,
            "password": password,
        }));
        let body: LoginResponse = Self::parse(self.send(request).await?).await?;
        Ok(Session {
            token: body.token,
            first_name: body.first_name,
            last_name: body.last_name,
        })
    }

    async fn list_reservations(
        &self,
        session: &Session,
    ) -> Result<Vec<ReservationSummary>, ApiError> {
        let url = format!("{}/v1/account/reservations", self.base_url);
        debug!(url = %url, "Listing reservations");

        let request = self.client.get(&url).bearer_auth(&session.token);
        let body: ReservationListResponse = Self::parse(self.send(request).await?).await?;
        Ok(body
            .reservations
            .into_iter()
            .map(|r| ReservationSummary {
                confirmation_number: r.confirmation_number,
                kind: r.kind,
            })
            .collect())
    }
}

fn mode_param(mode: FareCheckMode) -> &'static str {
    match mode {
        FareCheckMode::Disabled | FareCheckMode::SameFlight => "same-flight",
        FareCheckMode::SameDayNonstop => "same-day-nonstop",
        FareCheckMode::SameDay => "same-day",
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
}

#[derive(Debug, Deserialize)]
struct ReservationResponse {
    status: ReservationStatusDto,
    #[serde(default)]
    flight: Option<FlightDto>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ReservationStatusDto {
    Scheduled,
    Departed,
    Cancelled,
}

impl ReservationResponse {
    fn into_status(self, reservation: &ReservationRef) -> FlightStatus {
        match (self.status, self.flight) {
            (ReservationStatusDto::Scheduled, Some(f)) => {
                FlightStatus::Scheduled(f.into_flight(reservation.confirmation_number.clone()))
            }
            // A scheduled reservation without flight data cannot be acted
            // on; treat it like a departed one so the monitor terminates.
            (ReservationStatusDto::Scheduled, None) => FlightStatus::Departed,
            (ReservationStatusDto::Departed, _) => FlightStatus::Departed,
            (ReservationStatusDto::Cancelled, _) => FlightStatus::Cancelled,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FlightDto {
    flight_number: String,
    departure_airport: String,
    destination_airport: String,
    departure_time: DateTime<Utc>,
    #[serde(default)]
    is_international: bool,
}

impl FlightDto {
    fn into_flight(self, confirmation_number: ConfirmationNumber) -> Flight {
        Flight {
            confirmation_number,
            flight_number: self.flight_number.as_str().into(),
            departure_airport: self.departure_airport,
            destination_airport: self.destination_airport,
            departure_time: self.departure_time,
            is_international: self.is_international,
            is_same_day: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FareResponse {
    #[serde(default)]
    fare: Option<FareDto>,
}

#[derive(Debug, Deserialize)]
struct FareDto {
    amount: i64,
    currency: String,
    fare_class: String,
}

impl FareDto {
    fn into_snapshot(self) -> FareSnapshot {
        FareSnapshot {
            amount: self.amount,
            currency: self.currency,
            fare_class: self.fare_class,
            retrieved_at: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CheckInResponse {
    #[serde(default)]
    positions: Vec<PositionDto>,
}

#[derive(Debug, Deserialize)]
struct PositionDto {
    passenger: String,
    group: String,
    position: String,
}

impl PositionDto {
    fn into_position(self) -> BoardingPosition {
        BoardingPosition {
            passenger: self.passenger,
            group: self.group,
            position: self.position,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    first_name: String,
    last_name: String,
}

#[derive(Debug, Deserialize)]
struct ReservationListResponse {
    reservations: Vec<ReservationSummaryDto>,
}

#[derive(Debug, Deserialize)]
struct ReservationSummaryDto {
    confirmation_number: ConfirmationNumber,
    kind: ReservationKind,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reservation() -> ReservationRef {
        ReservationRef::new("ABC123", "Jane", "Doe")
    }

    #[tokio::test]
    async fn scheduled_reservation_parses_into_flight() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/reservations/ABC123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "scheduled",
                "flight": {
                    "flight_number": "100",
                    "departure_airport": "AUS",
                    "destination_airport": "DEN",
                    "departure_time": "2026-03-14T18:00:00Z",
                    "is_international": false,
                }
            })))
            .mount(&server)
            .await;

        let client = RestClient::new(server.uri());
        let status = client.fetch_flight(&reservation()).await.unwrap();
        match status {
            FlightStatus::Scheduled(f) => {
                assert_eq!(f.flight_number.as_str(), "100");
                assert_eq!(f.confirmation_number.as_str(), "ABC123");
            }
            other => panic!("expected scheduled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rate_limit_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = RestClient::new(server.uri());
        let err = client.fetch_flight(&reservation()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = RestClient::new(server.uri());
        let err = client.fetch_flight(&reservation()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn error_code_overrides_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/reservations/ABC123/check-in"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": "airport_checkin_required",
                "message": "see an agent at the counter",
            })))
            .mount(&server)
            .await;

        let client = RestClient::new(server.uri());
        let err = client.check_in(&reservation()).await.unwrap_err();
        assert!(matches!(err, ApiError::AirportCheckInRequired));
    }

    #[tokio::test]
    async fn already_checked_in_maps_to_its_variant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "code": "already_checked_in",
            })))
            .mount(&server)
            .await;

        let client = RestClient::new(server.uri());
        let err = client.check_in(&reservation()).await.unwrap_err();
        assert!(matches!(err, ApiError::AlreadyCheckedIn));
    }

    #[tokio::test]
    async fn missing_reservation_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = RestClient::new(server.uri());
        let err = client.fetch_flight(&reservation()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[tokio::test]
    async fn rejected_login_is_invalid_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/auth/login"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = RestClient::new(server.uri());
        let err = client.authenticate("user", "hunter2").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidCredentials));
    }

    #[tokio::test]
    async fn sold_out_fare_class_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/reservations/ABC123/fare"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "fare": null })),
            )
            .mount(&server)
            .await;

        let client = RestClient::new(server.uri());
        let flight = Flight {
            confirmation_number: "ABC123".into(),
            flight_number: "100".into(),
            departure_airport: "AUS".to_string(),
            destination_airport: "DEN".to_string(),
            departure_time: Utc::now(),
            is_international: false,
            is_same_day: false,
        };
        let fare = client
            .fetch_fare(&reservation(), &flight, FareCheckMode::SameFlight)
            .await
            .unwrap();
        assert!(fare.is_none());
    }
}
