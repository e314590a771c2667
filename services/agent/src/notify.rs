//! Notification fan-out and health-check pings.
//!
//! Every user-facing event goes through [`Notifier`], which formats the
//! message once per endpoint (flight times honor the endpoint's 12/24-hour
//! preference) and delivers it to each endpoint whose minimum level the
//! message meets. Delivery failures are logged and never fail the caller.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use farewatch_config::{NotificationEndpoint, ResolvedConfig};
use farewatch_model::{ApiError, CheckInSuccess, FareDrop, FareSnapshot, Flight, NotificationLevel};
use tracing::{debug, info, warn};

/// Placeholder substituted with each flight's departure time, formatted
/// per endpoint.
pub const FLIGHT_TIME_PLACEHOLDER: &str = "FLIGHT_TIME";

const NOTIFICATION_TITLE: &str = "farewatch";
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers formatted notifications to a single endpoint URL.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn deliver(&self, url: &str, title: &str, body: &str) -> anyhow::Result<()>;

    /// Plain ping with a small text payload, used for health checks.
    async fn ping(&self, url: &str, body: &str) -> anyhow::Result<()>;
}

/// HTTP transport posting JSON payloads.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationTransport for HttpTransport {
    async fn deliver(&self, url: &str, title: &str, body: &str) -> anyhow::Result<()> {
        self.client
            .post(url)
            .json(&serde_json::json!({ "title": title, "body": body }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn ping(&self, url: &str, body: &str) -> anyhow::Result<()> {
        self.client
            .post(url)
            .body(body.to_string())
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// One delivered notification, captured by [`RecordingTransport`].
#[derive(Debug, Clone)]
pub struct SentNotification {
    pub url: String,
    pub body: String,
}

/// In-memory transport for tests.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<SentNotification>>,
    pings: Mutex<Vec<String>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        match self.sent.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent().len()
    }

    /// Bodies containing the given fragment, for asserting on counts.
    pub fn bodies_containing(&self, fragment: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|n| n.body.contains(fragment))
            .map(|n| n.body)
            .collect()
    }

    /// URLs pinged, in order. Failure pings carry a `/fail` suffix.
    pub fn pings(&self) -> Vec<String> {
        match self.pings.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl NotificationTransport for RecordingTransport {
    async fn deliver(&self, url: &str, _title: &str, body: &str) -> anyhow::Result<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentNotification {
                url: url.to_string(),
                body: body.to_string(),
            });
        }
        Ok(())
    }

    async fn ping(&self, url: &str, _body: &str) -> anyhow::Result<()> {
        if let Ok(mut pings) = self.pings.lock() {
            pings.push(url.to_string());
        }
        Ok(())
    }
}

struct Inner {
    endpoints: Vec<NotificationEndpoint>,
    healthchecks_url: Option<String>,
    traveler: String,
    transport: Arc<dyn NotificationTransport>,
}

/// Level-filtered notification sender bound to one traveler.
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<Inner>,
}

impl Notifier {
    pub fn new(
        settings: &ResolvedConfig,
        traveler: impl Into<String>,
        transport: Arc<dyn NotificationTransport>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                endpoints: settings.notifications.clone(),
                healthchecks_url: settings.healthchecks_url.clone(),
                traveler: traveler.into(),
                transport,
            }),
        }
    }

    /// Deliver `body` to every endpoint whose minimum level `level` meets.
    /// Occurrences of [`FLIGHT_TIME_PLACEHOLDER`] are replaced with the
    /// given flights' departure times in the endpoint's preferred format.
    pub async fn send(&self, body: &str, level: NotificationLevel, flights: &[&Flight]) {
        for endpoint in &self.inner.endpoints {
            if level < endpoint.level {
                continue;
            }
            let formatted = format_flight_times(body, flights, endpoint.twenty_four_hour_time);
            info!(level = %level, url = %endpoint.url, "Sending notification");
            if let Err(e) = self
                .inner
                .transport
                .deliver(&endpoint.url, NOTIFICATION_TITLE, &formatted)
                .await
            {
                warn!(url = %endpoint.url, error = %e, "Failed to deliver notification");
            }
        }
    }

    /// Deliver a test message to every endpoint, bypassing level filters.
    pub async fn send_test(&self) {
        for endpoint in &self.inner.endpoints {
            info!(url = %endpoint.url, "Sending test notification");
            let body = "This is a test message from farewatch. \
                        If you received this, your notification endpoint works.";
            if let Err(e) = self
                .inner
                .transport
                .deliver(&endpoint.url, NOTIFICATION_TITLE, body)
                .await
            {
                warn!(url = %endpoint.url, error = %e, "Failed to deliver notification");
            }
        }
    }

    /// Fire-and-forget health-check ping. Failures append `/fail` to the
    /// configured URL, matching the healthchecks.io convention.
    pub fn ping_health(&self, success: bool, data: impl Into<String>) {
        let Some(base) = self.inner.healthchecks_url.clone() else {
            return;
        };
        let url = if success { base } else { format!("{base}/fail") };
        let transport = Arc::clone(&self.inner.transport);
        let data = data.into();
        tokio::spawn(async move {
            if let Err(e) = transport.ping(&url, &data).await {
                debug!(error = %e, "Health check ping failed");
            }
        });
    }

    pub async fn new_flights(&self, flights: &[Flight]) {
        if flights.is_empty() {
            return;
        }
        let mut body = format!("Scheduling check-ins for {}:\n", self.inner.traveler);
        for flight in flights {
            body.push_str(&format!(
                "  Flight {} from {} at {FLIGHT_TIME_PLACEHOLDER}\n",
                flight.flight_number, flight.departure_airport
            ));
        }
        if flights.iter().any(|f| f.is_international) {
            body.push_str(
                "International flight detected. Make sure passport information \
                 is saved on the reservation before check-in opens.\n",
            );
        }
        let refs: Vec<&Flight> = flights.iter().collect();
        self.send(&body, NotificationLevel::Info, &refs).await;
    }

    pub async fn flight_changed(&self, flight: &Flight) {
        let mut body = format!(
            "Flight {} for {} was rescheduled. New departure from {} at \
             {FLIGHT_TIME_PLACEHOLDER}. The check-in was adjusted to match.",
            flight.flight_number, self.inner.traveler, flight.departure_airport
        );
        if flight.is_international {
            body.push_str(
                " International flight: make sure passport information is \
                 still saved on the reservation.",
            );
        }
        self.send(&body, NotificationLevel::Info, &[flight]).await;
    }

    pub async fn flight_cancelled(&self, flight: &Flight) {
        let body = format!(
            "Flight {} from {} for {} was cancelled. The check-in was removed.",
            flight.flight_number,
            flight.departure_airport,
            self.inner.traveler
        );
        self.send(&body, NotificationLevel::Error, &[flight]).await;
    }

    pub async fn flight_departed(&self, flight: &Flight) {
        let body = format!(
            "Flight {} for {} departed before check-in could be completed.",
            flight.flight_number, self.inner.traveler
        );
        self.send(&body, NotificationLevel::Error, &[flight]).await;
    }

    pub async fn checkin_succeeded(&self, flight: &Flight, result: &CheckInSuccess) {
        let mut body = format!(
            "Successfully checked in {} for flight {} from {} to {}!\n",
            self.inner.traveler,
            flight.flight_number,
            flight.departure_airport,
            flight.destination_airport
        );
        for position in &result.positions {
            body.push_str(&format!(
                "  {} got {}{}\n",
                position.passenger, position.group, position.position
            ));
        }
        self.send(&body, NotificationLevel::Info, &[flight]).await;
    }

    pub async fn checkin_failed(&self, flight: &Flight, error: &ApiError) {
        let body = format!(
            "Failed to check in {} for flight {} from {}: {error}. \
             Check in manually as soon as possible.",
            self.inner.traveler, flight.flight_number, flight.departure_airport
        );
        self.send(&body, NotificationLevel::Error, &[flight]).await;
    }

    pub async fn airport_checkin_required(&self, flight: &Flight) {
        let body = format!(
            "Flight {} for {} requires check-in at the airport counter. \
             Online check-in is not available for this reservation.",
            flight.flight_number, self.inner.traveler
        );
        self.send(&body, NotificationLevel::Error, &[flight]).await;
    }

    pub async fn lower_fare(&self, flight: &Flight, fare: &FareSnapshot, drop: &FareDrop) {
        let body = format!(
            "Lower fare found for {} on flight {}: now {}, down {} {}. \
             Rebook to collect the difference.",
            self.inner.traveler,
            flight.flight_number,
            fare.display(),
            drop.amount,
            drop.currency
        );
        self.send(&body, NotificationLevel::Info, &[flight]).await;
    }

    pub async fn failed_login(&self, username: &str, error: &ApiError) {
        let body = format!("Failed to log in to account {username}: {error}");
        self.send(&body, NotificationLevel::Error, &[]).await;
    }

    pub async fn login_rate_limited(&self, username: &str) {
        let body = format!(
            "Login for account {username} was rate limited. \
             Skipping reservation retrieval until the next interval."
        );
        self.send(&body, NotificationLevel::Notice, &[]).await;
    }

    pub async fn failed_reservation_retrieval(&self, confirmation: &str, error: &ApiError) {
        let body = format!(
            "Failed to retrieve reservation {confirmation} for {}: {error}",
            self.inner.traveler
        );
        self.send(&body, NotificationLevel::Error, &[]).await;
    }
}

/// Replace placeholder occurrences with departure times, one flight per
/// occurrence in order. Extra occurrences are left as-is.
fn format_flight_times(body: &str, flights: &[&Flight], twenty_four_hour: bool) -> String {
    let mut formatted = body.to_string();
    for flight in flights {
        let time = if twenty_four_hour {
            flight.departure_time.format("%Y-%m-%d %H:%M UTC")
        } else {
            flight.departure_time.format("%Y-%m-%d %-I:%M %p UTC")
        };
        formatted = formatted.replacen(FLIGHT_TIME_PLACEHOLDER, &time.to_string(), 1);
    }
    formatted
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;

    fn flight(number: &str) -> Flight {
        Flight {
            confirmation_number: "ABC123".into(),
            flight_number: number.into(),
            departure_airport: "AUS".to_string(),
            destination_airport: "DEN".to_string(),
            departure_time: Utc.with_ymd_and_hms(2026, 3, 14, 18, 30, 0).unwrap(),
            is_international: false,
            is_same_day: false,
        }
    }

    fn endpoint(url: &str, level: NotificationLevel, twenty_four: bool) -> NotificationEndpoint {
        NotificationEndpoint {
            url: url.to_string(),
            level,
            twenty_four_hour_time: twenty_four,
        }
    }

    fn settings(endpoints: Vec<NotificationEndpoint>) -> ResolvedConfig {
        ResolvedConfig {
            notifications: endpoints,
            ..ResolvedConfig::default()
        }
    }

    #[tokio::test]
    async fn endpoints_filter_by_minimum_level() {
        let transport = RecordingTransport::new();
        let notifier = Notifier::new(
            &settings(vec![
                endpoint("https://a.example/hook", NotificationLevel::Notice, false),
                endpoint("https://b.example/hook", NotificationLevel::Error, false),
            ]),
            "Jane Doe",
            transport.clone(),
        );

        notifier.send("informational", NotificationLevel::Info, &[]).await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url, "https://a.example/hook");
    }

    #[tokio::test]
    async fn error_level_reaches_every_endpoint() {
        let transport = RecordingTransport::new();
        let notifier = Notifier::new(
            &settings(vec![
                endpoint("https://a.example/hook", NotificationLevel::Notice, false),
                endpoint("https://b.example/hook", NotificationLevel::Error, false),
            ]),
            "Jane Doe",
            transport.clone(),
        );

        let f = flight("100");
        notifier.flight_cancelled(&f).await;
        assert_eq!(transport.sent_count(), 2);
    }

    #[tokio::test]
    async fn flight_time_formatting_honors_endpoint_preference() {
        let transport = RecordingTransport::new();
        let notifier = Notifier::new(
            &settings(vec![
                endpoint("https://12h.example/hook", NotificationLevel::Info, false),
                endpoint("https://24h.example/hook", NotificationLevel::Info, true),
            ]),
            "Jane Doe",
            transport.clone(),
        );

        let f = flight("100");
        notifier.flight_changed(&f).await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].body.contains("2026-03-14 6:30 PM UTC"), "{}", sent[0].body);
        assert!(sent[1].body.contains("2026-03-14 18:30 UTC"), "{}", sent[1].body);
    }

    #[test]
    fn placeholder_replacement_is_positional() {
        let a = flight("100");
        let mut b = flight("200");
        b.departure_time = Utc.with_ymd_and_hms(2026, 3, 15, 9, 0, 0).unwrap();
        let body = format!("first {FLIGHT_TIME_PLACEHOLDER}, second {FLIGHT_TIME_PLACEHOLDER}");
        let formatted = format_flight_times(&body, &[&a, &b], true);
        assert_eq!(formatted, "first 2026-03-14 18:30 UTC, second 2026-03-15 09:00 UTC");
    }

    #[tokio::test]
    async fn international_flights_add_passport_reminder() {
        let transport = RecordingTransport::new();
        let notifier = Notifier::new(
            &settings(vec![endpoint(
                "https://a.example/hook",
                NotificationLevel::Info,
                false,
            )]),
            "Jane Doe",
            transport.clone(),
        );

        let mut f = flight("100");
        f.is_international = true;
        notifier.new_flights(&[f]).await;

        assert_eq!(transport.bodies_containing("passport information").len(), 1);
    }

    #[tokio::test]
    async fn reschedule_repeats_passport_reminder_for_international() {
        let transport = RecordingTransport::new();
        let notifier = Notifier::new(
            &settings(vec![endpoint(
                "https://a.example/hook",
                NotificationLevel::Info,
                false,
            )]),
            "Jane Doe",
            transport.clone(),
        );

        let mut f = flight("100");
        f.is_international = true;
        notifier.flight_changed(&f).await;
        assert_eq!(transport.bodies_containing("passport information").len(), 1);

        f.is_international = false;
        notifier.flight_changed(&f).await;
        assert_eq!(transport.bodies_containing("passport information").len(), 1);
    }

    #[tokio::test]
    async fn test_message_bypasses_level_filter() {
        let transport = RecordingTransport::new();
        let notifier = Notifier::new(
            &settings(vec![endpoint(
                "https://a.example/hook",
                NotificationLevel::Error,
                false,
            )]),
            "Jane Doe",
            transport.clone(),
        );

        notifier.send_test().await;
        assert_eq!(transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn health_ping_appends_fail_suffix_on_failure() {
        let transport = RecordingTransport::new();
        let mut config = settings(vec![]);
        config.healthchecks_url = Some("https://hc.example/ping/uuid".to_string());
        let notifier = Notifier::new(&config, "Jane Doe", transport.clone());

        notifier.ping_health(true, "ok");
        notifier.ping_health(false, "fare check failed");
        // Pings are spawned; yield until they land.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        let pings = transport.pings();
        assert_eq!(pings.len(), 2);
        assert!(pings.contains(&"https://hc.example/ping/uuid".to_string()));
        assert!(pings.contains(&"https://hc.example/ping/uuid/fail".to_string()));
    }

    #[tokio::test]
    async fn missing_healthchecks_url_is_a_noop() {
        let transport = RecordingTransport::new();
        let notifier = Notifier::new(&settings(vec![]), "Jane Doe", transport.clone());
        notifier.ping_health(true, "ok");
        tokio::task::yield_now().await;
        assert!(transport.pings().is_empty());
    }
}