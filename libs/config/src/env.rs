//! Environment variable overrides.
//!
//! Every override uses the `FAREWATCH_` prefix. Credentials and reservation
//! details from the environment are appended as extra sections rather than
//! replacing anything from the file.

use farewatch_model::NotificationLevel;
use tracing::warn;

use crate::error::ConfigError;
use crate::schema::{AccountSection, ConfigFile, NotificationEndpoint, ReservationSection};

const CHECK_FARES: &str = "FAREWATCH_CHECK_FARES";
const RETRIEVAL_INTERVAL: &str = "FAREWATCH_RETRIEVAL_INTERVAL";
const FARE_CHECK_INTERVAL: &str = "FAREWATCH_FARE_CHECK_INTERVAL";
const HEALTHCHECKS_URL: &str = "FAREWATCH_HEALTHCHECKS_URL";
const USERNAME: &str = "FAREWATCH_USERNAME";
const PASSWORD: &str = "FAREWATCH_PASSWORD";
const CONFIRMATION_NUMBER: &str = "FAREWATCH_CONFIRMATION_NUMBER";
const FIRST_NAME: &str = "FAREWATCH_FIRST_NAME";
const LAST_NAME: &str = "FAREWATCH_LAST_NAME";
const NOTIFICATION_URL: &str = "FAREWATCH_NOTIFICATION_URL";
const NOTIFICATION_LEVEL: &str = "FAREWATCH_NOTIFICATION_LEVEL";
const NOTIFICATION_24H: &str = "FAREWATCH_NOTIFICATION_24_HOUR_TIME";

/// Apply environment overrides onto a parsed config file. The lookup is
/// injected so tests do not mutate process state.
pub fn apply_env(
    file: &mut ConfigFile,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(value) = lookup(CHECK_FARES) {
        let mode = value
            .parse()
            .map_err(|reason: String| ConfigError::invalid_env(CHECK_FARES, reason))?;
        file.check_fares = Some(mode);
    }

    if let Some(value) = lookup(RETRIEVAL_INTERVAL) {
        file.retrieval_interval_hours = Some(parse_hours(RETRIEVAL_INTERVAL, &value)?);
    }

    if let Some(value) = lookup(FARE_CHECK_INTERVAL) {
        file.fare_check_interval_hours = Some(parse_hours(FARE_CHECK_INTERVAL, &value)?);
    }

    if let Some(url) = lookup(HEALTHCHECKS_URL) {
        file.healthchecks_url = Some(url);
    }

    // Credentials only count when both halves are present.
    if let (Some(username), Some(password)) = (lookup(USERNAME), lookup(PASSWORD)) {
        file.accounts.push(AccountSection {
            username,
            password,
            ..AccountSection::default()
        });
    }

    if let (Some(confirmation_number), Some(first_name), Some(last_name)) = (
        lookup(CONFIRMATION_NUMBER),
        lookup(FIRST_NAME),
        lookup(LAST_NAME),
    ) {
        file.reservations.push(ReservationSection {
            confirmation_number,
            first_name,
            last_name,
            ..ReservationSection::default()
        });
    }

    apply_notification_env(file, lookup)
}

fn apply_notification_env(
    file: &mut ConfigFile,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    let level = lookup(NOTIFICATION_LEVEL);
    let twenty_four = lookup(NOTIFICATION_24H);

    let Some(url) = lookup(NOTIFICATION_URL) else {
        // A level or time format without a URL would be silently ignored;
        // warn so the user knows the variable took no effect.
        if level.is_some() {
            warn!(
                var = NOTIFICATION_LEVEL,
                "Variable set but {NOTIFICATION_URL} is missing, ignoring"
            );
        }
        if twenty_four.is_some() {
            warn!(
                var = NOTIFICATION_24H,
                "Variable set but {NOTIFICATION_URL} is missing, ignoring"
            );
        }
        return Ok(());
    };

    let level = match level {
        Some(value) => parse_level(&value)?,
        None => NotificationLevel::Info,
    };

    let twenty_four_hour_time = match twenty_four {
        Some(value) => is_truthy(&value)
            .ok_or_else(|| ConfigError::invalid_env(NOTIFICATION_24H, "not a boolean"))?,
        None => false,
    };

    file.notifications.push(NotificationEndpoint {
        url,
        level,
        twenty_four_hour_time,
    });
    Ok(())
}

fn parse_hours(var: &str, value: &str) -> Result<i64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::invalid_env(var, "must be an integer number of hours"))
}

/// Accepts the numeric form (1..=3) or the level name.
fn parse_level(value: &str) -> Result<NotificationLevel, ConfigError> {
    if let Ok(priority) = value.parse::<u8>() {
        return NotificationLevel::from_priority(priority)
            .ok_or_else(|| ConfigError::invalid_env(NOTIFICATION_LEVEL, "must be 1, 2, or 3"));
    }

    match value {
        "notice" => Ok(NotificationLevel::Notice),
        "info" => Ok(NotificationLevel::Info),
        "error" => Ok(NotificationLevel::Error),
        _ => Err(ConfigError::invalid_env(
            NOTIFICATION_LEVEL,
            "must be a level name or 1-3",
        )),
    }
}

fn is_truthy(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" => Some(true),
        "n" | "no" | "f" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}
