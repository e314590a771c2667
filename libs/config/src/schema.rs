//! On-disk configuration schema.
//!
//! The config file is a JSON document. Unknown keys are rejected at parse
//! time so typos fail loudly instead of silently using defaults.

use farewatch_model::NotificationLevel;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Which fares a fare check compares against.
///
/// Accepts a boolean for the common cases (`true` = same flight, `false` =
/// disabled) or one of the explicit mode strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FareCheckMode {
    Disabled,
    #[default]
    SameFlight,
    SameDayNonstop,
    SameDay,
}

impl FareCheckMode {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

impl std::str::FromStr for FareCheckMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disabled" | "false" | "no" => Ok(Self::Disabled),
            "same_flight" | "true" | "yes" => Ok(Self::SameFlight),
            "same_day_nonstop" => Ok(Self::SameDayNonstop),
            "same_day" => Ok(Self::SameDay),
            other => Err(format!("'{other}' is not a valid fare check mode")),
        }
    }
}

impl<'de> Deserialize<'de> for FareCheckMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Mode(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(true) => Ok(Self::SameFlight),
            Raw::Flag(false) => Ok(Self::Disabled),
            Raw::Mode(s) => s.parse().map_err(D::Error::custom),
        }
    }
}

fn default_level() -> NotificationLevel {
    NotificationLevel::Info
}

/// One notification delivery target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationEndpoint {
    pub url: String,

    /// Minimum severity this endpoint receives.
    #[serde(default = "default_level")]
    pub level: NotificationLevel,

    /// Format flight times as 24-hour instead of 12-hour.
    #[serde(default, rename = "24_hour_time")]
    pub twenty_four_hour_time: bool,
}

/// A monitored account: credentials plus optional overrides of the global
/// settings. Discovered reservations inherit the account's resolved
/// settings, since no reservation-specific block exists for them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountSection {
    pub username: String,
    pub password: String,

    pub check_fares: Option<FareCheckMode>,
    pub retrieval_interval_hours: Option<i64>,
    pub fare_check_interval_hours: Option<i64>,
    pub healthchecks_url: Option<String>,
    #[serde(default)]
    pub notifications: Vec<NotificationEndpoint>,
}

/// A directly-specified reservation plus optional overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReservationSection {
    pub confirmation_number: String,
    pub first_name: String,
    pub last_name: String,

    pub check_fares: Option<FareCheckMode>,
    pub retrieval_interval_hours: Option<i64>,
    pub fare_check_interval_hours: Option<i64>,
    pub healthchecks_url: Option<String>,
    #[serde(default)]
    pub notifications: Vec<NotificationEndpoint>,
}

/// The parsed configuration file before resolution.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub check_fares: Option<FareCheckMode>,
    pub retrieval_interval_hours: Option<i64>,
    pub fare_check_interval_hours: Option<i64>,
    pub healthchecks_url: Option<String>,
    #[serde(default)]
    pub notifications: Vec<NotificationEndpoint>,
    #[serde(default)]
    pub accounts: Vec<AccountSection>,
    #[serde(default)]
    pub reservations: Vec<ReservationSection>,
}
