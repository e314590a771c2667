//! Layer merging: file sections into per-entity resolved settings.

use std::path::Path;
use std::time::Duration;

use farewatch_model::{ConfirmationNumber, ReservationRef};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::schema::{
    AccountSection, ConfigFile, FareCheckMode, NotificationEndpoint, ReservationSection,
};

const HOUR: u64 = 3600;
const DEFAULT_INTERVAL_HOURS: u64 = 24;

/// Fully-resolved, immutable settings for one monitored entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub check_fares: FareCheckMode,

    /// Account poll period. Zero means "poll exactly once, then stop".
    pub retrieval_interval: Duration,

    /// Period between fare rechecks while waiting for check-in.
    pub fare_check_interval: Duration,

    pub healthchecks_url: Option<String>,
    pub notifications: Vec<NotificationEndpoint>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            check_fares: FareCheckMode::default(),
            retrieval_interval: Duration::from_secs(DEFAULT_INTERVAL_HOURS * HOUR),
            fare_check_interval: Duration::from_secs(DEFAULT_INTERVAL_HOURS * HOUR),
            healthchecks_url: None,
            notifications: Vec::new(),
        }
    }
}

/// Credentials plus resolved settings for one account monitor.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    pub username: String,
    pub password: String,
    pub settings: ResolvedConfig,
}

/// A directly-specified reservation plus resolved settings.
#[derive(Debug, Clone)]
pub struct ReservationConfig {
    pub reservation: ReservationRef,
    pub settings: ResolvedConfig,
}

/// The loaded configuration: global defaults plus one entry per monitored
/// account and reservation, each with settings resolved at load time.
#[derive(Debug, Clone, Default)]
pub struct GlobalConfig {
    pub defaults: ResolvedConfig,
    pub accounts: Vec<AccountConfig>,
    pub reservations: Vec<ReservationConfig>,
}

impl GlobalConfig {
    /// Load from a JSON file with environment overrides applied. A missing
    /// file is not an error; defaults (plus environment) are used.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut file = match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No configuration file found, using defaults");
                ConfigFile::default()
            }
            Err(err) => return Err(err.into()),
        };

        crate::env::apply_env(&mut file, &|var| std::env::var(var).ok())?;
        Self::from_file(file)
    }

    /// Resolve a parsed (and env-merged) config file.
    pub fn from_file(file: ConfigFile) -> Result<Self, ConfigError> {
        let defaults = ResolvedConfig {
            check_fares: file.check_fares.unwrap_or_default(),
            retrieval_interval: interval_from_hours(
                "retrieval_interval_hours",
                file.retrieval_interval_hours,
                DEFAULT_INTERVAL_HOURS,
                true,
            ),
            fare_check_interval: interval_from_hours(
                "fare_check_interval_hours",
                file.fare_check_interval_hours,
                DEFAULT_INTERVAL_HOURS,
                false,
            ),
            healthchecks_url: file.healthchecks_url.clone(),
            notifications: validated_endpoints(file.notifications.clone())?,
        };

        let mut config = Self {
            defaults: defaults.clone(),
            accounts: Vec::new(),
            reservations: Vec::new(),
        };

        for account in file.accounts {
            config.accounts.push(resolve_account(&defaults, account)?);
        }
        for reservation in file.reservations {
            config
                .reservations
                .push(resolve_reservation(&defaults, reservation)?);
        }

        Ok(config)
    }

    /// Add an account supplied on the command line; it inherits the global
    /// defaults unchanged.
    pub fn add_account(&mut self, username: &str, password: &str) -> Result<(), ConfigError> {
        require_nonempty("username", username)?;
        require_nonempty("password", password)?;
        self.accounts.push(AccountConfig {
            username: username.to_string(),
            password: password.to_string(),
            settings: self.defaults.clone(),
        });
        Ok(())
    }

    /// Add a reservation supplied on the command line.
    pub fn add_reservation(
        &mut self,
        confirmation_number: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<(), ConfigError> {
        require_nonempty("confirmation_number", confirmation_number)?;
        require_nonempty("first_name", first_name)?;
        require_nonempty("last_name", last_name)?;
        self.reservations.push(ReservationConfig {
            reservation: ReservationRef::new(confirmation_number, first_name, last_name),
            settings: self.defaults.clone(),
        });
        Ok(())
    }

    /// Every configured endpoint across all layers, de-duplicated by URL.
    /// Used to send test notifications exactly once per target.
    #[must_use]
    pub fn all_notification_endpoints(&self) -> Vec<NotificationEndpoint> {
        let mut merged = self.defaults.notifications.clone();
        for settings in self
            .accounts
            .iter()
            .map(|a| &a.settings)
            .chain(self.reservations.iter().map(|r| &r.settings))
        {
            merge_endpoints(&mut merged, &settings.notifications);
        }
        merged
    }
}

fn resolve_account(
    defaults: &ResolvedConfig,
    section: AccountSection,
) -> Result<AccountConfig, ConfigError> {
    require_nonempty("username", &section.username)?;
    require_nonempty("password", &section.password)?;

    let settings = resolve_overrides(
        defaults,
        section.check_fares,
        section.retrieval_interval_hours,
        section.fare_check_interval_hours,
        section.healthchecks_url,
        section.notifications,
    )?;

    Ok(AccountConfig {
        username: section.username,
        password: section.password,
        settings,
    })
}

fn resolve_reservation(
    defaults: &ResolvedConfig,
    section: ReservationSection,
) -> Result<ReservationConfig, ConfigError> {
    require_nonempty("confirmation_number", &section.confirmation_number)?;
    require_nonempty("first_name", &section.first_name)?;
    require_nonempty("last_name", &section.last_name)?;

    let settings = resolve_overrides(
        defaults,
        section.check_fares,
        section.retrieval_interval_hours,
        section.fare_check_interval_hours,
        section.healthchecks_url,
        section.notifications,
    )?;

    Ok(ReservationConfig {
        reservation: ReservationRef::new(
            ConfirmationNumber::new(section.confirmation_number),
            section.first_name,
            section.last_name,
        ),
        settings,
    })
}

fn resolve_overrides(
    defaults: &ResolvedConfig,
    check_fares: Option<FareCheckMode>,
    retrieval_hours: Option<i64>,
    fare_check_hours: Option<i64>,
    healthchecks_url: Option<String>,
    notifications: Vec<NotificationEndpoint>,
) -> Result<ResolvedConfig, ConfigError> {
    // Entity-level endpoints come first so they win URL de-duplication
    // against global ones.
    let mut merged = validated_endpoints(notifications)?;
    merge_endpoints(&mut merged, &defaults.notifications);

    Ok(ResolvedConfig {
        check_fares: check_fares.unwrap_or(defaults.check_fares),
        retrieval_interval: retrieval_hours
            .map(|h| interval_from_hours("retrieval_interval_hours", Some(h), 0, true))
            .unwrap_or(defaults.retrieval_interval),
        fare_check_interval: fare_check_hours
            .map(|h| {
                interval_from_hours(
                    "fare_check_interval_hours",
                    Some(h),
                    DEFAULT_INTERVAL_HOURS,
                    false,
                )
            })
            .unwrap_or(defaults.fare_check_interval),
        healthchecks_url: healthchecks_url.or_else(|| defaults.healthchecks_url.clone()),
        notifications: merged,
    })
}

/// Append endpoints whose URL is not already present.
fn merge_endpoints(into: &mut Vec<NotificationEndpoint>, from: &[NotificationEndpoint]) {
    for endpoint in from {
        if !into.iter().any(|existing| existing.url == endpoint.url) {
            into.push(endpoint.clone());
        }
    }
}

fn validated_endpoints(
    endpoints: Vec<NotificationEndpoint>,
) -> Result<Vec<NotificationEndpoint>, ConfigError> {
    for endpoint in &endpoints {
        require_nonempty("notifications.url", &endpoint.url)?;
    }
    Ok(endpoints)
}

fn require_nonempty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::invalid_value(field, "must not be empty"));
    }
    Ok(())
}

/// Convert an optional hour count into a duration, clamping out-of-range
/// values instead of failing: negative intervals become 0 (when zero is
/// allowed) or the default (when it is not).
fn interval_from_hours(
    field: &str,
    hours: Option<i64>,
    default_hours: u64,
    zero_allowed: bool,
) -> Duration {
    let Some(hours) = hours else {
        return Duration::from_secs(default_hours * HOUR);
    };

    if hours < 0 || (hours == 0 && !zero_allowed) {
        warn!(
            field,
            hours,
            fallback_hours = if zero_allowed { 0 } else { default_hours },
            "Interval out of range, clamping"
        );
        let fallback = if zero_allowed { 0 } else { default_hours };
        return Duration::from_secs(fallback * HOUR);
    }

    Duration::from_secs(hours as u64 * HOUR)
}
