//! # farewatch-config
//!
//! Layered configuration for farewatch monitors.
//!
//! Settings are resolved exactly once, at load time, into an immutable
//! [`ResolvedConfig`] per monitored entity:
//!
//! ```text
//! global defaults -> account overrides -> reservation overrides
//! ```
//!
//! Notification endpoints are unioned across layers with URL de-duplication,
//! so an endpoint configured both globally and on an account keeps the
//! account's level and time format.
//!
//! Monitors receive their resolved settings by value at spawn time and never
//! consult shared configuration state afterwards.

mod env;
mod error;
mod resolved;
mod schema;

pub use env::apply_env;
pub use error::ConfigError;
pub use resolved::{AccountConfig, GlobalConfig, ReservationConfig, ResolvedConfig};
pub use schema::{
    AccountSection, ConfigFile, FareCheckMode, NotificationEndpoint, ReservationSection,
};
