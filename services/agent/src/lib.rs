//! Monitoring agent for flight check-ins and fare rechecks.
//!
//! The agent runs one monitor task per account and per standalone
//! reservation. Account monitors poll the airline API on an interval and
//! reconcile a set of per-flight check-in monitors; reservation monitors
//! sleep until the check-in window opens (24 hours before departure),
//! interleaving fare checks along the way, and submit the check-in the
//! moment the window opens.

pub mod api;
pub mod monitor;
pub mod notify;
pub mod orchestrator;
pub mod timer;

pub use api::{AirlineApi, MockApi, RestClient};
pub use monitor::{AccountMonitor, ReservationMonitor, RetryPolicy};
pub use notify::{HttpTransport, NotificationTransport, Notifier, RecordingTransport};
pub use orchestrator::{Orchestrator, RunSummary};
pub use timer::{Clock, SimulatedClock, SystemClock};
