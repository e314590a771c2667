//! Fare snapshots and drop detection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum drop, in whole currency units, that counts as a real fare drop.
///
/// The airline occasionally reports a one-unit difference that carries no
/// actual credit when the flight is changed, so a drop must exceed this
/// threshold before anyone is notified.
pub const FARE_NOISE_THRESHOLD: i64 = 1;

/// A fare observed at one point in time. Amounts are integers in whole
/// currency units (dollars, or points), as the airline reports them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FareSnapshot {
    pub amount: i64,
    pub currency: String,
    pub fare_class: String,
    pub retrieved_at: DateTime<Utc>,
}

impl FareSnapshot {
    /// Human-readable price, e.g. `"150 USD"`.
    #[must_use]
    pub fn display(&self) -> String {
        format!("{} {}", self.amount, self.currency)
    }
}

/// A detected fare drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FareDrop {
    /// How much lower the new fare is, in whole currency units.
    pub amount: i64,
    pub currency: String,
}

/// Tracks the last fare seen for one flight and reports noise-filtered drops.
///
/// The first observation establishes the baseline and never reports a drop.
/// Later observations report a drop only when the new fare is strictly lower
/// and the difference exceeds [`FARE_NOISE_THRESHOLD`].
#[derive(Debug, Default)]
pub struct FareTracker {
    last: Option<FareSnapshot>,
}

impl FareTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the tracker with a known prior fare.
    pub fn with_baseline(snapshot: FareSnapshot) -> Self {
        Self {
            last: Some(snapshot),
        }
    }

    /// The most recently observed fare, if any.
    #[must_use]
    pub fn last(&self) -> Option<&FareSnapshot> {
        self.last.as_ref()
    }

    /// Record a new observation, returning a drop if one should be reported.
    /// The observation always replaces the stored snapshot, so a fare that
    /// rises and later falls back is compared against the higher price.
    pub fn observe(&mut self, snapshot: FareSnapshot) -> Option<FareDrop> {
        let drop = self.last.as_ref().and_then(|prev| {
            let difference = prev.amount - snapshot.amount;
            (difference > FARE_NOISE_THRESHOLD).then(|| FareDrop {
                amount: difference,
                currency: snapshot.currency.clone(),
            })
        });

        self.last = Some(snapshot);
        drop
    }
}
