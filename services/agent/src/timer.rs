//! Long-horizon sleeping against wall-clock targets.
//!
//! Check-in targets can be months away, and a process clock can drift or
//! be suspended for long stretches. Sleeps are therefore chunked: the
//! delay to the target is recomputed from the clock after every wake, and
//! no single sleep exceeds [`MAX_SLEEP`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

/// Upper bound on a single uninterrupted sleep.
pub const MAX_SLEEP: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// Source of wall-clock time, injectable for deterministic tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall clock derived from the tokio timer, for paused-runtime tests.
///
/// Under `#[tokio::test(start_paused = true)]` the tokio timer advances
/// instantly across sleeps while `Utc::now()` stands still. This clock
/// reports `base + elapsed tokio time`, so wall-clock schedules move in
/// lockstep with the test runtime.
pub struct SimulatedClock {
    base_wall: DateTime<Utc>,
    base_instant: tokio::time::Instant,
}

impl SimulatedClock {
    pub fn starting_at(base_wall: DateTime<Utc>) -> Self {
        Self {
            base_wall,
            base_instant: tokio::time::Instant::now(),
        }
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = self.base_instant.elapsed();
        self.base_wall
            + chrono::Duration::from_std(elapsed).unwrap_or(chrono::Duration::MAX)
    }
}

/// Outcome of a cancellable wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// The target time was reached.
    Reached,
    /// Shutdown was signalled before the target.
    Shutdown,
}

/// Delay from `now` to `target`, clamped to `[0, MAX_SLEEP]`.
///
/// Targets in the past yield zero. Targets beyond representable range
/// yield `MAX_SLEEP`; the caller is expected to re-evaluate after waking.
pub fn compute_delay(target: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    let remaining = target.signed_duration_since(now);
    if remaining <= chrono::Duration::zero() {
        return Duration::ZERO;
    }
    remaining.to_std().map_or(MAX_SLEEP, |d| d.min(MAX_SLEEP))
}

/// Sleeps until `target` according to `clock`, waking early on shutdown.
///
/// The delay is recomputed after every chunk, so overshoot past the
/// target never exceeds the granularity of a single wake.
pub async fn sleep_until(
    target: DateTime<Utc>,
    clock: &dyn Clock,
    shutdown: &mut watch::Receiver<bool>,
) -> WaitResult {
    loop {
        if *shutdown.borrow() {
            return WaitResult::Shutdown;
        }
        let delay = compute_delay(target, clock.now());
        if delay.is_zero() {
            return WaitResult::Reached;
        }
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                match changed {
                    Ok(()) if *shutdown.borrow() => return WaitResult::Shutdown,
                    Ok(()) => {}
                    // Sender dropped: the process is unwinding.
                    Err(_) => return WaitResult::Shutdown,
                }
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Sleeps for a fixed duration, waking early on shutdown.
pub async fn sleep_for(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> WaitResult {
    let deadline = tokio::time::Instant::now() + duration;
    loop {
        if *shutdown.borrow() {
            return WaitResult::Shutdown;
        }
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() {
                    return WaitResult::Shutdown;
                }
            }
            _ = tokio::time::sleep_until(deadline) => return WaitResult::Reached,
        }
    }
}

/// Converts a std duration to a chrono one, saturating on overflow.
pub fn chrono_interval(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn at(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    #[rstest]
    #[case::past(at(2026, 3, 10, 11), Duration::ZERO)]
    #[case::exactly_now(at(2026, 3, 10, 12), Duration::ZERO)]
    #[case::six_hours_out(at(2026, 3, 10, 18), Duration::from_secs(6 * 60 * 60))]
    #[case::months_out_clamps(at(2026, 9, 1, 12), MAX_SLEEP)]
    fn delay_is_clamped_to_valid_range(
        #[case] target: DateTime<Utc>,
        #[case] expected: Duration,
    ) {
        let now = at(2026, 3, 10, 12);
        assert_eq!(compute_delay(target, now), expected);
    }

    #[test]
    fn delay_to_far_future_target_stays_finite() {
        let now = at(2026, 3, 10, 12);
        let target = at(9999, 1, 1, 0);
        let delay = compute_delay(target, now);
        assert!(delay > Duration::ZERO);
        assert!(delay <= MAX_SLEEP);
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_clock_tracks_tokio_time() {
        let clock = SimulatedClock::starting_at(at(2026, 3, 10, 12));
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(clock.now(), at(2026, 3, 10, 13));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_until_crosses_long_horizons() {
        let clock = SimulatedClock::starting_at(at(2026, 1, 1, 0));
        let (_tx, mut rx) = watch::channel(false);
        // Two months out, i.e. several MAX_SLEEP chunks.
        let target = at(2026, 3, 1, 0);
        let result = sleep_until(target, &clock, &mut rx).await;
        assert_eq!(result, WaitResult::Reached);
        assert!(clock.now() >= target);
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_until_wakes_on_shutdown() {
        let clock = SimulatedClock::starting_at(at(2026, 1, 1, 0));
        let (tx, mut rx) = watch::channel(false);
        let target = at(2026, 1, 2, 0);
        let sleeper = tokio::spawn(async move {
            let result = sleep_until(target, &clock, &mut rx).await;
            (result, clock.now())
        });
        tokio::time::sleep(Duration::from_secs(60)).await;
        tx.send(true).unwrap();
        let (result, woke_at) = sleeper.await.unwrap();
        assert_eq!(result, WaitResult::Shutdown);
        assert!(woke_at < target);
    }

    #[tokio::test]
    async fn sleep_for_zero_returns_immediately() {
        let (_tx, mut rx) = watch::channel(false);
        assert_eq!(sleep_for(Duration::ZERO, &mut rx).await, WaitResult::Reached);
    }

    #[tokio::test]
    async fn sleeps_observe_preexisting_shutdown() {
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();
        let clock = SystemClock;
        let target = Utc::now() + chrono::Duration::hours(1);
        assert_eq!(
            sleep_until(target, &clock, &mut rx).await,
            WaitResult::Shutdown
        );
        assert_eq!(
            sleep_for(Duration::from_secs(5), &mut rx).await,
            WaitResult::Shutdown
        );
    }
}
