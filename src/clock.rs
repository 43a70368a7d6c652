//! Local match clock driven by sparse server snapshots.
//!
//! Each snapshot pins the server time to a local instant. Between snapshots the
//! server time is replayed from the local clock, so the display keeps ticking
//! without polling the feed.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::types::ClockTriple;

/// Local monotonic time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by the tokio timer (honours `tokio::time::pause`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-driven clock for replays and tests. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Server time pinned to the local instant the snapshot arrived.
#[derive(Debug, Clone, Copy)]
struct Baseline {
    triple: ClockTriple,
    received_at: Instant,
}

/// Derives the elapsed (live) or countdown (pre-kickoff) duration for one match.
#[derive(Debug)]
pub struct ClockSync<C: Clock = SystemClock> {
    clock: C,
    baseline: Option<Baseline>,
}

impl<C: Clock> ClockSync<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            baseline: None,
        }
    }

    /// Feed the triple from the latest snapshot.
    ///
    /// Re-baselines when the triple differs from the held one and returns `true`;
    /// an identical re-delivery keeps the running baseline.
    pub fn observe(&mut self, triple: ClockTriple) -> bool {
        if self.baseline.is_some_and(|b| b.triple == triple) {
            return false;
        }
        self.baseline = Some(Baseline {
            triple,
            received_at: self.clock.now(),
        });
        true
    }

    /// Drop the baseline; the display reads zero until the next snapshot.
    pub fn clear(&mut self) {
        self.baseline = None;
    }

    pub fn triple(&self) -> Option<ClockTriple> {
        self.baseline.map(|b| b.triple)
    }

    /// Server time as replayed from the local clock.
    pub fn estimated_server_now(&self) -> Option<DateTime<Utc>> {
        let baseline = self.baseline?;
        let drift_base = baseline.triple.server_snapshot_time?;
        let since_receipt = self.clock.now().saturating_duration_since(baseline.received_at);
        let since_receipt = chrono::Duration::from_std(since_receipt).ok()?;
        drift_base.checked_add_signed(since_receipt)
    }

    /// Elapsed since kickoff when live, time left until kickoff otherwise.
    /// Never negative.
    pub fn displayed(&self) -> Duration {
        let Some(baseline) = self.baseline else {
            return Duration::ZERO;
        };
        let (Some(server_now), Some(kickoff)) =
            (self.estimated_server_now(), baseline.triple.kickoff_time)
        else {
            return Duration::ZERO;
        };
        let signed = if baseline.triple.is_live {
            server_now - kickoff
        } else {
            kickoff - server_now
        };
        // negative spans fail to_std, which is the clamp
        signed.to_std().unwrap_or(Duration::ZERO)
    }

    pub fn display(&self) -> String {
        format_mm_ss(self.displayed())
    }
}

/// `mm:ss`; minutes keep counting past 59.
pub fn format_mm_ss(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn triple(snapshot: DateTime<Utc>, kickoff: DateTime<Utc>, is_live: bool) -> ClockTriple {
        ClockTriple {
            server_snapshot_time: Some(snapshot),
            kickoff_time: Some(kickoff),
            is_live,
        }
    }

    fn within(actual: Duration, expected_ms: u64, tolerance_ms: u64) -> bool {
        let actual = actual.as_millis() as i128;
        (actual - expected_ms as i128).abs() <= tolerance_ms as i128
    }

    #[test]
    fn countdown_one_second_after_receipt() {
        let clock = ManualClock::new();
        let mut sync = ClockSync::new(clock.clone());
        sync.observe(triple(t0(), t0() + chrono::Duration::milliseconds(5000), false));

        clock.advance(Duration::from_secs(1));
        assert!(within(sync.displayed(), 4000, 50));
        assert_eq!(sync.display(), "00:04");
    }

    #[test]
    fn countdown_decreases_then_clamps() {
        let clock = ManualClock::new();
        let mut sync = ClockSync::new(clock.clone());
        sync.observe(triple(t0(), t0() + chrono::Duration::milliseconds(5000), false));

        let mut last = sync.displayed();
        for _ in 0..4 {
            clock.advance(Duration::from_secs(1));
            let now = sync.displayed();
            assert!(within(last - now, 1000, 1));
            last = now;
        }
        clock.advance(Duration::from_secs(3));
        assert_eq!(sync.displayed(), Duration::ZERO);
        assert_eq!(sync.display(), "00:00");
    }

    #[test]
    fn elapsed_when_live() {
        let clock = ManualClock::new();
        let mut sync = ClockSync::new(clock.clone());
        // snapshot taken 90s after kickoff
        sync.observe(triple(t0() + chrono::Duration::seconds(90), t0(), true));
        assert!(within(sync.displayed(), 90_000, 0));

        clock.advance(Duration::from_secs(15));
        assert!(within(sync.displayed(), 105_000, 0));
        assert_eq!(sync.display(), "01:45");
    }

    #[test]
    fn elapsed_clamps_before_kickoff() {
        let clock = ManualClock::new();
        let mut sync = ClockSync::new(clock);
        sync.observe(triple(t0(), t0() + chrono::Duration::seconds(10), true));
        assert_eq!(sync.displayed(), Duration::ZERO);
    }

    #[test]
    fn phase_flip_rebaselines() {
        let clock = ManualClock::new();
        let mut sync = ClockSync::new(clock.clone());
        let kickoff = t0() + chrono::Duration::seconds(5);
        sync.observe(triple(t0(), kickoff, false));
        clock.advance(Duration::from_secs(5));
        assert_eq!(sync.displayed(), Duration::ZERO);

        // first live snapshot arrives 2s after kickoff on the server
        let rebased = sync.observe(triple(kickoff + chrono::Duration::seconds(2), kickoff, true));
        assert!(rebased);
        assert!(within(sync.displayed(), 2000, 0));
        clock.advance(Duration::from_secs(1));
        assert!(within(sync.displayed(), 3000, 0));
    }

    #[test]
    fn identical_triple_keeps_baseline() {
        let clock = ManualClock::new();
        let mut sync = ClockSync::new(clock.clone());
        let tr = triple(t0(), t0() + chrono::Duration::seconds(60), false);
        assert!(sync.observe(tr));
        clock.advance(Duration::from_secs(10));
        assert!(!sync.observe(tr));
        assert!(within(sync.displayed(), 50_000, 0));
    }

    #[test]
    fn missing_timestamps_read_zero() {
        let clock = ManualClock::new();
        let mut sync = ClockSync::new(clock);
        assert_eq!(sync.displayed(), Duration::ZERO);
        sync.observe(ClockTriple {
            server_snapshot_time: None,
            kickoff_time: Some(t0()),
            is_live: false,
        });
        assert_eq!(sync.displayed(), Duration::ZERO);
        assert!(sync.estimated_server_now().is_none());
    }

    #[test]
    fn clear_resets_display() {
        let clock = ManualClock::new();
        let mut sync = ClockSync::new(clock);
        sync.observe(triple(t0(), t0() + chrono::Duration::seconds(30), false));
        sync.clear();
        assert!(sync.triple().is_none());
        assert_eq!(sync.display(), "00:00");
    }

    #[test]
    fn mm_ss_formatting() {
        assert_eq!(format_mm_ss(Duration::ZERO), "00:00");
        assert_eq!(format_mm_ss(Duration::from_millis(4999)), "00:04");
        assert_eq!(format_mm_ss(Duration::from_secs(61)), "01:01");
        assert_eq!(format_mm_ss(Duration::from_secs(75 * 60 + 3)), "75:03");
    }
}
