use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::CLOCK_TICK;
use crate::clock::{Clock, ClockSync, format_mm_ss};
use crate::store::FeedReader;
use crate::types::Phase;

/// One tick of the match clock for the current match.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockReading {
    pub match_id: i64,
    pub phase: Phase,
    pub is_live: bool,
    /// `mm:ss`, elapsed when live, countdown otherwise.
    pub display: String,
    pub duration: Duration,
}

/// 1 Hz driver for [`ClockSync`], following the current match of the feed.
///
/// The tick cadence is independent of frame arrival; a new snapshot triple
/// re-baselines the clock and restarts the interval.
pub struct MatchTicker {
    readings: watch::Receiver<Option<ClockReading>>,
    task: JoinHandle<()>,
}

impl MatchTicker {
    pub fn spawn<C>(reader: FeedReader, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        let (tx, readings) = watch::channel(None);
        let task = tokio::spawn(run_ticker(reader, ClockSync::new(clock), tx));
        Self { readings, task }
    }

    pub fn readings(&self) -> watch::Receiver<Option<ClockReading>> {
        self.readings.clone()
    }

    pub fn latest(&self) -> Option<ClockReading> {
        self.readings.borrow().clone()
    }

    /// Stop the 1 Hz timer and wait for it to finish.
    pub async fn shutdown(mut self) {
        self.task.abort();
        let _ = (&mut self.task).await;
    }
}

impl Drop for MatchTicker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_ticker<C: Clock>(
    mut reader: FeedReader,
    mut sync: ClockSync<C>,
    tx: watch::Sender<Option<ClockReading>>,
) {
    let mut interval = tokio::time::interval(CLOCK_TICK);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut current: Option<(i64, Phase)> = None;

    follow_snapshot(&mut reader, &mut sync, &mut current);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            changed = reader.changed() => {
                if changed.is_err() {
                    debug!("Feed store dropped, stopping match clock");
                    break;
                }
                if !follow_snapshot(&mut reader, &mut sync, &mut current) {
                    continue;
                }
                interval.reset();
            }
        }

        let reading = current.map(|(match_id, phase)| {
            let duration = sync.displayed();
            ClockReading {
                match_id,
                phase,
                is_live: sync.triple().is_some_and(|t| t.is_live),
                display: format_mm_ss(duration),
                duration,
            }
        });
        tx.send_replace(reading);
    }
}

/// Pull the current match from the store and re-baseline on a new triple.
/// Returns whether the published reading must be refreshed now.
fn follow_snapshot<C: Clock>(
    reader: &mut FeedReader,
    sync: &mut ClockSync<C>,
    current: &mut Option<(i64, Phase)>,
) -> bool {
    let state = reader.snapshot_and_mark_seen();
    let Some(m) = state.league.as_deref().and_then(|l| l.current_match()) else {
        let had_match = current.take().is_some();
        sync.clear();
        return had_match;
    };

    let next = (m.match_id, m.phase());
    let rebased = sync.observe(m.clock_triple());
    let switched = *current != Some(next);
    *current = Some(next);
    if rebased {
        debug!("Match {} clock re-baselined ({})", m.match_id, next.1.label());
    }
    rebased || switched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::connection::{ChannelEvents, Connector, FeedHandle};
    use crate::store::FeedStore;
    use crate::types::{BettingStats, League, Match, Odds};
    use chrono::{DateTime, TimeZone, Utc};
    use tokio::task::JoinHandle;
    use url::Url;

    /// Channel that opens but never says anything.
    struct SilentConnector;

    impl Connector for SilentConnector {
        fn open(&self, _url: &Url, _events: ChannelEvents) -> JoinHandle<()> {
            tokio::spawn(std::future::pending())
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn league_with(match_id: i64, snapshot: DateTime<Utc>, kickoff: DateTime<Utc>, live: bool) -> League {
        League {
            id: 1,
            name: "Volta".to_string(),
            matches: vec![Match {
                match_id,
                home_team: "A".to_string(),
                away_team: "B".to_string(),
                home_logo: String::new(),
                away_logo: String::new(),
                is_live: live,
                stream_url: None,
                start_time: Some(kickoff),
                server_snapshot_time: Some(snapshot),
                odds: Odds::default(),
                betting_stats: BettingStats::default(),
                live_bets: Vec::new(),
                result: None,
                result_signature: None,
                md5_hash: None,
                state_code: None,
            }],
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn counts_down_once_per_second() {
        let store = FeedStore::new();
        store.publish_league(league_with(7, t0(), t0() + chrono::Duration::seconds(10), false));
        let ticker = MatchTicker::spawn(store.reader(), SystemClock);
        settle().await;

        let first = ticker.latest().expect("reading after first tick");
        assert_eq!(first.match_id, 7);
        assert_eq!(first.display, "00:10");
        assert_eq!(first.phase, Phase::Betting);

        tokio::time::sleep(Duration::from_millis(3050)).await;
        settle().await;
        assert_eq!(ticker.latest().unwrap().display, "00:07");

        ticker.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn new_snapshot_rebaselines_immediately() {
        let store = FeedStore::new();
        let kickoff = t0() + chrono::Duration::seconds(5);
        store.publish_league(league_with(7, t0(), kickoff, false));
        let ticker = MatchTicker::spawn(store.reader(), SystemClock);
        settle().await;

        tokio::time::sleep(Duration::from_millis(400)).await;
        // kickoff passed on the server; the match is now live 20s in
        store.publish_league(league_with(7, kickoff + chrono::Duration::seconds(20), kickoff, true));
        settle().await;

        let reading = ticker.latest().unwrap();
        assert!(reading.is_live);
        assert_eq!(reading.display, "00:20");
        assert_eq!(reading.phase, Phase::Live);

        ticker.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn empty_league_clears_reading() {
        let store = FeedStore::new();
        store.publish_league(league_with(7, t0(), t0(), true));
        let ticker = MatchTicker::spawn(store.reader(), SystemClock);
        settle().await;
        assert!(ticker.latest().is_some());

        store.publish_league(League {
            id: 1,
            name: "Volta".to_string(),
            matches: Vec::new(),
        });
        settle().await;
        assert!(ticker.latest().is_none());

        ticker.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_store_dropped() {
        let store = FeedStore::new();
        let ticker = MatchTicker::spawn(store.reader(), SystemClock);
        settle().await;
        drop(store);
        settle().await;
        assert!(ticker.task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_feed_shuts_down() {
        let url = Url::parse("wss://feed.test/ws").unwrap();
        let feed = FeedHandle::spawn(url, SilentConnector, Duration::from_secs(3));
        let ticker = MatchTicker::spawn(feed.reader(), SystemClock);
        settle().await;
        assert!(!ticker.task.is_finished());

        feed.shutdown().await;
        settle().await;
        assert!(ticker.task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_ticker_stops_timer() {
        let store = FeedStore::new();
        store.publish_league(league_with(7, t0(), t0(), true));
        let ticker = MatchTicker::spawn(store.reader(), SystemClock);
        settle().await;
        let mut readings = ticker.readings();
        readings.borrow_and_update();

        drop(ticker);
        settle().await;
        // with the task gone the sender is dropped instead of ticking on
        assert!(readings.changed().await.is_err());
    }
}
