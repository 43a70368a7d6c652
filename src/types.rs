use chrono::{DateTime, Utc};
use serde::Serialize;

/// Odds used when the feed carries no parseable odds string.
pub const DEFAULT_ODDS: f64 = 1.98;

/// One decoded "current" snapshot: the league and every match it lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct League {
    pub id: i64,
    pub name: String,
    /// Feed order, may be empty.
    pub matches: Vec<Match>,
}

impl League {
    /// The match the display follows: the first one in feed order.
    pub fn current_match(&self) -> Option<&Match> {
        self.matches.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub match_id: i64,
    pub home_team: String,
    pub away_team: String,
    pub home_logo: String,
    pub away_logo: String,
    pub is_live: bool,
    pub stream_url: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub server_snapshot_time: Option<DateTime<Utc>>,
    pub odds: Odds,
    pub betting_stats: BettingStats,
    pub live_bets: Vec<Bet>,
    pub result: Option<MatchResult>,
    pub result_signature: Option<String>,
    pub md5_hash: Option<String>,
    pub state_code: Option<Phase>,
}

impl Match {
    /// Kickoff is the scheduled start time; the feed has no separate field for it.
    pub fn kickoff_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    /// The (snapshot, kickoff, live) triple that drives the match clock.
    pub fn clock_triple(&self) -> ClockTriple {
        ClockTriple {
            server_snapshot_time: self.server_snapshot_time,
            kickoff_time: self.kickoff_time(),
            is_live: self.is_live,
        }
    }

    /// Phase as reported by the state code, falling back to the live flag.
    pub fn phase(&self) -> Phase {
        match self.state_code {
            Some(phase) => phase,
            None if self.result.is_some() => Phase::Finished,
            None if self.is_live => Phase::Live,
            None => Phase::Betting,
        }
    }
}

/// Inputs ClockSync needs from one match snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTriple {
    pub server_snapshot_time: Option<DateTime<Utc>>,
    pub kickoff_time: Option<DateTime<Utc>>,
    pub is_live: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Odds {
    pub home: f64,
    pub away: f64,
}

impl Default for Odds {
    fn default() -> Self {
        Self {
            home: DEFAULT_ODDS,
            away: DEFAULT_ODDS,
        }
    }
}

/// Running bet totals per side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BettingStats {
    pub home_amount: f64,
    pub away_amount: f64,
    pub home_count: f64,
    pub away_count: f64,
}

impl BettingStats {
    /// Home share of the staked amount, in percent. 50 when nothing is staked.
    pub fn home_share(&self) -> f64 {
        share(self.home_amount, self.away_amount)
    }

    pub fn away_share(&self) -> f64 {
        100.0 - self.home_share()
    }

    /// Home share of the number of bets, in percent.
    pub fn home_count_share(&self) -> f64 {
        share(self.home_count, self.away_count)
    }
}

fn share(home: f64, away: f64) -> f64 {
    let total = home + away;
    if total > 0.0 {
        home / total * 100.0
    } else {
        50.0
    }
}

/// Final score carried by the result signature. A side scoring exactly 1 won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub home: u32,
    pub away: u32,
}

impl MatchResult {
    pub fn winner(&self) -> Option<Side> {
        match (self.home == 1, self.away == 1) {
            (true, false) => Some(Side::Home),
            (false, true) => Some(Side::Away),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    pub match_id: i64,
    pub amount: f64,
    pub side: Side,
    pub username: String,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    Home,
    Away,
    /// Side text the feed sent that is neither home nor away.
    Unknown,
}

impl Side {
    /// Parse the feed's side text (`Home` / `Away`, any case).
    pub fn from_wire(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("home") {
            Some(Self::Home)
        } else if s.eq_ignore_ascii_case("away") {
            Some(Self::Away)
        } else {
            None
        }
    }
}

/// Match phase, from the state code at `match.25`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Betting,
    Live,
    Finished,
    /// A code outside 0..=2, kept verbatim.
    Unknown(i64),
}

impl Phase {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Betting,
            1 => Self::Live,
            2 => Self::Finished,
            other => Self::Unknown(other),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Betting => "Betting".to_string(),
            Self::Live => "Live".to_string(),
            Self::Finished => "Finished".to_string(),
            Self::Unknown(code) => format!("Unknown({code})"),
        }
    }
}

/// Connection state as seen by readers of the feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Open,
    Closed,
}

/// One line of reporter output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEvent {
    pub timestamp: String,
    pub league_id: i64,
    pub league_name: String,
    pub match_count: usize,
    pub current: Option<MatchSummary>,
}

/// Display-ready digest of one match.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub match_id: i64,
    pub home_team: String,
    pub away_team: String,
    pub phase: String,
    pub odds: Odds,
    pub home_amount: String,
    pub away_amount: String,
    pub home_share_pct: f64,
    pub away_share_pct: f64,
    pub home_count: f64,
    pub away_count: f64,
    pub live_bet_count: usize,
    pub result: Option<MatchResult>,
    pub winner: Option<Side>,
    pub has_stream: bool,
    pub md5_prefix: Option<String>,
}
