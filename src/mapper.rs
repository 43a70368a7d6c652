//! Positional payload → typed `League` / `Match` / `Bet`.
//!
//! The feed encodes every record as a mapping from stringified small integers to
//! values. All of those indices live in [`idx`]; nothing else in the crate
//! addresses the payload by number. Missing or malformed fields map to defaults
//! so one bad match record never discards the rest of the league.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::types::{Bet, BettingStats, League, Match, MatchResult, Odds, Phase, Side};

/// Field index table for the positional wire format.
pub mod idx {
    pub mod league {
        pub const ID: usize = 0;
        pub const NAME: usize = 1;
        pub const MATCHES: usize = 2;
    }

    pub mod matches {
        pub const START_TIME: usize = 0;
        pub const IS_LIVE: usize = 1;
        pub const HOME_TEAM: usize = 2;
        pub const AWAY_TEAM: usize = 3;
        /// Market block; the odds string sits at `[ODDS_MARKET][ODDS_LINE][0]`.
        pub const ODDS_MARKET: usize = 7;
        pub const ODDS_LINE: usize = 16;
        pub const MATCH_ID: usize = 8;
        pub const HOME_LOGO: usize = 19;
        pub const AWAY_LOGO: usize = 20;
        pub const STREAM_URL: usize = 22;
        /// Totals block: `{0: home$, 1: away$, 2: homeCount, 3: awayCount}`.
        pub const STATS: usize = 24;
        pub const STATE_CODE: usize = 25;
        /// Falls back to `START_TIME` when absent.
        pub const SERVER_TIME: usize = 28;
        pub const MD5_HASH: usize = 29;
        pub const RESULT_SIGNATURE: usize = 30;
        pub const LIVE_BETS: usize = 31;
    }

    pub mod stats {
        pub const HOME_AMOUNT: usize = 0;
        pub const AWAY_AMOUNT: usize = 1;
        pub const HOME_COUNT: usize = 2;
        pub const AWAY_COUNT: usize = 3;
    }

    pub mod bet {
        pub const MATCH_ID: usize = 1;
        pub const AMOUNT: usize = 2;
        pub const SIDE: usize = 3;
        pub const USERNAME: usize = 4;
        pub const CURRENCY: usize = 5;
    }
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// `<home>*<n>h <away>*<n>a`, e.g. `1.85*2h 1.95*2a`.
static RE_ODDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+\.?\d*)\*\d+h\s+(\d+\.?\d*)\*\d+a").expect("valid odds pattern")
});

/// `{<home>,<away>}`, e.g. `{1,0}`.
static RE_RESULT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\d+),(\d+)\}").expect("valid result pattern"));

/// Map the first payload element (the league object) into a `League`.
pub fn map_league(raw: &Value) -> League {
    let matches = field(raw, idx::league::MATCHES)
        .and_then(Value::as_array)
        .map(|arr| arr.iter().map(map_match).collect())
        .unwrap_or_default();

    League {
        id: int_or_zero(field(raw, idx::league::ID)),
        name: text_or_empty(field(raw, idx::league::NAME)),
        matches,
    }
}

/// Map one positional match record.
pub fn map_match(raw: &Value) -> Match {
    use idx::matches as m;

    let start_time = field(raw, m::START_TIME).and_then(parse_timestamp);
    let server_snapshot_time = field(raw, m::SERVER_TIME)
        .and_then(parse_timestamp)
        .or(start_time);

    let odds_source = field(raw, m::ODDS_MARKET)
        .and_then(|market| field(market, m::ODDS_LINE))
        .and_then(|line| field(line, 0))
        .and_then(Value::as_str);

    let result_signature = opt_text(field(raw, m::RESULT_SIGNATURE));
    let result = result_signature.as_deref().and_then(parse_result);

    Match {
        match_id: int_or_zero(field(raw, m::MATCH_ID)),
        home_team: text_or_empty(field(raw, m::HOME_TEAM)),
        away_team: text_or_empty(field(raw, m::AWAY_TEAM)),
        home_logo: text_or_empty(field(raw, m::HOME_LOGO)),
        away_logo: text_or_empty(field(raw, m::AWAY_LOGO)),
        is_live: matches!(field(raw, m::IS_LIVE), Some(Value::Bool(true))),
        stream_url: opt_text(field(raw, m::STREAM_URL)),
        start_time,
        server_snapshot_time,
        odds: odds_source.map(parse_odds).unwrap_or_default(),
        betting_stats: map_stats(field(raw, m::STATS)),
        live_bets: map_bets(field(raw, m::LIVE_BETS)),
        result,
        result_signature,
        md5_hash: opt_text(field(raw, m::MD5_HASH)),
        state_code: field(raw, m::STATE_CODE).and_then(as_int).map(Phase::from_code),
    }
}

fn map_stats(raw: Option<&Value>) -> BettingStats {
    let Some(raw) = raw else {
        return BettingStats::default();
    };
    BettingStats {
        home_amount: num_or_zero(field(raw, idx::stats::HOME_AMOUNT)),
        away_amount: num_or_zero(field(raw, idx::stats::AWAY_AMOUNT)),
        home_count: num_or_zero(field(raw, idx::stats::HOME_COUNT)),
        away_count: num_or_zero(field(raw, idx::stats::AWAY_COUNT)),
    }
}

fn map_bets(raw: Option<&Value>) -> Vec<Bet> {
    let Some(bets) = raw.and_then(Value::as_array) else {
        return Vec::new();
    };
    bets.iter().map(map_bet).collect()
}

fn map_bet(raw: &Value) -> Bet {
    use idx::bet as b;

    let side_text = field(raw, b::SIDE).and_then(Value::as_str).unwrap_or("");
    let side = Side::from_wire(side_text).unwrap_or_else(|| {
        debug!("Live bet with unrecognised side {side_text:?}");
        Side::Unknown
    });
    Bet {
        match_id: int_or_zero(field(raw, b::MATCH_ID)),
        amount: num_or_zero(field(raw, b::AMOUNT)),
        side,
        username: text_or_empty(field(raw, b::USERNAME)),
        currency: text_or_empty(field(raw, b::CURRENCY)),
    }
}

/// Parse the odds string; anything unrecognised yields the 1.98/1.98 default.
pub fn parse_odds(source: &str) -> Odds {
    let Some(caps) = RE_ODDS.captures(source) else {
        return Odds::default();
    };
    let home = caps[1].parse::<f64>().ok();
    let away = caps[2].parse::<f64>().ok();
    match (home, away) {
        (Some(home), Some(away)) if home > 0.0 && away > 0.0 => Odds { home, away },
        _ => Odds::default(),
    }
}

/// Parse a result signature such as `{1,0}`.
pub fn parse_result(signature: &str) -> Option<MatchResult> {
    let caps = RE_RESULT.captures(signature)?;
    Some(MatchResult {
        home: caps[1].parse().ok()?,
        away: caps[2].parse().ok()?,
    })
}

/// Accepts epoch milliseconds (number or numeric string), RFC 3339, or a naive
/// `YYYY-MM-DD HH:MM:SS` date taken as UTC.
pub fn parse_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(from_millis),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Ok(ms) = s.parse::<i64>() {
                return from_millis(ms);
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|naive| Utc.from_utc_datetime(&naive))
        }
        _ => None,
    }
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    // 0 is the feed's "unset"
    if ms <= 0 {
        return None;
    }
    DateTime::from_timestamp_millis(ms)
}

/// Positional lookup: `"N"` key on objects, index N on arrays.
fn field(value: &Value, index: usize) -> Option<&Value> {
    let found = match value {
        Value::Object(map) => map.get(&index.to_string()),
        Value::Array(arr) => arr.get(index),
        _ => None,
    };
    found.filter(|v| !v.is_null())
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn num_or_zero(value: Option<&Value>) -> f64 {
    value
        .and_then(as_f64)
        .filter(|n| n.is_finite())
        .map(|n| n.max(0.0)) // stakes and counts are never negative
        .unwrap_or(0.0)
}

fn int_or_zero(value: Option<&Value>) -> i64 {
    value.and_then(as_int).unwrap_or(0)
}

fn text_or_empty(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn opt_text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
