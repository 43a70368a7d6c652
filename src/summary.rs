use chrono::Utc;

use crate::types::{FeedEvent, League, Match, MatchSummary};

/// Hex digits of the md5 hash kept in summaries.
const MD5_PREFIX_LEN: usize = 8;

/// Compact stake text: `1.2B`, `3.4M`, `56K`, or the whole amount below 1000.
pub fn format_amount(amount: f64) -> String {
    if amount >= 1_000_000_000.0 {
        format!("{:.1}B", amount / 1_000_000_000.0)
    } else if amount >= 1_000_000.0 {
        format!("{:.1}M", amount / 1_000_000.0)
    } else if amount >= 1_000.0 {
        format!("{:.0}K", amount / 1_000.0)
    } else {
        format!("{amount:.0}")
    }
}

/// Hide the middle of a bettor's name: `player99` → `pla***99`.
/// Names of four characters or fewer are shown as is.
pub fn mask_username(username: &str) -> String {
    let chars: Vec<char> = username.chars().collect();
    if chars.len() <= 4 {
        return username.to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}***{tail}")
}

impl MatchSummary {
    pub fn from_match(m: &Match) -> Self {
        let stats = &m.betting_stats;
        Self {
            match_id: m.match_id,
            home_team: m.home_team.clone(),
            away_team: m.away_team.clone(),
            phase: m.phase().label(),
            odds: m.odds,
            home_amount: format_amount(stats.home_amount),
            away_amount: format_amount(stats.away_amount),
            home_share_pct: round1(stats.home_share()),
            away_share_pct: round1(stats.away_share()),
            home_count: stats.home_count,
            away_count: stats.away_count,
            live_bet_count: m.live_bets.len(),
            result: m.result,
            winner: m.result.and_then(|r| r.winner()),
            has_stream: m.stream_url.is_some(),
            md5_prefix: m
                .md5_hash
                .as_deref()
                .map(|h| h.chars().take(MD5_PREFIX_LEN).collect()),
        }
    }
}

impl FeedEvent {
    /// Report line for a freshly published snapshot, stamped now.
    pub fn from_league(league: &League) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            league_id: league.id,
            league_name: league.name.clone(),
            match_count: league.matches.len(),
            current: league.current_match().map(MatchSummary::from_match),
        }
    }
}

fn round1(pct: f64) -> f64 {
    (pct * 10.0).round() / 10.0
}
