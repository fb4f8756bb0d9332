use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle of a game as reported by the NHL schedule feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Scheduled,
    Live,
    Final,
}

/// Goal totals, home/away oriented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Score {
    pub home: u32,
    pub away: u32,
}

/// Which kind of period a live game is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    Regulation,
    Overtime,
    Shootout,
}

/// Period/clock state for an in-progress game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameClock {
    pub period: u32,
    pub kind: PeriodKind,
    /// Time remaining in the period, e.g. "12:34". Absent during shootouts
    /// and on feeds that omit the running clock.
    pub remaining: Option<String>,
    pub intermission: bool,
}

impl GameClock {
    /// Compact ticker label: "P2 12:34", "OT 3:21", "SO", "INT".
    pub fn label(&self) -> String {
        if self.intermission {
            return "INT".to_string();
        }
        match self.kind {
            PeriodKind::Shootout => "SO".to_string(),
            PeriodKind::Overtime => match &self.remaining {
                Some(t) => format!("OT {}", t),
                None => "OT".to_string(),
            },
            PeriodKind::Regulation => match &self.remaining {
                Some(t) => format!("P{} {}", self.period, t),
                None => format!("P{}", self.period),
            },
        }
    }
}

/// A normalized schedule game.
///
/// Invariants (upheld by the normalizer): a `Final` game always has a score,
/// a `Scheduled` game never does, and `clock` is only present while `Live`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Game {
    pub id: String,
    /// Home team code, e.g. "MIN".
    pub home: String,
    /// Away team code.
    pub away: String,
    pub start_time: DateTime<Utc>,
    pub status: GameStatus,
    pub score: Option<Score>,
    pub clock: Option<GameClock>,
    /// Raw broadcast/network names embedded in the schedule payload.
    /// The composer maps these to display names for upcoming games.
    pub networks: Vec<String>,
}

impl Game {
    pub fn involves(&self, team: &str) -> bool {
        self.home == team || self.away == team
    }

    /// Opponent code from `team`'s point of view, if `team` is playing.
    pub fn opponent_of(&self, team: &str) -> Option<&str> {
        if self.home == team {
            Some(&self.away)
        } else if self.away == team {
            Some(&self.home)
        } else {
            None
        }
    }

    /// "W" or "L" from `team`'s point of view; only for finals.
    pub fn result_for(&self, team: &str) -> Option<&'static str> {
        if self.status != GameStatus::Final {
            return None;
        }
        let score = self.score?;
        let (us, them) = if self.home == team {
            (score.home, score.away)
        } else if self.away == team {
            (score.away, score.home)
        } else {
            return None;
        };
        if us > them {
            Some("W")
        } else {
            Some("L")
        }
    }
}

/// One team's row in the division standings table.
///
/// `points` is deliberately not a field: NHL points are a function of the
/// win/loss counters and exposing them separately invites drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StandingsRow {
    /// Team code, e.g. "COL".
    pub team: String,
    pub team_name: String,
    pub division: String,
    /// Single-letter division abbreviation ("C"), empty when the feed omits it.
    pub division_abbrev: String,
    pub games_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub ot_losses: u32,
    pub regulation_wins: u32,
    pub goals_for: u32,
    pub goals_against: u32,
    /// Compact streak like "W3"; empty when the feed omits it.
    pub streak: String,
}

impl StandingsRow {
    /// League points: two per win, one per overtime/shootout loss.
    pub fn points(&self) -> u32 {
        2 * self.wins + self.ot_losses
    }

    /// Share of available points, 0.0 when no games played.
    pub fn points_pct(&self) -> f64 {
        if self.games_played == 0 {
            return 0.0;
        }
        f64::from(self.points()) / f64::from(2 * self.games_played)
    }

    pub fn goal_differential(&self) -> i64 {
        i64::from(self.goals_for) - i64::from(self.goals_against)
    }
}

/// game id → raw network names, extracted from a tv-schedule payload.
pub type TvListings = HashMap<String, Vec<String>>;

/// A dataset slice plus the freshness metadata of the cache entry it came
/// from. `was_stale` means the upstream refresh failed and this is the last
/// known good data.
#[derive(Debug, Clone, Serialize)]
pub struct Section<T> {
    pub items: Vec<T>,
    pub was_stale: bool,
    pub fetched_at: DateTime<Utc>,
}

/// Standings slice for one division.
#[derive(Debug, Clone, Serialize)]
pub struct StandingsSection {
    /// Division actually used (override or configured default).
    pub division: String,
    /// All division names present in the league payload.
    pub divisions: Vec<String>,
    pub rows: Vec<StandingsRow>,
    pub was_stale: bool,
    pub fetched_at: DateTime<Utc>,
}

/// Read-only snapshot handed to the presentation layer.
///
/// Sections the request did not select are `None`. Theme is passed through
/// untouched; the core attaches no meaning to it.
#[derive(Debug, Clone, Serialize)]
pub struct ComposedView {
    pub generated_at: DateTime<Utc>,
    /// Team code the schedule sections are scoped to.
    pub team: String,
    pub upcoming: Option<Section<Game>>,
    pub recent: Option<Section<Game>>,
    pub standings: Option<StandingsSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}
