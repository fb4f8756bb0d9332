//! Normalization of raw NHL payloads into the typed domain model.
//!
//! The NHL web API is unversioned in practice: the same logical field shows
//! up under different names (`abbrev` vs `teamAbbrev`), sometimes as a bare
//! string and sometimes as `{"default": …}`, and schedule games may be flat
//! or nested under week/month groupings. Everything here is a pure function
//! over `serde_json::Value`; required fields that are absent or mis-shaped
//! produce `SchemaMismatch`, while fields legitimately missing for a given
//! game status (no score before puck drop, no clock outside live play) are
//! tolerated.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::Value;

use crate::error::{DataError, Result};
use crate::models::{Game, GameClock, GameStatus, PeriodKind, Score, StandingsRow, TvListings};

/// Keys under which the schedule endpoint nests its game lists.
const GAME_GROUP_KEYS: &[&str] = &["gameWeek", "weeks", "months", "gamesByMonth", "gamesByDate"];

/// Flatten a schedule payload into normalized games.
pub fn games_from_schedule(payload: &Value) -> Result<Vec<Game>> {
    flatten_games(payload)?
        .into_iter()
        .map(game_from_value)
        .collect()
}

fn flatten_games(payload: &Value) -> Result<Vec<&Value>> {
    if !payload.is_object() {
        return Err(DataError::SchemaMismatch(
            "schedule payload is not an object".into(),
        ));
    }

    if let Some(games) = payload["games"].as_array() {
        return Ok(games.iter().collect());
    }

    for key in GAME_GROUP_KEYS {
        if let Some(groups) = payload[*key].as_array() {
            return Ok(groups
                .iter()
                .filter_map(|entry| entry["games"].as_array())
                .flatten()
                .collect());
        }
    }

    Err(DataError::SchemaMismatch(
        "schedule payload has no recognizable games list".into(),
    ))
}

fn game_from_value(game: &Value) -> Result<Game> {
    let id = game_id(game)
        .ok_or_else(|| DataError::SchemaMismatch("game missing id".into()))?;

    let start_time = start_time(game).ok_or_else(|| {
        DataError::SchemaMismatch(format!("game {id} missing or unparseable start time"))
    })?;

    let home = team_code(&game["homeTeam"]).ok_or_else(|| {
        DataError::SchemaMismatch(format!("game {id} missing home team code"))
    })?;
    let away = team_code(&game["awayTeam"]).ok_or_else(|| {
        DataError::SchemaMismatch(format!("game {id} missing away team code"))
    })?;

    let state = state_string(game).ok_or_else(|| {
        DataError::SchemaMismatch(format!("game {id} missing game state"))
    })?;
    let status = status_from_state(&state).ok_or_else(|| {
        DataError::SchemaMismatch(format!("game {id} has unrecognized state {state:?}"))
    })?;

    // A scheduled game never carries a score; a final always must.
    let score = match status {
        GameStatus::Scheduled => None,
        GameStatus::Live => score_pair(game),
        GameStatus::Final => Some(score_pair(game).ok_or_else(|| {
            DataError::SchemaMismatch(format!("final game {id} missing score"))
        })?),
    };

    let clock = match status {
        GameStatus::Live => clock_from_game(game),
        _ => None,
    };

    Ok(Game {
        id,
        home,
        away,
        start_time,
        status,
        score,
        clock,
        networks: embedded_networks(game),
    })
}

fn game_id(game: &Value) -> Option<String> {
    for key in ["id", "gameId", "gamePK"] {
        let v = &game[key];
        if let Some(s) = non_empty_str(v) {
            return Some(s.to_string());
        }
        if let Some(n) = v.as_u64() {
            return Some(n.to_string());
        }
    }
    None
}

fn start_time(game: &Value) -> Option<DateTime<Utc>> {
    for key in ["startTimeUTC", "startTime", "gameDate"] {
        let Some(raw) = non_empty_str(&game[key]) else {
            continue;
        };
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        // Some feeds give a bare date; treat it as midnight UTC.
        if let Ok(date) = raw.parse::<NaiveDate>() {
            return Some(date.and_time(NaiveTime::MIN).and_utc());
        }
    }
    None
}

/// Team code from a team object: `abbrev` or `teamAbbrev`, either a bare
/// string or `{"default": "MIN"}`.
fn team_code(team: &Value) -> Option<String> {
    for key in ["abbrev", "teamAbbrev"] {
        let v = &team[key];
        if let Some(s) = non_empty_str(v) {
            return Some(s.to_string());
        }
        if let Some(s) = non_empty_str(&v["default"]) {
            return Some(s.to_string());
        }
    }
    None
}

fn state_string(game: &Value) -> Option<String> {
    for key in ["gameState", "gameScheduleState", "gameStatus", "state"] {
        if let Some(s) = non_empty_str(&game[key]) {
            return Some(s.to_string());
        }
    }
    None
}

fn status_from_state(state: &str) -> Option<GameStatus> {
    match state.trim().to_ascii_uppercase().as_str() {
        "FUT" | "PRE" | "SCHEDULED" | "PREVIEW" => Some(GameStatus::Scheduled),
        "LIVE" | "CRIT" | "CRITICAL" | "IN_PROGRESS" | "INPROGRESS" | "ACTIVE" | "ONGOING" => {
            Some(GameStatus::Live)
        }
        "FINAL" | "OFF" | "COMPLETED" | "DONE" | "FINISHED" => Some(GameStatus::Final),
        _ => None,
    }
}

/// Scores live on the team objects or under a `score` sibling. Both sides
/// must be present to count.
fn score_pair(game: &Value) -> Option<Score> {
    let home = as_u32(&game["homeTeam"]["score"]).or_else(|| as_u32(&game["score"]["home"]))?;
    let away = as_u32(&game["awayTeam"]["score"]).or_else(|| as_u32(&game["score"]["away"]))?;
    Some(Score { home, away })
}

fn clock_from_game(game: &Value) -> Option<GameClock> {
    let clock = &game["clock"];
    let remaining = non_empty_str(&clock["timeRemaining"])
        .or_else(|| non_empty_str(&clock["timeRemainingInPeriod"]))
        .or_else(|| non_empty_str(&game["timeRemaining"]))
        .map(str::to_string);

    let pd = &game["periodDescriptor"];
    let number = as_u32(&pd["number"])
        .or_else(|| as_u32(&pd["periodNumber"]))
        .or_else(|| as_u32(&game["period"]))
        .or_else(|| as_u32(&game["currentPeriod"]));

    let kind_str = non_empty_str(&pd["periodType"])
        .or_else(|| non_empty_str(&pd["type"]))
        .or_else(|| non_empty_str(&game["periodType"]));
    let kind = match kind_str.map(str::to_ascii_uppercase).as_deref() {
        Some("OT" | "OVERTIME") => PeriodKind::Overtime,
        Some("SO" | "SHOOTOUT") => PeriodKind::Shootout,
        _ => PeriodKind::Regulation,
    };

    let intermission = game["inIntermission"]
        .as_bool()
        .or_else(|| clock["inIntermission"].as_bool())
        .unwrap_or(false);

    if number.is_none() && kind_str.is_none() && remaining.is_none() && !intermission {
        return None;
    }

    let period = number.unwrap_or(match kind {
        PeriodKind::Regulation => 1,
        PeriodKind::Overtime => 4,
        PeriodKind::Shootout => 5,
    });

    Some(GameClock {
        period,
        kind,
        remaining,
        intermission,
    })
}

/// Broadcast names embedded directly on a schedule game object.
fn embedded_networks(game: &Value) -> Vec<String> {
    let mut nets = Vec::new();

    for key in ["tvBroadcasts", "broadcasts", "tvBroadcast", "tv"] {
        collect_networks(&game[key], &mut nets);
    }
    for key in ["broadcast", "broadcastInfo"] {
        let b = &game[key];
        collect_networks(&b["tvBroadcasts"], &mut nets);
        collect_networks(&b["broadcasts"], &mut nets);
        push_network(&b["network"], &mut nets);
    }

    nets.sort();
    nets.dedup();
    nets
}

fn collect_networks(node: &Value, out: &mut Vec<String>) {
    if let Some(items) = node.as_array() {
        for item in items {
            push_network(item, out);
        }
    } else {
        push_network(node, out);
    }
}

fn push_network(v: &Value, out: &mut Vec<String>) {
    if let Some(s) = non_empty_str(v) {
        if !s.eq_ignore_ascii_case("null") && !s.eq_ignore_ascii_case("none") {
            out.push(s.to_string());
        }
        return;
    }
    if v.is_object() {
        for key in [
            "network",
            "name",
            "callSign",
            "callsign",
            "displayName",
            "shortName",
        ] {
            if let Some(s) = non_empty_str(&v[key]) {
                if !s.eq_ignore_ascii_case("null") && !s.eq_ignore_ascii_case("none") {
                    out.push(s.to_string());
                }
            }
        }
    }
}

/// Normalize a standings payload into rows. `points` is never read from the
/// feed: it is derived from the counters on [`StandingsRow`].
pub fn standings_from_payload(payload: &Value) -> Result<Vec<StandingsRow>> {
    let rows = payload["standings"].as_array().ok_or_else(|| {
        DataError::SchemaMismatch("standings payload has no standings list".into())
    })?;

    rows.iter().map(standings_row).collect()
}

fn standings_row(row: &Value) -> Result<StandingsRow> {
    let team = team_code_direct(&row["teamAbbrev"]).ok_or_else(|| {
        DataError::SchemaMismatch("standings row missing team abbreviation".into())
    })?;

    let team_name = non_empty_str(&row["teamName"]["default"])
        .or_else(|| non_empty_str(&row["teamCommonName"]["default"]))
        .unwrap_or(&team)
        .to_string();

    Ok(StandingsRow {
        division: non_empty_str(&row["divisionName"])
            .unwrap_or_default()
            .to_string(),
        division_abbrev: non_empty_str(&row["divisionAbbrev"])
            .unwrap_or_default()
            .to_string(),
        games_played: counter(row, &["gamesPlayed"]),
        wins: counter(row, &["wins"]),
        losses: counter(row, &["losses"]),
        ot_losses: counter(row, &["otLosses", "overtimeLosses"]),
        regulation_wins: counter(row, &["regulationWins", "regWins", "rw"]),
        goals_for: counter(row, &["goalFor", "goalsFor", "gf"]),
        goals_against: counter(row, &["goalAgainst", "goalsAgainst", "ga"]),
        streak: streak(row),
        team,
        team_name,
    })
}

/// `teamAbbrev` is a bare string on some feeds and `{"default": …}` on others.
fn team_code_direct(v: &Value) -> Option<String> {
    non_empty_str(v)
        .or_else(|| non_empty_str(&v["default"]))
        .map(str::to_string)
}

fn counter(row: &Value, keys: &[&str]) -> u32 {
    keys.iter().find_map(|k| as_u32(&row[*k])).unwrap_or(0)
}

/// "W" + 3 → "W3"; just the code when the count is absent.
fn streak(row: &Value) -> String {
    let code = non_empty_str(&row["streakCode"]).or_else(|| non_empty_str(&row["streak"]));
    match (code, as_u32(&row["streakCount"])) {
        (Some(code), Some(count)) => format!("{code}{count}"),
        (Some(code), None) => code.to_string(),
        (None, _) => String::new(),
    }
}

/// Walk a tv-schedule payload and map game id → raw network names.
///
/// The payload shape varies release to release, so the walk is recursive and
/// defensive; unrecognized shapes yield an empty map rather than an error.
pub fn tv_listings(payload: &Value) -> TvListings {
    let mut listings = TvListings::new();
    walk_tv(payload, &mut listings);
    for nets in listings.values_mut() {
        nets.sort();
        nets.dedup();
    }
    listings
}

fn walk_tv(node: &Value, listings: &mut TvListings) {
    match node {
        Value::Object(map) => {
            if let Some(id) = game_id(node) {
                let mut nets = Vec::new();
                for key in ["broadcasts", "tvBroadcasts", "networks", "channels"] {
                    collect_networks(&node[key], &mut nets);
                }
                for key in ["network", "callSign", "callsign"] {
                    push_network(&node[key], &mut nets);
                }
                if !nets.is_empty() {
                    listings.entry(id).or_default().extend(nets);
                }
            }
            for v in map.values() {
                walk_tv(v, listings);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk_tv(item, listings);
            }
        }
        _ => {}
    }
}

fn non_empty_str(v: &Value) -> Option<&str> {
    v.as_str().map(str::trim).filter(|s| !s.is_empty())
}

/// Numbers arrive both as JSON numbers and as strings depending on endpoint.
fn as_u32(v: &Value) -> Option<u32> {
    v.as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}
