//! View composition over the cached datasets.
//!
//! [`Ticker`] is the object the presentation layer talks to: constructed
//! once at startup with injected configuration and an [`NhlSource`], shared
//! by reference across request handlers. Each `get_view` call pulls the
//! selected datasets through the TTL cache (fetching upstream only on
//! expiry), applies the request's overrides, and returns an immutable
//! [`ComposedView`] snapshot. Cached entries are never mutated here.

pub mod networks;

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use futures_util::future::join_all;
use tracing::debug;

use crate::cache::{CacheKey, DatasetKind, Fetched, Scope, TtlCache};
use crate::config::{is_team_code, Config};
use crate::error::{DataError, Result};
use crate::models::{
    ComposedView, Game, GameStatus, Section, StandingsRow, StandingsSection, TvListings,
};
use crate::nhl::{normalize, NhlSource};
use self::networks::NetworkNaming;

/// Per-request view parameters, as handed over by the (out-of-scope)
/// routing layer. Count overrides stay raw strings on purpose: a garbage
/// query parameter falls back to the configured default instead of failing
/// the whole request.
#[derive(Debug, Clone, Default)]
pub struct ViewRequest {
    pub include_upcoming: bool,
    pub include_recent: bool,
    pub include_standings: bool,
    pub upcoming_count: Option<String>,
    pub recent_count: Option<String>,
    /// Replaces the configured default division, standings section only.
    pub division: Option<String>,
    /// Per-request team override; invalid codes fall back to the default.
    pub team: Option<String>,
    /// Presentation-only, echoed into the view untouched.
    pub theme: Option<String>,
}

impl ViewRequest {
    /// Every section, default counts.
    pub fn full() -> Self {
        ViewRequest {
            include_upcoming: true,
            include_recent: true,
            include_standings: true,
            ..Self::default()
        }
    }

    /// Build a request from dataset-kind strings. Unknown kinds are the one
    /// request-level input that is a hard error rather than a fallback.
    pub fn for_kinds<'a, I>(kinds: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut req = ViewRequest::default();
        for raw in kinds {
            match DatasetKind::from_str(raw)? {
                DatasetKind::Upcoming => req.include_upcoming = true,
                DatasetKind::Recent => req.include_recent = true,
                DatasetKind::Standings => req.include_standings = true,
                DatasetKind::TvSchedule => {
                    return Err(DataError::InvalidRequest(
                        "tv listings are fetched implicitly, not a view section".into(),
                    ));
                }
            }
        }
        Ok(req)
    }
}

/// The cached data-access service behind the widget.
pub struct Ticker {
    config: Config,
    naming: NetworkNaming,
    source: Arc<dyn NhlSource>,
    games: TtlCache<Vec<Game>>,
    standings: TtlCache<Vec<StandingsRow>>,
    tv: TtlCache<TvListings>,
}

impl Ticker {
    pub fn new(config: Config, source: Arc<dyn NhlSource>) -> Self {
        let naming = config.network_naming();
        Ticker {
            config,
            naming,
            source,
            games: TtlCache::new(),
            standings: TtlCache::new(),
            tv: TtlCache::new(),
        }
    }

    /// Compose a view snapshot for one request.
    ///
    /// Selected datasets are pulled through the cache concurrently. The only
    /// errors that surface are [`DataError::InvalidRequest`] and
    /// [`DataError::NoDataAvailable`] (a dataset whose first-ever fetch
    /// failed); anything else degrades to stale data inside the cache.
    pub async fn get_view(&self, req: &ViewRequest) -> Result<ComposedView> {
        if !(req.include_upcoming || req.include_recent || req.include_standings) {
            return Err(DataError::InvalidRequest("no dataset selected".into()));
        }

        let team = self.resolve_team(req.team.as_deref());
        debug!(source = self.source.name(), %team, "composing view");

        let upcoming_fut = async {
            if req.include_upcoming {
                Some(self.schedule_games(DatasetKind::Upcoming, &team).await)
            } else {
                None
            }
        };
        let recent_fut = async {
            if req.include_recent {
                Some(self.schedule_games(DatasetKind::Recent, &team).await)
            } else {
                None
            }
        };
        let standings_fut = async {
            if req.include_standings {
                Some(self.standings_rows().await)
            } else {
                None
            }
        };
        let (upcoming, recent, standings) = tokio::join!(upcoming_fut, recent_fut, standings_fut);

        let upcoming = match upcoming {
            Some(fetched) => {
                let count = resolve_count(
                    req.upcoming_count.as_deref(),
                    self.config.default_upcoming,
                    self.config.max_results,
                );
                Some(self.upcoming_section(fetched?, count).await)
            }
            None => None,
        };
        let recent = match recent {
            Some(fetched) => {
                let count = resolve_count(
                    req.recent_count.as_deref(),
                    self.config.default_recent,
                    self.config.max_results,
                );
                Some(recent_section(fetched?, count))
            }
            None => None,
        };
        let standings = match standings {
            Some(fetched) => Some(self.standings_section(fetched?, req.division.as_deref())),
            None => None,
        };

        Ok(ComposedView {
            generated_at: Utc::now(),
            team,
            upcoming,
            recent,
            standings,
            theme: req.theme.clone(),
        })
    }

    /// Validate a per-request team override without touching shared state.
    fn resolve_team(&self, raw: Option<&str>) -> String {
        match raw.map(|t| t.trim().to_ascii_uppercase()) {
            Some(code) if is_team_code(&code) => code,
            Some(other) => {
                debug!(requested = %other, "invalid team override, using default");
                self.config.team_code.clone()
            }
            None => self.config.team_code.clone(),
        }
    }

    async fn schedule_games(&self, kind: DatasetKind, team: &str) -> Result<Fetched<Vec<Game>>> {
        let key = CacheKey::new(kind, Scope::team(team));
        let source = Arc::clone(&self.source);
        let team = team.to_string();
        self.games
            .get_or_refresh(&key, self.config.schedule_ttl(), move || async move {
                let payload = source.club_schedule(&team).await?;
                normalize::games_from_schedule(&payload)
            })
            .await
    }

    async fn standings_rows(&self) -> Result<Fetched<Vec<StandingsRow>>> {
        let key = CacheKey::new(DatasetKind::Standings, Scope::league());
        let source = Arc::clone(&self.source);
        self.standings
            .get_or_refresh(&key, self.config.standings_ttl(), move || async move {
                let payload = source.standings_now().await?;
                normalize::standings_from_payload(&payload)
            })
            .await
    }

    /// Scheduled games, soonest first, with display network names attached.
    async fn upcoming_section(&self, fetched: Fetched<Vec<Game>>, count: usize) -> Section<Game> {
        let mut games: Vec<Game> = fetched
            .payload
            .iter()
            .filter(|g| g.status == GameStatus::Scheduled)
            .cloned()
            .collect();
        games.sort_by_key(|g| g.start_time);
        games.truncate(count);

        // Per-date TV listings are only needed for games without embedded
        // broadcast info; a listings outage just means no network labels.
        let dates: BTreeSet<NaiveDate> = games
            .iter()
            .filter(|g| g.networks.is_empty())
            .map(|g| g.start_time.date_naive())
            .collect();
        let listings = self.tv_for_dates(dates).await;

        for game in &mut games {
            let raw = if game.networks.is_empty() {
                listings.get(&game.id).cloned().unwrap_or_default()
            } else {
                std::mem::take(&mut game.networks)
            };
            game.networks = self.naming.display_list(&raw);
        }

        Section {
            items: games,
            was_stale: fetched.was_stale,
            fetched_at: fetched.fetched_at,
        }
    }

    async fn tv_for_dates(&self, dates: BTreeSet<NaiveDate>) -> TvListings {
        let fetches = dates.into_iter().map(|date| async move {
            let key = CacheKey::new(DatasetKind::TvSchedule, Scope::date(date));
            let source = Arc::clone(&self.source);
            let result = self
                .tv
                .get_or_refresh(&key, self.config.tv_ttl(), move || async move {
                    let payload = source.tv_schedule(date).await?;
                    Ok(normalize::tv_listings(&payload))
                })
                .await;
            match result {
                Ok(fetched) => Some(fetched.payload),
                Err(err) => {
                    debug!(%date, error = %err, "tv listings unavailable");
                    None
                }
            }
        });

        let mut merged = TvListings::new();
        for listings in join_all(fetches).await.into_iter().flatten() {
            for (game_id, nets) in listings.iter() {
                merged.insert(game_id.clone(), nets.clone());
            }
        }
        merged
    }

    /// Standings filtered to one division, league point ordering.
    ///
    /// An override naming a division with zero rows yields an empty list on
    /// purpose: silently substituting the default would hide operator typos
    /// behind plausible-looking data.
    fn standings_section(
        &self,
        fetched: Fetched<Vec<StandingsRow>>,
        division_override: Option<&str>,
    ) -> StandingsSection {
        let division = division_override
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(&self.config.default_division)
            .to_string();

        let divisions: Vec<String> = fetched
            .payload
            .iter()
            .filter(|r| !r.division.is_empty())
            .map(|r| r.division.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut rows: Vec<StandingsRow> = fetched
            .payload
            .iter()
            .filter(|r| division_matches(r, &division))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.points()
                .cmp(&a.points())
                .then_with(|| {
                    b.points_pct()
                        .partial_cmp(&a.points_pct())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| b.regulation_wins.cmp(&a.regulation_wins))
        });

        StandingsSection {
            division,
            divisions,
            rows,
            was_stale: fetched.was_stale,
            fetched_at: fetched.fetched_at,
        }
    }
}

/// Live and final games, most recent first. Network labels are an
/// upcoming-game concern; recent cards render scores instead.
fn recent_section(fetched: Fetched<Vec<Game>>, count: usize) -> Section<Game> {
    let mut games: Vec<Game> = fetched
        .payload
        .iter()
        .filter(|g| matches!(g.status, GameStatus::Live | GameStatus::Final))
        .cloned()
        .collect();
    games.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    games.truncate(count);
    for game in &mut games {
        game.networks.clear();
    }

    Section {
        items: games,
        was_stale: fetched.was_stale,
        fetched_at: fetched.fetched_at,
    }
}

/// Resolve a raw count override: non-numeric or negative values fall back to
/// the default, everything is clamped to the configured maximum.
fn resolve_count(raw: Option<&str>, default: usize, max: usize) -> usize {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n >= 0)
        .map(|n| n as usize)
        .unwrap_or(default)
        .min(max)
}

fn division_matches(row: &StandingsRow, division: &str) -> bool {
    row.division.eq_ignore_ascii_case(division)
        || (!row.division_abbrev.is_empty() && row.division_abbrev.eq_ignore_ascii_case(division))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use clap::Parser;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct StubSource {
        schedule: Value,
        standings: Value,
        tv: Value,
        schedule_calls: AtomicUsize,
        tv_calls: AtomicUsize,
        fail_schedule: AtomicBool,
    }

    impl StubSource {
        fn new(schedule: Value, standings: Value, tv: Value) -> Arc<Self> {
            Arc::new(StubSource {
                schedule,
                standings,
                tv,
                schedule_calls: AtomicUsize::new(0),
                tv_calls: AtomicUsize::new(0),
                fail_schedule: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl NhlSource for StubSource {
        async fn club_schedule(&self, _team: &str) -> Result<Value> {
            self.schedule_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_schedule.load(Ordering::SeqCst) {
                return Err(DataError::UpstreamTimeout);
            }
            Ok(self.schedule.clone())
        }

        async fn standings_now(&self) -> Result<Value> {
            Ok(self.standings.clone())
        }

        async fn tv_schedule(&self, _date: NaiveDate) -> Result<Value> {
            self.tv_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.tv.clone())
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    fn scheduled(id: &str, start: &str) -> Value {
        json!({
            "id": id,
            "startTimeUTC": start,
            "gameState": "FUT",
            "homeTeam": {"abbrev": "MIN"},
            "awayTeam": {"abbrev": "DAL"},
        })
    }

    fn final_game(id: &str, start: &str, home: u32, away: u32) -> Value {
        json!({
            "id": id,
            "startTimeUTC": start,
            "gameState": "FINAL",
            "homeTeam": {"abbrev": "MIN", "score": home},
            "awayTeam": {"abbrev": "DAL", "score": away},
        })
    }

    /// 3 scheduled + 4 final games, deliberately out of order.
    fn schedule_fixture() -> Value {
        json!({
            "games": [
                final_game("f2", "2025-01-03T00:00:00Z", 2, 3),
                scheduled("u3", "2025-02-05T00:00:00Z"),
                final_game("f4", "2025-01-07T00:00:00Z", 5, 2),
                scheduled("u1", "2025-02-01T00:00:00Z"),
                final_game("f1", "2025-01-01T00:00:00Z", 1, 0),
                final_game("f3", "2025-01-05T00:00:00Z", 4, 4),
                scheduled("u2", "2025-02-03T00:00:00Z"),
            ]
        })
    }

    fn standings_fixture() -> Value {
        json!({
            "standings": [
                {
                    "teamAbbrev": "MIN", "teamName": {"default": "Minnesota Wild"},
                    "divisionName": "Central", "divisionAbbrev": "C",
                    "gamesPlayed": 20, "wins": 12, "losses": 6, "otLosses": 2,
                    "regulationWins": 10,
                },
                {
                    "teamAbbrev": "COL", "teamName": {"default": "Colorado Avalanche"},
                    "divisionName": "Central", "divisionAbbrev": "C",
                    "gamesPlayed": 20, "wins": 13, "losses": 6, "otLosses": 1,
                    "regulationWins": 11,
                },
                {
                    "teamAbbrev": "VGK", "teamName": {"default": "Vegas Golden Knights"},
                    "divisionName": "Pacific", "divisionAbbrev": "P",
                    "gamesPlayed": 20, "wins": 14, "losses": 5, "otLosses": 1,
                    "regulationWins": 12,
                },
            ]
        })
    }

    fn ticker_with(source: Arc<StubSource>, extra_args: &[&str]) -> Ticker {
        let mut args = vec!["rinkside"];
        args.extend_from_slice(extra_args);
        let config = Config::parse_from(args);
        Ticker::new(config, source)
    }

    fn ticker(source: Arc<StubSource>) -> Ticker {
        ticker_with(source, &[])
    }

    #[tokio::test]
    async fn test_recent_selection_orders_descending() {
        let source = StubSource::new(schedule_fixture(), standings_fixture(), json!({}));
        let ticker = ticker(source);

        let req = ViewRequest {
            include_recent: true,
            recent_count: Some("2".into()),
            ..ViewRequest::default()
        };
        let view = ticker.get_view(&req).await.unwrap();

        assert!(view.upcoming.is_none());
        assert!(view.standings.is_none());
        let recent = view.recent.unwrap();
        assert!(!recent.was_stale);
        let ids: Vec<&str> = recent.items.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["f4", "f3"]);
        assert_eq!(recent.items[0].result_for("MIN"), Some("W"));
    }

    #[tokio::test]
    async fn test_upcoming_selection_orders_ascending() {
        let source = StubSource::new(schedule_fixture(), standings_fixture(), json!({}));
        let ticker = ticker(source);

        let req = ViewRequest {
            include_upcoming: true,
            ..ViewRequest::default()
        };
        let view = ticker.get_view(&req).await.unwrap();
        let upcoming = view.upcoming.unwrap();
        let ids: Vec<&str> = upcoming.items.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u2", "u3"]);
    }

    #[tokio::test]
    async fn test_count_override_resolution() {
        let source = StubSource::new(schedule_fixture(), standings_fixture(), json!({}));
        let ticker = ticker(source);

        for (raw, expected) in [
            (None, 3),            // default 8, only 3 scheduled
            (Some("-5"), 3),      // negative → default
            (Some("abc"), 3),     // garbage → default
            (Some("999"), 3),     // clamped to max, still only 3 games
            (Some("1"), 1),
            (Some("0"), 0),
        ] {
            let req = ViewRequest {
                include_upcoming: true,
                upcoming_count: raw.map(String::from),
                ..ViewRequest::default()
            };
            let view = ticker.get_view(&req).await.unwrap();
            assert_eq!(
                view.upcoming.unwrap().items.len(),
                expected,
                "override {raw:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_division_default_and_sorting() {
        let source = StubSource::new(schedule_fixture(), standings_fixture(), json!({}));
        let ticker = ticker(source);

        let req = ViewRequest {
            include_standings: true,
            ..ViewRequest::default()
        };
        let view = ticker.get_view(&req).await.unwrap();
        let standings = view.standings.unwrap();

        assert_eq!(standings.division, "Central");
        assert_eq!(standings.divisions, vec!["Central", "Pacific"]);
        // COL 27 pts over MIN 26; Vegas filtered out.
        let teams: Vec<&str> = standings.rows.iter().map(|r| r.team.as_str()).collect();
        assert_eq!(teams, vec!["COL", "MIN"]);
    }

    #[tokio::test]
    async fn test_division_override_with_zero_rows_is_empty() {
        let source = StubSource::new(schedule_fixture(), standings_fixture(), json!({}));
        let ticker = ticker(source);

        let req = ViewRequest {
            include_standings: true,
            division: Some("Northwest".into()),
            ..ViewRequest::default()
        };
        let view = ticker.get_view(&req).await.unwrap();
        let standings = view.standings.unwrap();
        assert_eq!(standings.division, "Northwest");
        assert!(standings.rows.is_empty());
    }

    #[tokio::test]
    async fn test_division_abbrev_matches_case_insensitively() {
        let source = StubSource::new(schedule_fixture(), standings_fixture(), json!({}));
        let ticker = ticker(source);

        let req = ViewRequest {
            include_standings: true,
            division: Some("p".into()),
            ..ViewRequest::default()
        };
        let view = ticker.get_view(&req).await.unwrap();
        let standings = view.standings.unwrap();
        assert_eq!(standings.rows.len(), 1);
        assert_eq!(standings.rows[0].team, "VGK");
    }

    #[tokio::test]
    async fn test_fresh_cache_serves_second_view_without_calls() {
        let source = StubSource::new(schedule_fixture(), standings_fixture(), json!({}));
        let ticker = ticker(Arc::clone(&source));

        let req = ViewRequest {
            include_upcoming: true,
            include_recent: true,
            ..ViewRequest::default()
        };
        ticker.get_view(&req).await.unwrap();
        // Upcoming and recent are independent keys over the same endpoint.
        assert_eq!(source.schedule_calls.load(Ordering::SeqCst), 2);

        ticker.get_view(&req).await.unwrap();
        assert_eq!(source.schedule_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_upstream_failure_serves_stale_sections() {
        let source = StubSource::new(schedule_fixture(), standings_fixture(), json!({}));
        // Zero TTL so every view refreshes the schedule.
        let ticker = ticker_with(Arc::clone(&source), &["--schedule-ttl-secs", "0"]);

        let req = ViewRequest {
            include_recent: true,
            ..ViewRequest::default()
        };
        let first = ticker.get_view(&req).await.unwrap();
        assert!(!first.recent.as_ref().unwrap().was_stale);

        source.fail_schedule.store(true, Ordering::SeqCst);
        let second = ticker.get_view(&req).await.unwrap();
        let recent = second.recent.unwrap();
        assert!(recent.was_stale);
        assert_eq!(recent.items.len(), first.recent.unwrap().items.len());
    }

    #[tokio::test]
    async fn test_cold_start_failure_propagates() {
        let source = StubSource::new(schedule_fixture(), standings_fixture(), json!({}));
        source.fail_schedule.store(true, Ordering::SeqCst);
        let ticker = ticker(source);

        let req = ViewRequest {
            include_recent: true,
            ..ViewRequest::default()
        };
        let err = ticker.get_view(&req).await.unwrap_err();
        assert!(matches!(err, DataError::NoDataAvailable { .. }));
    }

    #[tokio::test]
    async fn test_networks_resolved_for_upcoming() {
        let mut schedule = schedule_fixture();
        // u1 carries embedded broadcasts; u2/u3 rely on the tv listings feed.
        schedule["games"][3]["tvBroadcasts"] = json!([{"callSign": "FDSN1"}]);
        let tv = json!({
            "games": [{"id": "u2", "broadcasts": [{"network": "ESPN Select"}]}]
        });
        let source = StubSource::new(schedule, standings_fixture(), tv);
        let ticker = ticker(Arc::clone(&source));

        let req = ViewRequest {
            include_upcoming: true,
            ..ViewRequest::default()
        };
        let view = ticker.get_view(&req).await.unwrap();
        let items = view.upcoming.unwrap().items;

        assert_eq!(items[0].networks, vec!["FanDuel Sports North"]);
        assert_eq!(items[1].networks, vec!["ESPN+"]);
        assert!(items[2].networks.is_empty());
        // One tv fetch per distinct date with missing networks (u2, u3).
        assert_eq!(source.tv_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_theme_and_team_override() {
        let source = StubSource::new(schedule_fixture(), standings_fixture(), json!({}));
        let ticker = ticker(source);

        let req = ViewRequest {
            include_recent: true,
            team: Some("dal".into()),
            theme: Some("transparent".into()),
            ..ViewRequest::default()
        };
        let view = ticker.get_view(&req).await.unwrap();
        assert_eq!(view.team, "DAL");
        assert_eq!(view.theme.as_deref(), Some("transparent"));

        let req = ViewRequest {
            include_recent: true,
            team: Some("not-a-code".into()),
            ..ViewRequest::default()
        };
        let view = ticker.get_view(&req).await.unwrap();
        assert_eq!(view.team, "MIN");
    }

    #[tokio::test]
    async fn test_empty_selection_is_invalid_request() {
        let source = StubSource::new(schedule_fixture(), standings_fixture(), json!({}));
        let ticker = ticker(source);
        let err = ticker.get_view(&ViewRequest::default()).await.unwrap_err();
        assert!(matches!(err, DataError::InvalidRequest(_)));
    }

    #[test]
    fn test_for_kinds_rejects_unknown() {
        let req = ViewRequest::for_kinds(["recent", "standings"]).unwrap();
        assert!(req.include_recent);
        assert!(req.include_standings);
        assert!(!req.include_upcoming);

        assert!(matches!(
            ViewRequest::for_kinds(["scores"]),
            Err(DataError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_resolve_count_edges() {
        assert_eq!(resolve_count(None, 5, 20), 5);
        assert_eq!(resolve_count(Some(" 7 "), 5, 20), 7);
        assert_eq!(resolve_count(Some("25"), 5, 20), 20);
        assert_eq!(resolve_count(Some("-1"), 5, 20), 5);
        assert_eq!(resolve_count(Some("3.5"), 5, 20), 5);
        assert_eq!(resolve_count(Some("0"), 5, 20), 0);
    }
}
