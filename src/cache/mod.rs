//! In-memory TTL cache for upstream datasets.
//!
//! Each dataset (recent games, upcoming games, standings, tv listings) is
//! cached under its own [`CacheKey`] with its own time-to-live, so live-game
//! data can expire on a much shorter schedule than standings.
//!
//! Two guarantees matter here:
//!
//! - **Coalescing**: N concurrent misses on the same key produce exactly one
//!   upstream call; late arrivals block on a per-key lock and adopt the
//!   in-flight outcome, success or failure.
//! - **Stale fallback**: when a refresh fails and any prior successful entry
//!   exists, the caller gets that entry flagged `was_stale` instead of an
//!   error. Only a failing first-ever fetch surfaces as `NoDataAvailable`.
//!
//! Keys are fully independent: the map lock is never held across an await,
//! and refresh serialization happens on a per-key mutex.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::error::DataError;

/// An independently cached data class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetKind {
    Recent,
    Upcoming,
    Standings,
    TvSchedule,
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DatasetKind::Recent => "recent",
            DatasetKind::Upcoming => "upcoming",
            DatasetKind::Standings => "standings",
            DatasetKind::TvSchedule => "tv",
        };
        f.write_str(s)
    }
}

impl FromStr for DatasetKind {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recent" => Ok(DatasetKind::Recent),
            "upcoming" => Ok(DatasetKind::Upcoming),
            "standings" => Ok(DatasetKind::Standings),
            "tv" | "tv-schedule" => Ok(DatasetKind::TvSchedule),
            other => Err(DataError::InvalidRequest(format!(
                "unknown dataset kind: {other:?}"
            ))),
        }
    }
}

/// Narrowing context a cached dataset applies to. Keys with different scopes
/// never merge: MIN's schedule and DAL's schedule are separate entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Scope {
    pub team: Option<String>,
    pub division: Option<String>,
    pub date: Option<NaiveDate>,
}

impl Scope {
    /// League-wide data with no narrowing (e.g. the standings feed).
    pub fn league() -> Self {
        Self::default()
    }

    pub fn team(code: impl Into<String>) -> Self {
        Scope {
            team: Some(code.into()),
            ..Self::default()
        }
    }

    pub fn date(date: NaiveDate) -> Self {
        Scope {
            date: Some(date),
            ..Self::default()
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.team, &self.division, &self.date) {
            (Some(t), _, _) => write!(f, "{t}"),
            (_, Some(d), _) => write!(f, "{d}"),
            (_, _, Some(d)) => write!(f, "{d}"),
            _ => f.write_str("league"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: DatasetKind,
    pub scope: Scope,
}

impl CacheKey {
    pub fn new(kind: DatasetKind, scope: Scope) -> Self {
        CacheKey { kind, scope }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.scope)
    }
}

/// A cached payload snapshot plus its freshness metadata.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub payload: Arc<T>,
    pub fetched_at: DateTime<Utc>,
    /// True when the last refresh failed and this is the previous value.
    pub was_stale: bool,
}

struct CacheEntry<T> {
    payload: Arc<T>,
    fetched_at: DateTime<Utc>,
    stored_at: Instant,
    ttl: Duration,
}

impl<T> CacheEntry<T> {
    fn is_fresh(&self) -> bool {
        self.stored_at.elapsed() < self.ttl
    }

    fn snapshot(&self, was_stale: bool) -> Fetched<T> {
        Fetched {
            payload: Arc::clone(&self.payload),
            fetched_at: self.fetched_at,
            was_stale,
        }
    }
}

struct Failure {
    at: Instant,
    error: Arc<DataError>,
}

/// Per-key state. The entry survives refresh failures so it can serve as
/// fallback; `refresh` serializes loader invocations for this key only.
struct Slot<T> {
    entry: Option<CacheEntry<T>>,
    refresh: Arc<Mutex<()>>,
    last_failure: Option<Failure>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Slot {
            entry: None,
            refresh: Arc::new(Mutex::new(())),
            last_failure: None,
        }
    }
}

/// Thread-safe TTL cache, cheap to clone and share.
pub struct TtlCache<T> {
    inner: Arc<RwLock<HashMap<CacheKey, Slot<T>>>>,
}

impl<T> Clone for TtlCache<T> {
    fn clone(&self) -> Self {
        TtlCache {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for TtlCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TtlCache<T> {
    pub fn new() -> Self {
        TtlCache {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Return the cached value for `key`, refreshing through `loader` when
    /// the entry is absent or past its TTL.
    ///
    /// Concurrent misses on the same key coalesce into a single `loader`
    /// call; misses on different keys proceed independently. On loader
    /// failure the previous entry (if any) is served with `was_stale = true`;
    /// without one the failure propagates as [`DataError::NoDataAvailable`].
    pub async fn get_or_refresh<F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        loader: F,
    ) -> Result<Fetched<T>, DataError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DataError>>,
    {
        if let Some(hit) = self.fresh_snapshot(key).await {
            return Ok(hit);
        }

        let arrived = Instant::now();
        let refresh = self.refresh_handle(key).await;
        let _guard = refresh.lock().await;

        // A refresh may have completed while we waited on the per-key lock.
        // Adopt its outcome instead of issuing a second upstream call.
        if let Some(hit) = self.fresh_snapshot(key).await {
            return Ok(hit);
        }
        if let Some(adopted) = self.failure_since(key, arrived).await {
            return adopted;
        }

        debug!(%key, "cache miss, refreshing");
        match loader().await {
            Ok(payload) => Ok(self.store(key, payload, ttl).await),
            Err(err) => {
                let err = Arc::new(err);
                self.record_failure(key, Arc::clone(&err)).await;
                match self.any_snapshot(key).await {
                    Some(stale) => {
                        warn!(%key, error = %err, "refresh failed, serving stale data");
                        Ok(stale)
                    }
                    None => Err(DataError::NoDataAvailable { source: err }),
                }
            }
        }
    }

    /// Drop every entry. Process-wide reset; normal operation never deletes.
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }

    async fn fresh_snapshot(&self, key: &CacheKey) -> Option<Fetched<T>> {
        let map = self.inner.read().await;
        map.get(key)
            .and_then(|slot| slot.entry.as_ref())
            .filter(|entry| entry.is_fresh())
            .map(|entry| entry.snapshot(false))
    }

    async fn any_snapshot(&self, key: &CacheKey) -> Option<Fetched<T>> {
        let map = self.inner.read().await;
        map.get(key)
            .and_then(|slot| slot.entry.as_ref())
            .map(|entry| entry.snapshot(true))
    }

    /// Outcome adoption for waiters: if a refresh failed at or after
    /// `arrived`, that failure was the in-flight call we were waiting on.
    async fn failure_since(
        &self,
        key: &CacheKey,
        arrived: Instant,
    ) -> Option<Result<Fetched<T>, DataError>> {
        let map = self.inner.read().await;
        let slot = map.get(key)?;
        let failure = slot.last_failure.as_ref()?;
        if failure.at < arrived {
            return None;
        }
        match slot.entry.as_ref() {
            Some(entry) => Some(Ok(entry.snapshot(true))),
            None => Some(Err(DataError::NoDataAvailable {
                source: Arc::clone(&failure.error),
            })),
        }
    }

    async fn refresh_handle(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        let mut map = self.inner.write().await;
        let slot = map.entry(key.clone()).or_insert_with(Slot::new);
        Arc::clone(&slot.refresh)
    }

    async fn store(&self, key: &CacheKey, payload: T, ttl: Duration) -> Fetched<T> {
        let entry = CacheEntry {
            payload: Arc::new(payload),
            fetched_at: Utc::now(),
            stored_at: Instant::now(),
            ttl,
        };
        let fetched = entry.snapshot(false);

        let mut map = self.inner.write().await;
        let slot = map.entry(key.clone()).or_insert_with(Slot::new);
        slot.entry = Some(entry);
        slot.last_failure = None;
        fetched
    }

    async fn record_failure(&self, key: &CacheKey, error: Arc<DataError>) {
        let mut map = self.inner.write().await;
        let slot = map.entry(key.clone()).or_insert_with(Slot::new);
        slot.last_failure = Some(Failure {
            at: Instant::now(),
            error,
        });
    }
}
