use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use crate::error::Result;

/// Upstream source for NHL data, one method per dataset.
///
/// The core only sees raw JSON payloads and the typed errors of
/// [`crate::error::DataError`]; transport details (REST paths, headers,
/// timeouts) stay behind this trait. Tests substitute stub sources.
#[async_trait]
pub trait NhlSource: Send + Sync {
    /// Season schedule for a team code (e.g. "MIN"), relative to now.
    async fn club_schedule(&self, team: &str) -> Result<Value>;

    /// League-wide standings relative to now.
    async fn standings_now(&self) -> Result<Value>;

    /// TV broadcast schedule for a calendar date.
    async fn tv_schedule(&self, date: NaiveDate) -> Result<Value>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
