use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::provider::NhlSource;
use crate::error::{DataError, Result};

/// Client for the NHL web API (`api-web.nhle.com`).
///
/// Applies the configured request timeout on every call and maps transport
/// failures onto the typed taxonomy. No retries here: whether a retry is
/// worth attempting versus serving stale data is the cache's decision.
pub struct NhlWebClient {
    http: Client,
    base_url: String,
}

impl NhlWebClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("rinkside/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(NhlWebClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(DataError::from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::UpstreamBadStatus(status));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| DataError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl NhlSource for NhlWebClient {
    async fn club_schedule(&self, team: &str) -> Result<Value> {
        self.get_json(&format!("/v1/club-schedule-season/{}/now", team))
            .await
    }

    async fn standings_now(&self) -> Result<Value> {
        self.get_json("/v1/standings/now").await
    }

    async fn tv_schedule(&self, date: NaiveDate) -> Result<Value> {
        self.get_json(&format!("/v1/network/tv-schedule/{}", date.format("%Y-%m-%d")))
            .await
    }

    fn name(&self) -> &str {
        "nhl-web"
    }
}
