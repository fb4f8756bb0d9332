use std::time::Duration;

use clap::Parser;

use crate::ticker::networks::NetworkNaming;

/// NHL ticker data service
#[derive(Parser, Debug, Clone)]
#[command(name = "rinkside", version, about)]
pub struct Config {
    /// NHL web API base URL
    #[arg(long, env = "NHL_API_BASE", default_value = "https://api-web.nhle.com")]
    pub nhl_api_base: String,

    /// Default team code the schedule is scoped to (3-letter, e.g. MIN)
    #[arg(long, env = "TEAM_CODE", default_value = "MIN")]
    pub team_code: String,

    /// Default division for the standings section
    #[arg(long, env = "DEFAULT_DIVISION", default_value = "Central")]
    pub default_division: String,

    /// TTL for cached schedule data (recent + upcoming games), seconds
    #[arg(long, env = "SCHEDULE_TTL_SECS", default_value = "60")]
    pub schedule_ttl_secs: u64,

    /// TTL for cached standings, seconds
    #[arg(long, env = "STANDINGS_TTL_SECS", default_value = "300")]
    pub standings_ttl_secs: u64,

    /// TTL for cached per-date TV listings, seconds
    #[arg(long, env = "TV_TTL_SECS", default_value = "300")]
    pub tv_ttl_secs: u64,

    /// Upstream request timeout, seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value = "10")]
    pub upstream_timeout_secs: u64,

    /// Default number of upcoming games in a view
    #[arg(long, env = "DEFAULT_UPCOMING", default_value = "8")]
    pub default_upcoming: usize,

    /// Default number of recent games in a view
    #[arg(long, env = "DEFAULT_RECENT", default_value = "5")]
    pub default_recent: usize,

    /// Hard ceiling for per-request game counts
    #[arg(long, env = "MAX_RESULTS", default_value = "20")]
    pub max_results: usize,

    /// Preferred network ordering/filtering; supports '*'/'?' wildcards
    #[arg(
        long,
        env = "PREFERRED_NETWORKS",
        value_delimiter = ',',
        default_values_t = ["TNT", "TruTV", "ESPN*", "FDSN*", "FDS*", "Prime*"].map(String::from)
    )]
    pub preferred_networks: Vec<String>,

    /// PATTERN=NAME display mappings, first match wins (e.g. "FDS*=FanDuel Sports North")
    #[arg(
        long,
        env = "NETWORK_NAME_PATTERNS",
        value_delimiter = ';',
        default_values_t = ["FDS*=FanDuel Sports North"].map(String::from)
    )]
    pub network_name_patterns: Vec<String>,

    /// Exact NAME=DISPLAY mappings (e.g. "ESPN Select=ESPN+")
    #[arg(
        long,
        env = "NETWORK_NAME_MAP",
        value_delimiter = ';',
        default_values_t = ["ESPN Select=ESPN+", "Prime=Prime Video"].map(String::from)
    )]
    pub network_name_map: Vec<String>,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !is_team_code(&self.team_code) {
            anyhow::bail!(
                "team_code must be a 3-letter code like MIN, got {:?}",
                self.team_code
            );
        }
        if self.default_division.trim().is_empty() {
            anyhow::bail!("default_division must not be empty");
        }
        if self.max_results == 0 {
            anyhow::bail!("max_results must be at least 1");
        }
        if self.default_upcoming > self.max_results || self.default_recent > self.max_results {
            anyhow::bail!(
                "default counts ({}/{}) must not exceed max_results ({})",
                self.default_upcoming,
                self.default_recent,
                self.max_results
            );
        }
        if self.upstream_timeout_secs == 0 {
            anyhow::bail!("upstream_timeout_secs must be positive");
        }
        Ok(())
    }

    pub fn schedule_ttl(&self) -> Duration {
        Duration::from_secs(self.schedule_ttl_secs)
    }

    pub fn standings_ttl(&self) -> Duration {
        Duration::from_secs(self.standings_ttl_secs)
    }

    pub fn tv_ttl(&self) -> Duration {
        Duration::from_secs(self.tv_ttl_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    /// Assemble the typed network display config from the raw option strings.
    /// Malformed `KEY=VALUE` entries are dropped rather than rejected.
    pub fn network_naming(&self) -> NetworkNaming {
        NetworkNaming {
            preferred: self
                .preferred_networks
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            patterns: parse_pairs(&self.network_name_patterns),
            exact: parse_pairs(&self.network_name_map).into_iter().collect(),
        }
    }
}

/// Strict 3-letter uppercase team code, the shape every NHL abbreviation has.
pub fn is_team_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())
}

fn parse_pairs(entries: &[String]) -> Vec<(String, String)> {
    entries
        .iter()
        .filter_map(|entry| {
            let (key, value) = entry.split_once('=')?;
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() || value.is_empty() {
                return None;
            }
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config::parse_from(["rinkside"])
    }

    #[test]
    fn test_defaults_are_valid() {
        let cfg = base();
        cfg.validate().unwrap();
        assert_eq!(cfg.team_code, "MIN");
        assert_eq!(cfg.schedule_ttl(), Duration::from_secs(60));
        assert_eq!(cfg.standings_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_rejects_bad_team_code() {
        let cfg = Config::parse_from(["rinkside", "--team-code", "minnesota"]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_default_above_max() {
        let cfg = Config::parse_from(["rinkside", "--default-upcoming", "50"]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_network_naming_parses_pairs() {
        let cfg = Config::parse_from([
            "rinkside",
            "--network-name-patterns",
            "FDS*=FanDuel Sports North;broken;ESPN?=ESPN",
            "--network-name-map",
            "ESPN Select=ESPN+",
        ]);
        let naming = cfg.network_naming();
        assert_eq!(
            naming.patterns,
            vec![
                ("FDS*".to_string(), "FanDuel Sports North".to_string()),
                ("ESPN?".to_string(), "ESPN".to_string()),
            ]
        );
        assert_eq!(naming.exact["ESPN Select"], "ESPN+");
        assert_eq!(naming.preferred.len(), 6);
    }

    #[test]
    fn test_is_team_code() {
        assert!(is_team_code("MIN"));
        assert!(!is_team_code("min"));
        assert!(!is_team_code("MINN"));
        assert!(!is_team_code("M1N"));
    }
}
