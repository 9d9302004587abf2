use chrono::FixedOffset;
use clap::Parser;
use std::net::SocketAddr;

use crate::db::models::ViewType;
use crate::matches::football_data::DEFAULT_BASE_URL;

/// Football scores dashboard with offline snapshot cache
#[derive(Parser, Debug, Clone)]
#[command(name = "football-scoreboard", version, about)]
pub struct Config {
    /// football-data.org API base URL
    #[arg(long, env = "FOOTBALL_DATA_API_URL", default_value = DEFAULT_BASE_URL)]
    pub api_url: String,

    /// football-data.org API token (sent as X-Auth-Token)
    #[arg(long, env = "FOOTBALL_DATA_API_KEY")]
    pub api_key: Option<String>,

    /// SQLite database holding the match snapshot and favorites
    #[arg(long, env = "DATABASE_PATH", default_value = "football-scores.db")]
    pub database_path: String,

    /// Dashboard listen address
    #[arg(long, env = "DASHBOARD_ADDR", default_value = "127.0.0.1:8080")]
    pub dashboard_addr: String,

    /// Live view polling interval in seconds
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "30")]
    pub poll_interval_secs: u64,

    /// Days before today included in the fetch window
    #[arg(long, env = "DAYS_BACK", default_value = "2")]
    pub days_back: u32,

    /// Days after today included in the fetch window
    #[arg(long, env = "DAYS_AHEAD", default_value = "7")]
    pub days_ahead: u32,

    /// Offset from UTC (minutes) for kickoff labels; system local time if unset
    #[arg(long, env = "UTC_OFFSET_MINUTES", allow_hyphen_values = true)]
    pub utc_offset_minutes: Option<i32>,

    /// View shown at startup (previous, live, upcoming)
    #[arg(long, env = "INITIAL_VIEW", default_value = "live")]
    pub initial_view: ViewType,

    /// Start offline and serve only the cached snapshot (no polling)
    #[arg(long, env = "OFFLINE", default_value = "false")]
    pub offline: bool,
}

const MAX_WINDOW_DAYS: u32 = 31;

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be at least 1");
        }
        if self.days_back > MAX_WINDOW_DAYS || self.days_ahead > MAX_WINDOW_DAYS {
            anyhow::bail!("days_back and days_ahead must be at most {}", MAX_WINDOW_DAYS);
        }
        if self.utc_offset_minutes.is_some() && self.label_offset().is_none() {
            anyhow::bail!("utc_offset_minutes must be within ±1439");
        }
        self.dashboard_addr
            .parse::<SocketAddr>()
            .map_err(|e| anyhow::anyhow!("invalid dashboard_addr '{}': {}", self.dashboard_addr, e))?;
        if self.api_key.is_none() && !self.offline {
            tracing::warn!("FOOTBALL_DATA_API_KEY not set; the provider may reject requests");
        }
        Ok(())
    }

    /// Fixed kickoff-label offset, if one was configured and is in range.
    pub fn label_offset(&self) -> Option<FixedOffset> {
        let minutes = self.utc_offset_minutes?;
        if minutes.abs() >= 24 * 60 {
            return None;
        }
        FixedOffset::east_opt(minutes * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["football-scoreboard"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_validate() {
        let config = parse(&["--api-key", "k"]);
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.days_back, 2);
        assert_eq!(config.days_ahead, 7);
        assert_eq!(config.initial_view, ViewType::Live);
        assert!(!config.offline);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_interval() {
        let config = parse(&["--poll-interval-secs", "0"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_wide_window() {
        let config = parse(&["--days-ahead", "90"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_label_offset() {
        let config = parse(&["--utc-offset-minutes", "-300"]);
        assert_eq!(config.label_offset(), FixedOffset::west_opt(5 * 3600));
        assert!(config.validate().is_ok());

        let config = parse(&["--utc-offset-minutes", "1440"]);
        assert_eq!(config.label_offset(), None);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_listen_address() {
        let config = parse(&["--dashboard-addr", "localhost"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_initial_view_parses() {
        let config = parse(&["--initial-view", "upcoming", "--offline"]);
        assert_eq!(config.initial_view, ViewType::Upcoming);
        assert!(config.offline);
    }
}
