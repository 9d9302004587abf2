use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::normalize::RemoteMatch;
use super::provider::MatchProvider;
use crate::error::FetchError;

pub const DEFAULT_BASE_URL: &str = "https://api.football-data.org/v4";
const AUTH_HEADER: &str = "X-Auth-Token";

/// Match provider backed by the football-data.org v4 REST API.
/// Docs: <https://www.football-data.org/documentation/quickstart>
pub struct FootballData {
    http: Client,
    api_key: Option<String>,
    /// Base URL for overriding in tests
    base_url: String,
    days_back: i64,
    days_ahead: i64,
}

/// The v4 API wraps the list in an envelope; a bare list is accepted too.
#[derive(Deserialize)]
#[serde(untagged)]
enum MatchesPayload {
    Envelope { matches: Vec<RemoteMatch> },
    Bare(Vec<RemoteMatch>),
}

impl MatchesPayload {
    fn into_matches(self) -> Vec<RemoteMatch> {
        match self {
            MatchesPayload::Envelope { matches } => matches,
            MatchesPayload::Bare(matches) => matches,
        }
    }
}

impl FootballData {
    pub fn new(api_key: Option<&str>, base_url: Option<&str>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(FootballData {
            http,
            api_key: api_key.filter(|k| !k.is_empty()).map(str::to_string),
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).to_string(),
            days_back: 2,
            days_ahead: 7,
        })
    }

    /// Set how many days before and after today the fetch covers.
    pub fn with_window(mut self, days_back: u32, days_ahead: u32) -> Self {
        self.days_back = i64::from(days_back);
        self.days_ahead = i64::from(days_ahead);
        self
    }

    /// `/matches` URL for the window around `today`.
    fn matches_url(&self, today: NaiveDate) -> Result<Url, FetchError> {
        let date_from = today - Duration::days(self.days_back);
        let date_to = today + Duration::days(self.days_ahead);

        let mut url = Url::parse(&format!(
            "{}/matches",
            self.base_url.trim_end_matches('/')
        ))?;
        url.query_pairs_mut()
            .append_pair("dateFrom", &date_from.format("%Y-%m-%d").to_string())
            .append_pair("dateTo", &date_to.format("%Y-%m-%d").to_string());
        Ok(url)
    }
}

#[async_trait]
impl MatchProvider for FootballData {
    fn name(&self) -> &str {
        "football-data.org"
    }

    async fn fetch_matches(&self) -> Result<Vec<RemoteMatch>, FetchError> {
        let url = self.matches_url(Utc::now().date_naive())?;
        debug!("Fetching matches from {}", url);

        let mut req = self.http.get(url.clone());
        if let Some(key) = &self.api_key {
            req = req.header(AUTH_HEADER, key);
        }

        let resp = req.send().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;

        if !resp.status().is_success() {
            return Err(FetchError::UnexpectedStatus {
                url: url.to_string(),
                status: resp.status(),
            });
        }

        let payload: MatchesPayload = resp.json().await.map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })?;
        Ok(payload.into_matches())
    }
}
