use chrono::{DateTime, FixedOffset, Local, Offset, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::db::models::{Match, MatchBucket, MatchStatus};

/// Display name used when the provider has not decided a side yet.
pub const UNDECIDED_TEAM: &str = "TBD";

/// A match record as served by football-data.org v4.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMatch {
    pub id: u64,
    pub home_team: RemoteTeam,
    pub away_team: RemoteTeam,
    #[serde(default)]
    pub score: RemoteScore,
    pub status: String,
    pub utc_date: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteTeam {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteScore {
    #[serde(default)]
    pub full_time: ScorePair,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScorePair {
    pub home: Option<u32>,
    pub away: Option<u32>,
}

/// Map a provider status code onto the three display states.
///
/// Unknown codes are not an error: anything that is neither finished nor
/// in play is shown as upcoming.
pub fn map_status(remote: &str) -> MatchStatus {
    match remote {
        "FINISHED" => MatchStatus::Finished,
        "IN_PLAY" | "PAUSED" => MatchStatus::Live,
        _ => MatchStatus::Upcoming,
    }
}

#[derive(Debug, Clone, Copy)]
enum LabelZone {
    Local,
    Fixed(FixedOffset),
}

/// Converts provider records into [`Match`] values.
///
/// The only environment input is the time zone used for kickoff labels.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    zone: LabelZone,
}

impl Normalizer {
    /// Label kickoff times in the system's local time zone.
    pub fn local() -> Self {
        Normalizer {
            zone: LabelZone::Local,
        }
    }

    /// Label kickoff times at a fixed offset from UTC.
    pub fn with_offset(offset: FixedOffset) -> Self {
        Normalizer {
            zone: LabelZone::Fixed(offset),
        }
    }

    pub fn utc() -> Self {
        Self::with_offset(Utc.fix())
    }

    /// Normalize one record.
    ///
    /// `live_clock` is the elapsed-time label for in-play matches. The
    /// provider payload has no field for it, so callers that know the clock
    /// pass it in; it is ignored unless the match is live.
    pub fn normalize(&self, raw: &RemoteMatch, live_clock: Option<&str>) -> Match {
        let status = map_status(&raw.status);
        let time = match status {
            MatchStatus::Upcoming => self.kickoff_label(&raw.utc_date),
            MatchStatus::Live => live_clock.map(str::to_string),
            MatchStatus::Finished => None,
        };
        // Upcoming matches never carry a score, even when the provider sends
        // one (AWARDED, SUSPENDED, POSTPONED).
        let (home_score, away_score) = match status {
            MatchStatus::Upcoming => (None, None),
            _ => (raw.score.full_time.home, raw.score.full_time.away),
        };

        Match {
            id: raw.id.to_string(),
            home_team: display_name(&raw.home_team),
            away_team: display_name(&raw.away_team),
            home_score,
            away_score,
            status,
            time,
        }
    }

    /// Two-digit `HH:MM` label of an ISO-8601 kickoff in the configured zone.
    pub fn kickoff_label(&self, utc_date: &str) -> Option<String> {
        let kickoff = match DateTime::parse_from_rfc3339(utc_date) {
            Ok(dt) => dt,
            Err(e) => {
                debug!("Unparseable kickoff '{}': {}", utc_date, e);
                return None;
            }
        };
        let label = match self.zone {
            LabelZone::Local => kickoff.with_timezone(&Local).format("%H:%M").to_string(),
            LabelZone::Fixed(offset) => kickoff.with_timezone(&offset).format("%H:%M").to_string(),
        };
        Some(label)
    }

    /// Normalize every record and group the results by status, keeping input order.
    pub fn partition(&self, raws: &[RemoteMatch]) -> MatchBucket {
        let mut bucket = MatchBucket::default();
        for raw in raws {
            bucket.push(self.normalize(raw, None));
        }
        bucket
    }
}

fn display_name(team: &RemoteTeam) -> String {
    match team.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => UNDECIDED_TEAM.to_string(),
    }
}
