use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display status of a match, derived from the provider's status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Upcoming,
    Live,
    Finished,
}

/// Canonical match record as shown to the user and persisted in the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    /// String form of the provider's numeric id; stable across fetches
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    /// `None` means not played yet or unknown, never zero
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub away_score: Option<u32>,
    pub status: MatchStatus,
    /// Kickoff label when upcoming, elapsed-time label when live
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

/// One of the three views of the scoreboard, in navigation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewType {
    Previous,
    #[default]
    Live,
    Upcoming,
}

impl ViewType {
    pub const ALL: [ViewType; 3] = [ViewType::Previous, ViewType::Live, ViewType::Upcoming];

    /// Heading shown above the match list.
    pub fn title(self) -> &'static str {
        match self {
            ViewType::Previous => "Results",
            ViewType::Live => "Live",
            ViewType::Upcoming => "Upcoming",
        }
    }

    /// The view to the left, or `None` at the first position.
    pub fn left(self) -> Option<ViewType> {
        match self {
            ViewType::Previous => None,
            ViewType::Live => Some(ViewType::Previous),
            ViewType::Upcoming => Some(ViewType::Live),
        }
    }

    /// The view to the right, or `None` at the last position.
    pub fn right(self) -> Option<ViewType> {
        match self {
            ViewType::Previous => Some(ViewType::Live),
            ViewType::Live => Some(ViewType::Upcoming),
            ViewType::Upcoming => None,
        }
    }
}

impl std::fmt::Display for ViewType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ViewType::Previous => "previous",
            ViewType::Live => "live",
            ViewType::Upcoming => "upcoming",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ViewType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "previous" | "results" | "finished" => Ok(ViewType::Previous),
            "live" => Ok(ViewType::Live),
            "upcoming" => Ok(ViewType::Upcoming),
            other => Err(format!("unknown view '{}'", other)),
        }
    }
}

/// Matches split into three disjoint lists by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchBucket {
    /// Finished matches
    #[serde(default)]
    pub previous: Vec<Match>,
    #[serde(default)]
    pub live: Vec<Match>,
    #[serde(default)]
    pub upcoming: Vec<Match>,
}

impl MatchBucket {
    /// Append a match to the list matching its status.
    pub fn push(&mut self, m: Match) {
        match m.status {
            MatchStatus::Finished => self.previous.push(m),
            MatchStatus::Live => self.live.push(m),
            MatchStatus::Upcoming => self.upcoming.push(m),
        }
    }

    pub fn get(&self, view: ViewType) -> &[Match] {
        match view {
            ViewType::Previous => &self.previous,
            ViewType::Live => &self.live,
            ViewType::Upcoming => &self.upcoming,
        }
    }

    pub fn len(&self) -> usize {
        self.previous.len() + self.live.len() + self.upcoming.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Last known match data, kept for offline viewing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    pub matches: MatchBucket,
    /// Epoch milliseconds of the fetch that produced `matches`
    pub last_updated: i64,
}

impl CacheSnapshot {
    pub fn new(matches: MatchBucket, at: DateTime<Utc>) -> Self {
        CacheSnapshot {
            matches,
            last_updated: at.timestamp_millis(),
        }
    }

    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.last_updated)
    }
}

/// Favorite match ids, in insertion order and free of duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct FavoriteSet {
    ids: Vec<String>,
}

impl FavoriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|f| f == id)
    }

    /// Add `id` if absent, remove it if present. Returns whether it is now a favorite.
    pub fn toggle(&mut self, id: &str) -> bool {
        if let Some(pos) = self.ids.iter().position(|f| f == id) {
            self.ids.remove(pos);
            false
        } else {
            self.ids.push(id.to_string());
            true
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl From<Vec<String>> for FavoriteSet {
    fn from(ids: Vec<String>) -> Self {
        ids.into_iter().collect()
    }
}

impl From<FavoriteSet> for Vec<String> {
    fn from(set: FavoriteSet) -> Self {
        set.ids
    }
}

impl FromIterator<String> for FavoriteSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut set = FavoriteSet::new();
        for id in iter {
            if !set.contains(&id) {
                set.ids.push(id);
            }
        }
        set
    }
}
