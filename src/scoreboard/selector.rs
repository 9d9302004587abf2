use crate::db::models::{CacheSnapshot, Match, MatchBucket, ViewType};

/// Pick the matches a view shows.
///
/// Online, the latest fetch result is used (empty until the first fetch
/// lands). Offline, the persisted snapshot is used, and a missing snapshot
/// gives an empty list. Nothing else feeds into the choice.
pub fn select_matches(
    online: bool,
    view: ViewType,
    latest: Option<&MatchBucket>,
    snapshot: Option<&CacheSnapshot>,
) -> Vec<Match> {
    let source = if online {
        latest
    } else {
        snapshot.map(|s| &s.matches)
    };
    source.map(|bucket| bucket.get(view).to_vec()).unwrap_or_default()
}
