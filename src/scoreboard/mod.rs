//! In-memory state behind the dashboard.
//!
//! The scoreboard owns the latest fetch result, the network flag, the view
//! cursor and a working copy of the favorites. Persisted data lives in the
//! [`Store`]; the scoreboard only ever holds derived copies of it.
//!
//! Refreshes are guarded by generation numbers: every fetch takes a ticket
//! before it starts and its result is applied only if no newer fetch has
//! resolved in the meantime.

pub mod selector;

pub use selector::select_matches;

use chrono::Utc;
use tokio::sync::{watch, Notify, RwLock};
use tracing::{debug, info, warn};

use crate::db::models::{CacheSnapshot, FavoriteSet, Match, MatchBucket, ViewType};
use crate::db::Store;
use crate::error::FetchError;
use crate::matches::normalize::{Normalizer, RemoteMatch};
use crate::matches::MatchProvider;

/// Generation number handed out when a fetch starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

/// What happened to a completed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied {
        finished: usize,
        live: usize,
        upcoming: usize,
    },
    Failed(String),
    /// A newer fetch had already resolved; the result was dropped.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" | "prev" => Ok(Direction::Left),
            "right" | "next" => Ok(Direction::Right),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

/// Matches of one view plus everything needed to render them.
#[derive(Debug, Clone)]
pub struct ViewData {
    pub view: ViewType,
    pub online: bool,
    /// Epoch milliseconds of the data shown, if any data exists
    pub last_updated: Option<i64>,
    pub matches: Vec<Match>,
    pub favorites: FavoriteSet,
}

#[derive(Debug, Clone)]
pub struct BoardStatus {
    pub view: ViewType,
    pub online: bool,
    pub last_updated: Option<i64>,
    pub last_error: Option<String>,
}

struct BoardState {
    latest: Option<MatchBucket>,
    latest_updated: Option<i64>,
    online: bool,
    /// Offline because of an explicit signal rather than a failed fetch
    offline_signalled: bool,
    favorites: FavoriteSet,
    issued: u64,
    applied: u64,
    last_error: Option<String>,
}

pub struct Scoreboard {
    store: Store,
    normalizer: Normalizer,
    state: RwLock<BoardState>,
    view_tx: watch::Sender<ViewType>,
    refresh_notify: Notify,
}

impl Scoreboard {
    pub fn new(store: Store, normalizer: Normalizer, view: ViewType, online: bool) -> Self {
        let favorites = store.load_favorites();
        let (view_tx, _) = watch::channel(view);
        Scoreboard {
            store,
            normalizer,
            state: RwLock::new(BoardState {
                latest: None,
                latest_updated: None,
                online,
                offline_signalled: !online,
                favorites,
                issued: 0,
                applied: 0,
                last_error: None,
            }),
            view_tx,
            refresh_notify: Notify::new(),
        }
    }

    // ── View cursor ───────────────────────────────────────────────────────────

    pub fn view(&self) -> ViewType {
        *self.view_tx.borrow()
    }

    /// Receiver that observes every view change.
    pub fn subscribe_view(&self) -> watch::Receiver<ViewType> {
        self.view_tx.subscribe()
    }

    pub fn set_view(&self, view: ViewType) -> ViewType {
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                debug!("View changed: {} -> {}", current, view);
                *current = view;
                true
            }
        });
        view
    }

    /// Move the cursor one step; at either end the view stays put.
    pub fn navigate(&self, direction: Direction) -> ViewType {
        let current = self.view();
        let next = match direction {
            Direction::Left => current.left(),
            Direction::Right => current.right(),
        };
        match next {
            Some(view) => self.set_view(view),
            None => current,
        }
    }

    // ── Network state ─────────────────────────────────────────────────────────

    pub async fn is_online(&self) -> bool {
        self.state.read().await.online
    }

    /// Apply an external network-state signal.
    ///
    /// An explicit "offline" holds until an explicit "online"; fetches that
    /// succeed in between update the data but not the network flag.
    pub async fn set_online(&self, online: bool) {
        let mut state = self.state.write().await;
        state.offline_signalled = !online;
        if state.online != online {
            info!("Network state: {}", if online { "online" } else { "offline" });
            state.online = online;
            if online {
                self.refresh_notify.notify_one();
            }
        }
    }

    // ── Refresh ───────────────────────────────────────────────────────────────

    /// Ask the poller for an immediate refresh.
    pub fn request_refresh(&self) {
        self.refresh_notify.notify_one();
    }

    /// Resolves when a refresh has been requested.
    pub async fn refresh_requested(&self) {
        self.refresh_notify.notified().await;
    }

    pub async fn begin_fetch(&self) -> FetchTicket {
        let mut state = self.state.write().await;
        state.issued += 1;
        FetchTicket(state.issued)
    }

    /// Apply a fetch result unless a newer fetch already resolved.
    ///
    /// Successful results are normalized and persisted as the new snapshot.
    /// A snapshot write failure is logged and does not reject the data.
    pub async fn complete_fetch(
        &self,
        ticket: FetchTicket,
        result: Result<Vec<RemoteMatch>, FetchError>,
    ) -> FetchOutcome {
        let mut state = self.state.write().await;
        if ticket.0 <= state.applied {
            debug!(
                "Discarding stale fetch #{} (applied #{})",
                ticket.0, state.applied
            );
            return FetchOutcome::Stale;
        }
        state.applied = ticket.0;

        match result {
            Ok(raws) => {
                let bucket = self.normalizer.partition(&raws);
                let snapshot = CacheSnapshot::new(bucket, Utc::now());
                if let Err(e) = self.store.save_snapshot(&snapshot) {
                    warn!("Failed to persist match snapshot: {}", e);
                }
                let outcome = FetchOutcome::Applied {
                    finished: snapshot.matches.previous.len(),
                    live: snapshot.matches.live.len(),
                    upcoming: snapshot.matches.upcoming.len(),
                };
                info!(
                    "Fetch #{} applied: {} finished, {} live, {} upcoming",
                    ticket.0,
                    snapshot.matches.previous.len(),
                    snapshot.matches.live.len(),
                    snapshot.matches.upcoming.len()
                );
                if !state.online && !state.offline_signalled {
                    info!("Network state: online");
                    state.online = true;
                }
                state.latest_updated = Some(snapshot.last_updated);
                state.latest = Some(snapshot.matches);
                state.last_error = None;
                outcome
            }
            Err(e) => {
                warn!("Fetch #{} failed: {}", ticket.0, e);
                if e.is_network() && state.online {
                    info!("Network state: offline");
                    state.online = false;
                }
                let message = e.to_string();
                state.last_error = Some(message.clone());
                FetchOutcome::Failed(message)
            }
        }
    }

    /// Fetch from `provider` and apply the result.
    pub async fn refresh(&self, provider: &dyn MatchProvider) -> FetchOutcome {
        let ticket = self.begin_fetch().await;
        debug!("Fetch #{} started ({})", ticket.0, provider.name());
        let result = provider.fetch_matches().await;
        self.complete_fetch(ticket, result).await
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// Matches of `view`, from the latest fetch or, offline, the snapshot.
    pub async fn matches_for(&self, view: ViewType) -> Vec<Match> {
        self.view_data(view).await.matches
    }

    pub async fn view_data(&self, view: ViewType) -> ViewData {
        let state = self.state.read().await;
        let snapshot = if state.online {
            None
        } else {
            self.store.load_snapshot()
        };
        let matches = select_matches(state.online, view, state.latest.as_ref(), snapshot.as_ref());
        let last_updated = if state.online {
            state.latest_updated
        } else {
            snapshot.as_ref().map(|s| s.last_updated)
        };
        ViewData {
            view,
            online: state.online,
            last_updated,
            matches,
            favorites: state.favorites.clone(),
        }
    }

    pub async fn status(&self) -> BoardStatus {
        let state = self.state.read().await;
        let last_updated = if state.online {
            state.latest_updated
        } else {
            self.store.load_snapshot().map(|s| s.last_updated)
        };
        BoardStatus {
            view: self.view(),
            online: state.online,
            last_updated,
            last_error: state.last_error.clone(),
        }
    }

    // ── Favorites ─────────────────────────────────────────────────────────────

    pub async fn favorites(&self) -> FavoriteSet {
        self.state.read().await.favorites.clone()
    }

    /// Flip a favorite and persist the set. Returns whether `id` is now a favorite.
    ///
    /// The persisted set is authoritative. If the store cannot be read or
    /// written the failure is logged and only the in-memory set is toggled.
    pub async fn toggle_favorite(&self, id: &str) -> bool {
        let mut state = self.state.write().await;
        match self.store.toggle_favorite(id) {
            Ok(favorites) => state.favorites = favorites,
            Err(e) => {
                warn!("Failed to persist favorites: {}", e);
                state.favorites.toggle(id);
            }
        }
        state.favorites.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::MatchStatus;
    use crate::db::{KeyValueBackend, MemoryBackend, CACHE_KEY};
    use async_trait::async_trait;
    use std::time::Duration;

    fn raw(id: u64, status: &str) -> RemoteMatch {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "homeTeam": { "name": "Arsenal" },
            "awayTeam": { "name": "Chelsea" },
            "score": { "fullTime": { "home": null, "away": null } },
            "status": status,
            "utcDate": "2024-01-01T15:00:00Z"
        }))
        .unwrap()
    }

    fn board(store: Store) -> Scoreboard {
        Scoreboard::new(store, Normalizer::utc(), ViewType::Live, true)
    }

    async fn network_error() -> FetchError {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let source = reqwest::get(format!("http://{}", addr)).await.unwrap_err();
        FetchError::Transport {
            url: addr.to_string(),
            source,
        }
    }

    /// Returns a fixed batch after an optional delay.
    struct ScriptedProvider {
        delay: Duration,
        matches: Vec<RemoteMatch>,
    }

    #[async_trait]
    impl MatchProvider for ScriptedProvider {
        async fn fetch_matches(&self) -> Result<Vec<RemoteMatch>, FetchError> {
            tokio::time::sleep(self.delay).await;
            Ok(self.matches.clone())
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn test_online_view_before_fetch_is_empty() {
        let b = board(Store::in_memory());
        assert!(b.matches_for(ViewType::Live).await.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_applies_and_persists_snapshot() {
        let store = Store::in_memory();
        let b = board(store.clone());
        let ticket = b.begin_fetch().await;
        let outcome = b
            .complete_fetch(ticket, Ok(vec![raw(1, "FINISHED"), raw(2, "IN_PLAY"), raw(3, "TIMED")]))
            .await;
        assert_eq!(
            outcome,
            FetchOutcome::Applied {
                finished: 1,
                live: 1,
                upcoming: 1
            }
        );
        assert_eq!(b.matches_for(ViewType::Live).await[0].id, "2");

        let snapshot = store.load_snapshot().unwrap();
        assert_eq!(snapshot.matches.previous[0].id, "1");
        assert_eq!(snapshot.matches.upcoming[0].time.as_deref(), Some("15:00"));
        assert_eq!(b.status().await.last_updated, Some(snapshot.last_updated));
    }

    #[tokio::test]
    async fn test_stale_fetch_cannot_overwrite_newer() {
        let b = board(Store::in_memory());
        let older = b.begin_fetch().await;
        let newer = b.begin_fetch().await;

        let applied = b.complete_fetch(newer, Ok(vec![raw(2, "IN_PLAY")])).await;
        assert!(matches!(applied, FetchOutcome::Applied { .. }));
        let stale = b.complete_fetch(older, Ok(vec![raw(1, "IN_PLAY")])).await;
        assert_eq!(stale, FetchOutcome::Stale);

        let live = b.matches_for(ViewType::Live).await;
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, "2");
    }

    #[tokio::test]
    async fn test_newer_failure_blocks_older_success() {
        let b = board(Store::in_memory());
        let older = b.begin_fetch().await;
        let newer = b.begin_fetch().await;

        let failed = b
            .complete_fetch(
                newer,
                Err(FetchError::UnexpectedStatus {
                    url: "http://provider/matches".into(),
                    status: reqwest::StatusCode::TOO_MANY_REQUESTS,
                }),
            )
            .await;
        assert!(matches!(failed, FetchOutcome::Failed(_)));
        assert_eq!(
            b.complete_fetch(older, Ok(vec![raw(1, "IN_PLAY")])).await,
            FetchOutcome::Stale
        );
        assert!(b.matches_for(ViewType::Live).await.is_empty());
        assert!(b.is_online().await, "a status error is not a network loss");
        assert!(b.status().await.last_error.unwrap().contains("429"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_response_loses_to_later_request() {
        let b = std::sync::Arc::new(board(Store::in_memory()));
        let slow = ScriptedProvider {
            delay: Duration::from_secs(5),
            matches: vec![raw(1, "IN_PLAY")],
        };
        let fast = ScriptedProvider {
            delay: Duration::from_millis(10),
            matches: vec![raw(2, "IN_PLAY")],
        };

        let b1 = b.clone();
        let first = tokio::spawn(async move { b1.refresh(&slow).await });
        tokio::task::yield_now().await;
        let b2 = b.clone();
        let second = tokio::spawn(async move { b2.refresh(&fast).await });

        assert!(matches!(second.await.unwrap(), FetchOutcome::Applied { .. }));
        assert_eq!(first.await.unwrap(), FetchOutcome::Stale);
        assert_eq!(b.matches_for(ViewType::Live).await[0].id, "2");
    }

    #[tokio::test]
    async fn test_network_failure_falls_back_to_snapshot() {
        let store = Store::in_memory();
        let b = board(store.clone());
        let t = b.begin_fetch().await;
        b.complete_fetch(t, Ok(vec![raw(3, "IN_PLAY")])).await;

        let t = b.begin_fetch().await;
        let outcome = b.complete_fetch(t, Err(network_error().await)).await;
        assert!(matches!(outcome, FetchOutcome::Failed(_)));
        assert!(!b.is_online().await);

        let data = b.view_data(ViewType::Live).await;
        assert!(!data.online);
        assert_eq!(data.matches[0].id, "3");
        assert!(data.last_updated.is_some());
        assert!(b.matches_for(ViewType::Upcoming).await.is_empty());
    }

    #[tokio::test]
    async fn test_offline_without_snapshot_is_empty() {
        let b = Scoreboard::new(Store::in_memory(), Normalizer::utc(), ViewType::Live, false);
        for view in ViewType::ALL {
            assert!(b.matches_for(view).await.is_empty());
        }
        assert_eq!(b.status().await.last_updated, None);
    }

    #[tokio::test]
    async fn test_offline_with_corrupt_snapshot_is_empty() {
        let backend = MemoryBackend::new();
        backend.set(CACHE_KEY, "[[[").unwrap();
        let b = Scoreboard::new(Store::new(backend), Normalizer::utc(), ViewType::Live, false);
        assert!(b.matches_for(ViewType::Live).await.is_empty());
    }

    #[tokio::test]
    async fn test_offline_reads_snapshot_from_previous_run() {
        let store = Store::in_memory();
        let mut bucket = MatchBucket::default();
        bucket.push(Match {
            id: "3".into(),
            home_team: "Man United".into(),
            away_team: "Tottenham".into(),
            home_score: Some(1),
            away_score: Some(1),
            status: MatchStatus::Live,
            time: Some("45'".into()),
        });
        store
            .save_snapshot(&CacheSnapshot {
                matches: bucket,
                last_updated: 1_704_121_200_000,
            })
            .unwrap();

        let b = Scoreboard::new(store, Normalizer::utc(), ViewType::Upcoming, false);
        assert!(b.matches_for(ViewType::Upcoming).await.is_empty());
        assert_eq!(b.matches_for(ViewType::Live).await.len(), 1);
        assert_eq!(b.status().await.last_updated, Some(1_704_121_200_000));
    }

    #[tokio::test]
    async fn test_going_online_switches_back_to_latest() {
        let b = board(Store::in_memory());
        let t = b.begin_fetch().await;
        b.complete_fetch(t, Ok(vec![raw(5, "FINISHED")])).await;
        b.set_online(false).await;
        assert_eq!(b.matches_for(ViewType::Previous).await[0].id, "5");
        b.set_online(true).await;
        assert_eq!(b.matches_for(ViewType::Previous).await[0].id, "5");
        assert!(b.is_online().await);
    }

    #[tokio::test]
    async fn test_offline_signal_survives_inflight_success() {
        let store = Store::in_memory();
        let b = board(store.clone());
        let t = b.begin_fetch().await;
        b.complete_fetch(t, Ok(vec![raw(1, "IN_PLAY")])).await;

        let t = b.begin_fetch().await;
        b.set_online(false).await;
        let outcome = b.complete_fetch(t, Ok(vec![raw(2, "IN_PLAY")])).await;
        assert!(matches!(outcome, FetchOutcome::Applied { .. }));
        assert!(!b.is_online().await);

        let data = b.view_data(ViewType::Live).await;
        assert!(!data.online);
        assert_eq!(data.matches[0].id, "2", "offline view reads the fresh snapshot");

        b.set_online(true).await;
        assert!(b.is_online().await);
        assert_eq!(b.matches_for(ViewType::Live).await[0].id, "2");
    }

    #[tokio::test]
    async fn test_success_recovers_from_network_failure() {
        let b = board(Store::in_memory());
        let t = b.begin_fetch().await;
        b.complete_fetch(t, Err(network_error().await)).await;
        assert!(!b.is_online().await);

        let t = b.begin_fetch().await;
        b.complete_fetch(t, Ok(vec![raw(4, "FINISHED")])).await;
        assert!(b.is_online().await);
        assert_eq!(b.matches_for(ViewType::Previous).await[0].id, "4");
    }

    #[tokio::test]
    async fn test_toggle_favorite_persists() {
        let store = Store::in_memory();
        let b = board(store.clone());
        assert!(b.toggle_favorite("10").await);
        assert!(store.load_favorites().contains("10"));
        assert!(b.view_data(ViewType::Live).await.favorites.contains("10"));

        assert!(!b.toggle_favorite("10").await);
        assert!(store.load_favorites().is_empty());
    }

    #[tokio::test]
    async fn test_favorites_loaded_at_startup() {
        let store = Store::in_memory();
        store.toggle_favorite("42").unwrap();
        let b = board(store);
        assert!(b.favorites().await.contains("42"));
    }

    #[test]
    fn test_navigate_clamps_at_edges() {
        let b = Scoreboard::new(Store::in_memory(), Normalizer::utc(), ViewType::Live, true);
        assert_eq!(b.navigate(Direction::Left), ViewType::Previous);
        assert_eq!(b.navigate(Direction::Left), ViewType::Previous);
        assert_eq!(b.navigate(Direction::Right), ViewType::Live);
        assert_eq!(b.navigate(Direction::Right), ViewType::Upcoming);
        assert_eq!(b.navigate(Direction::Right), ViewType::Upcoming);
        assert_eq!(b.view(), ViewType::Upcoming);
    }

    #[test]
    fn test_view_subscribers_see_changes_only() {
        let b = Scoreboard::new(Store::in_memory(), Normalizer::utc(), ViewType::Live, true);
        let mut rx = b.subscribe_view();
        b.set_view(ViewType::Live);
        assert!(!rx.has_changed().unwrap());
        b.set_view(ViewType::Previous);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), ViewType::Previous);
    }
}
