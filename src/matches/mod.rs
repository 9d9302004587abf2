pub mod football_data;
pub mod normalize;
pub mod provider;

pub use football_data::FootballData;
pub use normalize::{Normalizer, RemoteMatch};
pub use provider::MatchProvider;

use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info};

use crate::db::models::ViewType;
use crate::scoreboard::Scoreboard;

/// Handle to the background polling task.
///
/// Dropping it stops the task, its interval timer and any in-flight fetches.
pub struct LivePoller {
    handle: JoinHandle<()>,
}

impl LivePoller {
    pub fn stop(self) {}
}

impl Drop for LivePoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawns a background task that loads matches once, then re-fetches every
/// `poll_interval` while the scoreboard shows the live view.
///
/// Switching into the live view or requesting a refresh triggers a fetch
/// right away and cancels any fetch still in flight. An interval tick is
/// skipped while a fetch is running, so at most one request is outstanding.
pub fn start_poller(
    board: Arc<Scoreboard>,
    provider: Arc<dyn MatchProvider>,
    poll_interval: Duration,
) -> LivePoller {
    let handle = tokio::spawn(async move {
        info!(
            "Match poller started (provider={}, interval={:?})",
            provider.name(),
            poll_interval
        );

        let mut view_rx = board.subscribe_view();
        let mut inflight = JoinSet::new();
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // First tick completes immediately
        interval.tick().await;

        spawn_refresh(&mut inflight, &board, &provider);

        loop {
            let live = *view_rx.borrow_and_update() == ViewType::Live;

            tokio::select! {
                _ = interval.tick(), if live => {
                    if inflight.is_empty() {
                        spawn_refresh(&mut inflight, &board, &provider);
                    } else {
                        debug!("Skipping poll tick, fetch still in flight");
                    }
                }
                changed = view_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if *view_rx.borrow() == ViewType::Live {
                        spawn_refresh(&mut inflight, &board, &provider);
                        interval.reset();
                    }
                }
                _ = board.refresh_requested() => {
                    spawn_refresh(&mut inflight, &board, &provider);
                    interval.reset();
                }
                Some(_) = inflight.join_next(), if !inflight.is_empty() => {}
            }
        }

        info!("Match poller stopped");
    });

    LivePoller { handle }
}

/// Start a fetch, superseding any that is still running.
fn spawn_refresh(
    inflight: &mut JoinSet<()>,
    board: &Arc<Scoreboard>,
    provider: &Arc<dyn MatchProvider>,
) {
    if !inflight.is_empty() {
        debug!("Cancelling {} in-flight fetch(es)", inflight.len());
        inflight.abort_all();
    }
    let board = Arc::clone(board);
    let provider = Arc::clone(provider);
    inflight.spawn(async move {
        let outcome = board.refresh(provider.as_ref()).await;
        debug!("Refresh finished: {:?}", outcome);
    });
}
