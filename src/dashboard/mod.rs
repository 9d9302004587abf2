use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::db::models::{Match, ViewType};
use crate::scoreboard::{Direction, Scoreboard};

#[derive(Clone)]
pub struct AppState {
    pub board: Arc<Scoreboard>,
    /// Whether a poller is running to act on refresh requests
    pub polling: bool,
}

/// Build the Axum router for the dashboard.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/matches", get(matches_handler))
        .route("/api/view", get(view_handler))
        .route("/api/view/:direction", post(navigate_handler))
        .route("/api/favorites", get(favorites_handler))
        .route("/api/favorites/:id/toggle", post(toggle_favorite_handler))
        .route("/api/refresh", post(refresh_handler))
        .route("/api/status", get(status_handler))
        .route("/api/network/:state", post(network_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCard {
    #[serde(flatten)]
    pub inner: Match,
    pub favorite: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewResponse {
    pub view: ViewType,
    pub title: String,
    pub online: bool,
    pub last_updated: Option<i64>,
    pub matches: Vec<MatchCard>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorResponse {
    pub view: ViewType,
    pub title: String,
    pub can_go_left: bool,
    pub can_go_right: bool,
}

impl From<ViewType> for CursorResponse {
    fn from(view: ViewType) -> Self {
        CursorResponse {
            view,
            title: view.title().to_string(),
            can_go_left: view.left().is_some(),
            can_go_right: view.right().is_some(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FavoriteResponse {
    pub id: String,
    pub favorite: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub view: ViewType,
    pub online: bool,
    pub last_updated: Option<i64>,
    pub last_error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ViewQuery {
    view: Option<ViewType>,
}

/// Serve the dashboard HTML page.
async fn index_handler() -> impl IntoResponse {
    Html(DASHBOARD_HTML)
}

/// GET /api/matches?view=live
async fn matches_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ViewQuery>,
) -> Json<ViewResponse> {
    let view = query.view.unwrap_or_else(|| state.board.view());
    let data = state.board.view_data(view).await;
    let matches = data
        .matches
        .into_iter()
        .map(|m| MatchCard {
            favorite: data.favorites.contains(&m.id),
            inner: m,
        })
        .collect();
    Json(ViewResponse {
        view,
        title: view.title().to_string(),
        online: data.online,
        last_updated: data.last_updated,
        matches,
    })
}

/// GET /api/view
async fn view_handler(State(state): State<Arc<AppState>>) -> Json<CursorResponse> {
    Json(state.board.view().into())
}

/// POST /api/view/left | /api/view/right
async fn navigate_handler(
    State(state): State<Arc<AppState>>,
    Path(direction): Path<String>,
) -> Result<Json<CursorResponse>, (StatusCode, String)> {
    let direction: Direction = direction
        .parse()
        .map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    Ok(Json(state.board.navigate(direction).into()))
}

/// GET /api/favorites
async fn favorites_handler(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.board.favorites().await.into())
}

/// POST /api/favorites/:id/toggle
async fn toggle_favorite_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<FavoriteResponse> {
    let favorite = state.board.toggle_favorite(&id).await;
    Json(FavoriteResponse { id, favorite })
}

/// POST /api/refresh
async fn refresh_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    state.board.request_refresh();
    StatusCode::ACCEPTED
}

/// GET /api/status
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let status = state.board.status().await;
    Json(StatusResponse {
        view: status.view,
        online: status.online,
        last_updated: status.last_updated,
        last_error: status.last_error,
    })
}

/// POST /api/network/online | /api/network/offline
///
/// Without a poller nothing could fetch fresh data, so "online" is refused
/// and the board keeps serving the snapshot.
async fn network_handler(
    State(state): State<Arc<AppState>>,
    Path(network): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let online = match network.as_str() {
        "online" => true,
        "offline" => false,
        other => {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("unknown network state '{}'", other),
            ))
        }
    };
    if online && !state.polling {
        return Err((
            StatusCode::CONFLICT,
            "no poller running (started with --offline)".to_string(),
        ));
    }
    state.board.set_online(online).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Embedded single-file dashboard (HTML + CSS + JS)
const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Football Scores</title>
<style>
  :root { --bg: #0f1117; --card: #1a1d27; --border: #2a2d3a; --accent: #6c63ff; --muted: #8888aa; --text: #e0e0e0; }
  * { box-sizing: border-box; margin: 0; padding: 0; }
  body { background: var(--bg); color: var(--text); font-family: system-ui, sans-serif; padding: 1rem; }
  header { display: flex; align-items: center; justify-content: space-between; max-width: 24rem; margin: 0 auto 1.5rem; }
  header h1 { font-size: 1.1rem; font-weight: 600; }
  button { background: none; border: 1px solid var(--border); color: var(--text); border-radius: 6px; padding: .3rem .7rem; cursor: pointer; }
  button:disabled { opacity: .3; cursor: default; }
  #list { max-width: 24rem; margin: 0 auto; display: grid; gap: .5rem; }
  .card { background: var(--card); border: 1px solid var(--border); border-radius: 8px; padding: 1rem; }
  .card.live { border-color: var(--accent); }
  .meta { display: flex; justify-content: space-between; font-size: .75rem; color: var(--muted); margin-bottom: .5rem; }
  .live .meta .label { color: var(--accent); }
  .row { display: flex; justify-content: space-between; padding: .15rem 0; }
  .score { font-weight: 600; }
  .star { border: none; padding: 0; font-size: 1rem; color: var(--muted); }
  .star.on { color: #ffc107; }
  #banner { max-width: 24rem; margin: 0 auto 1rem; font-size: .8rem; color: var(--muted); text-align: center; }
  .empty { color: var(--muted); text-align: center; padding: 2rem; }
</style>
</head>
<body>
<header>
  <button id="left" onclick="move('left')">&larr;</button>
  <h1 id="title">&hellip;</h1>
  <button id="right" onclick="move('right')">&rarr;</button>
</header>
<div id="banner"></div>
<div id="list"><div class="empty">Loading&hellip;</div></div>
<script>
let timer = null;

function esc(s) {
  return String(s).replace(/[&<>"']/g, c => ({'&':'&amp;','<':'&lt;','>':'&gt;','"':'&quot;',"'":'&#39;'}[c]));
}

function card(m) {
  const label = m.status === 'live' ? 'LIVE' + (m.time ? ' ' + m.time : '') : m.status === 'upcoming' ? (m.time || '') : 'FT';
  const score = v => v === undefined || v === null ? '-' : v;
  return `<div class="card ${m.status}">
    <div class="meta"><span class="label">${esc(label)}</span>
      <button class="star ${m.favorite ? 'on' : ''}" onclick="toggle('${esc(m.id)}')">&#9733;</button></div>
    <div class="row"><span>${esc(m.homeTeam)}</span><span class="score">${score(m.homeScore)}</span></div>
    <div class="row"><span>${esc(m.awayTeam)}</span><span class="score">${score(m.awayScore)}</span></div>
  </div>`;
}

async function load() {
  const cursor = await (await fetch('/api/view')).json();
  document.getElementById('left').disabled = !cursor.canGoLeft;
  document.getElementById('right').disabled = !cursor.canGoRight;
  const data = await (await fetch('/api/matches?view=' + cursor.view)).json();
  document.getElementById('title').textContent = data.title;
  const updated = data.lastUpdated ? new Date(data.lastUpdated).toLocaleTimeString() : 'never';
  document.getElementById('banner').innerHTML = data.online
    ? `Updated ${updated}`
    : `Offline &middot; showing cached data from ${updated} <button onclick="retry()">Retry</button>`;
  const list = document.getElementById('list');
  list.innerHTML = data.matches.length ? data.matches.map(card).join('') : '<div class="empty">No matches</div>';
  clearInterval(timer);
  if (cursor.view === 'live') timer = setInterval(load, 15000);
}

async function move(dir) { await fetch('/api/view/' + dir, { method: 'POST' }); load(); }
async function toggle(id) { await fetch('/api/favorites/' + encodeURIComponent(id) + '/toggle', { method: 'POST' }); load(); }
async function retry() { await fetch('/api/refresh', { method: 'POST' }); setTimeout(load, 1500); }

load();
</script>
</body>
</html>
"#;
