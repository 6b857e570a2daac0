//! HTTP endpoint handlers. These are thin wrappers around the domain and the challenge source.

use std::sync::Arc;

use axum::{extract::{Query, State}, http::StatusCode, response::IntoResponse, Json};
use tracing::{info, instrument};

use crate::clock::base_duration;
use crate::domain::{Difficulty, MatchConfig, RANDOM_MIX, TOPICS};
use crate::protocol::*;
use crate::source::fetch_or_fallback;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info")]
pub async fn http_get_catalog() -> impl IntoResponse {
  let difficulties = Difficulty::ALL
    .iter()
    .map(|d| DifficultyOut { name: *d, base_duration_ms: base_duration(*d).as_millis() as u64 })
    .collect();
  Json(CatalogOut { difficulties, topics: TOPICS.to_vec(), random_topic: RANDOM_MIX })
}

/// One challenge through the same source-with-fallback path a round uses; answer withheld.
#[instrument(level = "info", skip(state), fields(difficulty = ?q.difficulty, topic = ?q.topic))]
pub async fn http_get_challenge(
  State(state): State<Arc<AppState>>,
  Query(q): Query<ChallengeQuery>,
) -> axum::response::Response {
  let difficulty = q.difficulty.unwrap_or(Difficulty::Novice);
  let cfg = match MatchConfig::new(difficulty, q.topic.as_deref().unwrap_or(RANDOM_MIX)) {
    Ok(cfg) => cfg,
    Err(e) => return (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": e.to_string() }))).into_response(),
  };
  let ch = fetch_or_fallback(state.as_ref(), cfg.difficulty, cfg.topic_filter(), state.settings.fetch_timeout()).await;
  info!(target: "challenge", %difficulty, id = %ch.id, origin = ?ch.origin, "HTTP challenge served");
  Json(to_out(&ch, false)).into_response()
}
