//! Duel server routes. Matches are played over `/ws`; the HTTP side only
//! exposes read-only lobby data and a sample challenge.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Routes:
/// - `GET /ws`: one duel per connection (`start_match`, `submit_answer`, `next_round`, `leave`)
/// - `GET /api/v1/health`
/// - `GET /api/v1/catalog`: difficulties with their base clock, and the topic list
/// - `GET /api/v1/challenge?difficulty=&topic=`: one challenge, answer withheld
///
/// Anything else falls through to the host UI in `./static`. Every request
/// gets a span from the trace layer; CORS is open.
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        .route("/ws", get(ws::ws_upgrade))
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/catalog", get(http::http_get_catalog))
        .route("/api/v1/challenge", get(http::http_get_challenge))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .fallback_service(static_service)
}
