//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;
use crate::ws::protocol::MatchInfo;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - comma-separated origins in CLIENT_ORIGIN, `*` for any
    let allow_origin = match state.config.allowed_origins() {
        None => AllowOrigin::any(),
        Some(origins) => AllowOrigin::list(
            origins
                .iter()
                .filter_map(|s| s.parse::<HeaderValue>().ok()),
        ),
    };

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/matches", get(matches_handler))
        .route("/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_matches: usize,
    open_matches: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_matches: state.match_registry.active_matches(),
        open_matches: state.match_registry.open_matches().len(),
    })
}

// ============================================================================
// Lobby endpoints
// ============================================================================

#[derive(Serialize)]
struct MatchesResponse {
    matches: Vec<MatchInfo>,
}

async fn matches_handler(State(state): State<AppState>) -> Json<MatchesResponse> {
    Json(MatchesResponse {
        matches: state.match_registry.open_matches(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::config::Config;

    fn state() -> AppState {
        let config = Config::from_lookup(|key| match key {
            "CLIENT_ORIGIN" => Some("http://localhost:5173".to_string()),
            _ => None,
        })
        .unwrap();
        AppState::new(config)
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_match_counts() {
        let state = state();
        state.lobby.create_match("open one");
        let (handle, _) = state.match_registry.create("soon full");
        state
            .match_registry
            .with_match(&handle.id, |game| Ok(game.join()?))
            .unwrap();

        let (status, body) = get_json(build_router(state), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["active_matches"], 2);
        assert_eq!(body["open_matches"], 1);
    }

    #[tokio::test]
    async fn matches_lists_open_lobbies() {
        let state = state();
        let grant = state.lobby.create_match("skirmish");

        let (status, body) = get_json(build_router(state), "/matches").await;
        assert_eq!(status, StatusCode::OK);
        let matches = body["matches"].as_array().unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0]["name"], "skirmish");
        assert_eq!(matches[0]["player_count"], 1);
        assert_eq!(matches[0]["match_id"], grant.seat.match_id.to_string());
    }
}
