//! HTTP control API for the narration player.
//!
//! Runs on port 2010 by default. CORS-permissive so a browser front-end on
//! another local port can drive it.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use studycast_core::types::{NarrationStatus, VoiceCatalog};

use crate::player::NarrationPlayer;

/// Build the axum router with a shared [`NarrationPlayer`].
pub fn router(player: NarrationPlayer) -> Router {
    Router::new()
        .route("/script", post(load_script))
        .route("/play", post(play))
        .route("/pause", post(pause))
        .route("/toggle", post(toggle))
        .route("/seek", post(seek))
        .route("/voice/next", post(next_voice))
        .route("/status", get(status))
        .route("/voices", get(voices))
        .layer(CorsLayer::permissive())
        .with_state(player)
}

#[derive(serde::Deserialize)]
struct ScriptRequest {
    script: String,
}

#[derive(serde::Deserialize)]
struct SeekRequest {
    percent: f32,
}

#[derive(serde::Serialize)]
struct OkResponse {
    ok: bool,
}

const OK: Json<OkResponse> = Json(OkResponse { ok: true });

async fn load_script(
    State(player): State<NarrationPlayer>,
    Json(req): Json<ScriptRequest>,
) -> Json<OkResponse> {
    player.load_script(&req.script);
    OK
}

async fn play(State(player): State<NarrationPlayer>) -> Json<OkResponse> {
    player.play();
    OK
}

async fn pause(State(player): State<NarrationPlayer>) -> Json<OkResponse> {
    player.pause();
    OK
}

async fn toggle(State(player): State<NarrationPlayer>) -> Json<OkResponse> {
    player.toggle();
    OK
}

async fn seek(
    State(player): State<NarrationPlayer>,
    Json(req): Json<SeekRequest>,
) -> Json<OkResponse> {
    player.seek(req.percent);
    OK
}

async fn next_voice(State(player): State<NarrationPlayer>) -> Json<OkResponse> {
    player.cycle_voice();
    OK
}

async fn status(State(player): State<NarrationPlayer>) -> Json<NarrationStatus> {
    Json(player.status())
}

async fn voices(State(player): State<NarrationPlayer>) -> Json<VoiceCatalog> {
    Json(player.voices())
}
