use std::pin::pin;

use axum::Json;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;

use crate::graph::{ExecEvent, PipelineError};
use crate::model::PlanState;

use super::auth::OptionalClaims;
use super::error::ApiError;
use super::state::AppState;
use super::types::{
    DEFAULT_EXECUTION_SUMMARY, PlanRequest, PlanResponse, VoiceSynthRequest, WsPlanRequest,
    WsServerMessage, node_label,
};

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

// ── POST /plan ──────────────────────────────────────────────────────

pub async fn create_plan(
    State(state): State<AppState>,
    OptionalClaims(claims): OptionalClaims,
    Json(req): Json<PlanRequest>,
) -> Result<Json<PlanResponse>, ApiError> {
    let request_id = uuid::Uuid::new_v4();
    tracing::info!(%request_id, prompt = %req.prompt, "pipeline starting");

    let mut plan_state = PlanState::new(req.prompt.clone());
    plan_state.parsed_intent = req.seeded_intent();
    plan_state.member_locations = req.member_locations.clone().unwrap_or_default();
    plan_state.chat_history = req.chat_history.clone();
    plan_state.user_profile = claims;

    let final_state = state.executor.invoke(plan_state).await.map_err(|e| {
        tracing::error!(%request_id, error = %e, "pipeline failed");
        match e {
            PipelineError::DeadlineExceeded(_) => {
                ApiError::Timeout("Pipeline timed out — please try again.".to_string())
            }
            _ => ApiError::Internal("Pipeline failed — please try again.".to_string()),
        }
    })?;

    tracing::info!(
        %request_id,
        venues = final_state.ranked_results.len(),
        "pipeline complete"
    );
    Ok(Json(PlanResponse {
        venues: final_state.ranked_results,
        execution_summary: final_state
            .execution_summary
            .unwrap_or_else(|| DEFAULT_EXECUTION_SUMMARY.to_string()),
    }))
}

// ── GET /ws/plan ────────────────────────────────────────────────────

pub async fn ws_plan(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_plan_socket(state, socket))
}

async fn handle_plan_socket(state: AppState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();

    // The client sends exactly one JSON request message.
    let req: WsPlanRequest = loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str(&text) {
                Ok(req) => break req,
                Err(e) => {
                    tracing::warn!(error = %e, "ws request was not valid JSON");
                    let _ = send_frame(
                        &mut sender,
                        &WsServerMessage::Error {
                            message: "Invalid request.".to_string(),
                        },
                    )
                    .await;
                    let _ = sender.close().await;
                    return;
                }
            },
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            _ => return,
        }
    };
    tracing::info!(prompt = %req.prompt, "ws pipeline starting");

    let mut plan_state = PlanState::new(req.prompt);
    plan_state.member_locations = req.member_locations;

    // The run is driven on its own task; dropping/aborting it cancels the
    // in-flight node cooperatively when the client goes away.
    let stream = state.executor.stream(plan_state);
    let (tx, mut rx) = mpsc::channel::<ExecEvent>(16);
    let run = tokio::spawn(async move {
        let mut stream = pin!(stream);
        while let Some(event) = stream.next().await {
            if tx.send(event).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(ExecEvent::NodeCompleted { node, .. }) => {
                    let frame = WsServerMessage::Progress {
                        node: node.as_str().to_string(),
                        label: node_label(node).to_string(),
                    };
                    if send_frame(&mut sender, &frame).await.is_err() {
                        run.abort();
                        break;
                    }
                }
                Some(ExecEvent::Finished { state: final_state }) => {
                    let data = PlanResponse {
                        venues: final_state.ranked_results,
                        execution_summary: final_state
                            .execution_summary
                            .unwrap_or_else(|| DEFAULT_EXECUTION_SUMMARY.to_string()),
                    };
                    tracing::info!(venues = data.venues.len(), "ws pipeline complete");
                    let _ = send_frame(&mut sender, &WsServerMessage::Result { data }).await;
                    break;
                }
                Some(ExecEvent::Failed { error }) => {
                    let message = match error {
                        PipelineError::DeadlineExceeded(_) => {
                            "Pipeline timed out — please try a simpler query."
                        }
                        _ => "An internal error occurred. Please try again.",
                    };
                    let _ = send_frame(
                        &mut sender,
                        &WsServerMessage::Error {
                            message: message.to_string(),
                        },
                    )
                    .await;
                    break;
                }
                None => break,
            },
            msg = watch_disconnect(&mut receiver) => {
                if msg {
                    tracing::info!("ws client disconnected, cancelling run");
                    run.abort();
                    break;
                }
            }
        }
    }

    let _ = sender.close().await;
}

/// Resolve `true` when the client has gone away. Other inbound frames are
/// ignored — the protocol has exactly one client message.
async fn watch_disconnect(receiver: &mut SplitStream<WebSocket>) -> bool {
    loop {
        match receiver.next().await {
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return true,
            Some(Ok(_)) => {}
        }
    }
}

async fn send_frame(
    sender: &mut SplitSink<WebSocket, Message>,
    frame: &WsServerMessage,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(frame).unwrap_or_default();
    sender.send(Message::Text(text.into())).await
}

// ── POST /voice/synthesize ──────────────────────────────────────────

pub async fn synthesize_voice(
    State(state): State<AppState>,
    Json(req): Json<VoiceSynthRequest>,
) -> Response {
    match state
        .services
        .tts
        .synthesize(&req.text, req.voice_id.as_deref())
        .await
    {
        Ok(Some(audio)) => (
            [
                (header::CONTENT_TYPE, "audio/mpeg"),
                (header::CONTENT_DISPOSITION, "inline; filename=speech.mp3"),
            ],
            audio,
        )
            .into_response(),
        Ok(None) => Json(json!({ "error": "Voice synthesis unavailable." })).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "voice synthesis failed");
            Json(json!({ "error": "Voice synthesis unavailable." })).into_response()
        }
    }
}
