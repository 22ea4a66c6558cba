//! Event publishing endpoint

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{ApiError, ApiResponse};
use crate::api::websocket::HubState;
use crate::types::{split_mutation_type, RealtimeMessage};

/// Body of `POST /api/events`
#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    /// `<entity>_<created|updated|deleted>`
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct PublishReceipt {
    /// Clients the event was delivered to
    pub receivers: usize,
    pub timestamp: Option<String>,
}

/// POST /api/events - Stamp and broadcast a mutation event
///
/// Unknown entities are accepted so older clients can ignore them.
pub async fn publish_event(
    State(state): State<Arc<HubState>>,
    Json(request): Json<PublishRequest>,
) -> impl IntoResponse {
    if split_mutation_type(&request.event_type).is_none() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiError::bad_request(format!(
                "event type {:?} must look like <entity>_<created|updated|deleted>",
                request.event_type
            ))),
        )
            .into_response();
    }

    let message = RealtimeMessage::new(request.event_type, request.data);
    let timestamp = message.timestamp.clone();
    let msg_type = message.msg_type.clone();
    let receivers = state.publish(message);
    info!(msg_type = %msg_type, receivers, "published realtime event");

    (
        StatusCode::ACCEPTED,
        Json(ApiResponse::new(PublishReceipt {
            receivers,
            timestamp,
        })),
    )
        .into_response()
}
