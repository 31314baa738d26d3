//! REST API - Chat endpoints

use std::sync::Arc;
use axum::{
    Router,
    routing::post,
    extract::{Extension, Path, Query, Json},
    http::{StatusCode, HeaderMap},
};
use serde::Deserialize;

use crate::message::{DeleteError, EditError, MessageRouter, PostError, StoredMessage};
use crate::presence::{HeartbeatError, Participant, PresenceManager, RegisterError};
use crate::validation::sanitize_field;
use super::middleware::identity;

pub fn routes() -> Router {
    Router::new()
        .route("/participants", post(register_participant).get(list_participants))
        .route("/messages", post(post_message).get(list_messages))
        .route("/messages/:id", axum::routing::put(edit_message).delete(delete_message))
        .route("/status", post(heartbeat))
}

async fn register_participant(
    Extension(presence): Extension<Arc<PresenceManager>>,
    Json(body): Json<serde_json::Value>,
) -> Result<StatusCode, (StatusCode, String)> {
    let name = match body.get("name").and_then(|v| v.as_str()) {
        Some(n) => n,
        None => {
            return Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                "name must be a string".to_string(),
            ))
        }
    };

    match presence.register(name).await {
        Ok(()) => Ok(StatusCode::CREATED),
        Err(RegisterError::Invalid) => {
            Err((StatusCode::UNPROCESSABLE_ENTITY, "invalid name".to_string()))
        }
        Err(RegisterError::Conflict) => {
            Err((StatusCode::CONFLICT, "name already taken".to_string()))
        }
        Err(RegisterError::Store(e)) => Err((StatusCode::INTERNAL_SERVER_ERROR, e)),
    }
}

async fn list_participants(
    Extension(presence): Extension<Arc<PresenceManager>>,
) -> Result<Json<Vec<Participant>>, (StatusCode, String)> {
    let participants = presence
        .list_active()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e))?;
    Ok(Json(participants))
}

#[derive(Deserialize)]
struct MessageBody {
    to: Option<serde_json::Value>,
    text: Option<serde_json::Value>,
    #[serde(rename = "type")]
    kind: Option<serde_json::Value>,
}

/// Pull sanitized (to, text, type) out of a message body, or fail 422.
fn message_fields(body: &MessageBody) -> Result<(String, String, String), (StatusCode, String)> {
    let invalid = || {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            "to, text, and type must be strings".to_string(),
        )
    };
    let to = sanitize_field(body.to.as_ref()).ok_or_else(invalid)?;
    let text = sanitize_field(body.text.as_ref()).ok_or_else(invalid)?;
    let kind = match body.kind.as_ref() {
        Some(serde_json::Value::String(s)) => s.clone(),
        _ => return Err(invalid()),
    };
    Ok((to, text, kind))
}

async fn post_message(
    headers: HeaderMap,
    Extension(messages): Extension<Arc<MessageRouter>>,
    Json(body): Json<MessageBody>,
) -> Result<StatusCode, (StatusCode, String)> {
    let from = identity(&headers);
    let (to, text, kind) = message_fields(&body)?;

    match messages
        .post_message(from.as_deref(), &to, &text, &kind)
        .await
    {
        Ok(_id) => Ok(StatusCode::CREATED),
        Err(PostError::Invalid) => Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid message".to_string(),
        )),
        Err(PostError::UnknownSender) => Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "sender is not a participant".to_string(),
        )),
        Err(PostError::Store(e)) => Err((StatusCode::INTERNAL_SERVER_ERROR, e)),
    }
}

#[derive(Deserialize)]
struct ListParams {
    limit: Option<String>,
}

async fn list_messages(
    headers: HeaderMap,
    Query(params): Query<ListParams>,
    Extension(messages): Extension<Arc<MessageRouter>>,
) -> Result<Json<Vec<StoredMessage>>, (StatusCode, String)> {
    let limit = match params.limit {
        Some(raw) => match raw.parse::<usize>() {
            Ok(n) if n > 0 => Some(n),
            _ => {
                return Err((
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "limit must be a positive integer".to_string(),
                ))
            }
        },
        None => None,
    };

    let viewer = identity(&headers);
    let visible = messages
        .list_visible(viewer.as_deref(), limit)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e))?;
    Ok(Json(visible))
}

async fn heartbeat(
    headers: HeaderMap,
    Extension(presence): Extension<Arc<PresenceManager>>,
) -> Result<StatusCode, (StatusCode, String)> {
    let name = identity(&headers);
    match presence.heartbeat(name.as_deref()).await {
        Ok(()) => Ok(StatusCode::OK),
        Err(HeartbeatError::Unidentified) => Err((
            StatusCode::NOT_FOUND,
            "no identity supplied".to_string(),
        )),
        Err(HeartbeatError::NotFound) => Err((
            StatusCode::NOT_FOUND,
            "participant not found".to_string(),
        )),
        Err(HeartbeatError::Store(e)) => Err((StatusCode::INTERNAL_SERVER_ERROR, e)),
    }
}

async fn edit_message(
    Path(id): Path<String>,
    headers: HeaderMap,
    Extension(messages): Extension<Arc<MessageRouter>>,
    Json(body): Json<MessageBody>,
) -> Result<StatusCode, (StatusCode, String)> {
    let editor = identity(&headers);
    let (to, text, kind) = message_fields(&body)?;

    match messages
        .edit_message(&id, editor.as_deref(), &to, &text, &kind)
        .await
    {
        Ok(()) => Ok(StatusCode::OK),
        Err(EditError::Invalid) => Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid message".to_string(),
        )),
        Err(EditError::NotFound) => {
            Err((StatusCode::NOT_FOUND, "message not found".to_string()))
        }
        Err(EditError::Forbidden) => Err((
            StatusCode::UNAUTHORIZED,
            "not the message author".to_string(),
        )),
        Err(EditError::Store(e)) => Err((StatusCode::INTERNAL_SERVER_ERROR, e)),
    }
}

async fn delete_message(
    Path(id): Path<String>,
    headers: HeaderMap,
    Extension(messages): Extension<Arc<MessageRouter>>,
) -> Result<StatusCode, (StatusCode, String)> {
    let requester = identity(&headers);
    match messages.delete_message(&id, requester.as_deref()).await {
        Ok(()) => Ok(StatusCode::OK),
        Err(DeleteError::NotFound) => {
            Err((StatusCode::NOT_FOUND, "message not found".to_string()))
        }
        Err(DeleteError::Forbidden) => Err((
            StatusCode::UNAUTHORIZED,
            "not the message author".to_string(),
        )),
        Err(DeleteError::Store(e)) => Err((StatusCode::INTERNAL_SERVER_ERROR, e)),
    }
}
