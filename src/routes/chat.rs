use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

use crate::dto::chat_dto::{
    page_count, ConversationListResponse, MessageListResponse, PaginationQuery,
    SendMessageRequest, SupportConnectQuery, SupportQueueResponse, ThreadQuery,
};
use crate::error::{Error, Result};
use crate::middleware::auth::{current_user, Claims};
use crate::websocket::ChatEvent;
use crate::AppState;

// --- WebSocket ---

/// Realtime channel. Push-only from server to client; the only client
/// frame honored is `{"type":"ping"}`.
pub async fn chat_ws(
    ws: WebSocketUpgrade,
    Path(user_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: Uuid) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let reply = tx.clone();
    let conn_id = state.connections.connect(user_id, tx);

    let (mut sink, mut stream) = socket.split();
    let mut forward = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Ok(payload) = serde_json::to_string(&event) else {
                continue;
            };
            if sink.send(WsMessage::Text(payload)).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => handle_client_frame(&reply, user_id, &text),
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = &mut forward => break,
        }
    }

    // Registry state is released on every exit path, including a failed
    // forward task.
    state.connections.disconnect(user_id, conn_id);
    forward.abort();
}

fn handle_client_frame(reply: &UnboundedSender<ChatEvent>, user_id: Uuid, text: &str) {
    let frame_type = serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(str::to_owned));

    match frame_type.as_deref() {
        Some("ping") => {
            let _ = reply.send(ChatEvent::Pong);
        }
        other => {
            debug!(%user_id, frame_type = ?other, "rejected client frame");
            let _ = reply.send(ChatEvent::Error {
                message: "Use HTTP POST /chat/messages to send messages".into(),
            });
        }
    }
}

// --- Messages & conversations ---

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let caller = current_user(&state, &claims).await?;

    let message = state
        .chat_service
        .send_message(
            &caller,
            payload.receiver_id,
            payload.text,
            payload.order_id,
            payload.item_id,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<impl IntoResponse> {
    let caller = current_user(&state, &claims).await?;
    let (page, limit) = pagination.normalize(20);

    let (conversations, total) = state
        .chat_service
        .list_conversations(&caller, page, limit)
        .await?;

    Ok(Json(ConversationListResponse {
        conversations,
        total,
        page,
        pages: page_count(total, limit),
    }))
}

pub async fn get_conversation_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(partner_id): Path<Uuid>,
    Query(query): Query<ThreadQuery>,
) -> Result<impl IntoResponse> {
    let caller = current_user(&state, &claims).await?;
    let pagination = PaginationQuery {
        page: query.page,
        limit: query.limit,
    };
    let (page, limit) = pagination.normalize(50);

    let (messages, total) = state
        .chat_service
        .get_thread(&caller, partner_id, query.order_id, page, limit)
        .await?;

    Ok(Json(MessageListResponse {
        messages,
        total,
        page,
        pages: page_count(total, limit),
    }))
}

pub async fn get_order_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let caller = current_user(&state, &claims).await?;
    let messages = state.chat_service.get_order_thread(&caller, order_id).await?;

    let total = messages.len() as i64;
    Ok(Json(MessageListResponse {
        messages,
        total,
        page: 1,
        pages: 1,
    }))
}

pub async fn mark_message_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(message_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let caller = current_user(&state, &claims).await?;
    let count = state.chat_service.mark_read(&[message_id], caller.id).await?;

    if count == 0 {
        return Err(Error::NotFound("Message not found".into()));
    }

    Ok(Json(json!({
        "message": "Message marked as read",
        "count": count,
    })))
}

// --- Support ---

pub async fn connect_to_support(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<SupportConnectQuery>,
) -> Result<impl IntoResponse> {
    let _caller = current_user(&state, &claims).await?;
    let response = state.chat_service.connect_to_support(query.order_id).await?;
    Ok(Json(response))
}

pub async fn support_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<impl IntoResponse> {
    let caller = current_user(&state, &claims).await?;
    let (page, limit) = pagination.normalize(50);

    let (conversations, total) = state
        .chat_service
        .support_queue(&caller, page, limit)
        .await?;

    Ok(Json(SupportQueueResponse {
        conversations,
        total,
        page,
        limit,
    }))
}

pub async fn support_status(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let status = state.chat_service.support_status().await?;
    Ok(Json(status))
}

pub async fn resolve_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(partner_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let caller = current_user(&state, &claims).await?;
    let count = state
        .chat_service
        .resolve_conversation(&caller, partner_id)
        .await?;

    Ok(Json(json!({
        "message": "Conversation resolved",
        "resolved_count": count,
    })))
}

pub async fn delete_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(partner_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let caller = current_user(&state, &claims).await?;
    let count = state
        .chat_service
        .delete_conversation(&caller, partner_id)
        .await?;

    Ok(Json(json!({
        "message": "Conversation deleted",
        "deleted_count": count,
    })))
}
