//! HTTP handlers for the console routes

use axum::{
    extract::{Form, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use queuedeck_core::QueueMessage;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::pages::{self, IndexView};
use crate::session::{Flash, Session};
use crate::state::ConsoleState;

/// Shown when pop-next finds the queue empty
pub const NO_MORE_MESSAGES: &str = "No more messages";

#[derive(Debug, Deserialize)]
pub struct AddMessageForm {
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeQueueForm {
    pub queue_name: Option<String>,
}

/// The `{id, content}` pair the JSON endpoints expose
#[derive(Debug, Serialize)]
pub struct MessageView<'a> {
    pub id: &'a str,
    pub content: &'a str,
}

impl<'a> From<&'a QueueMessage> for MessageView<'a> {
    fn from(message: &'a QueueMessage) -> Self {
        Self {
            id: &message.id,
            content: &message.content,
        }
    }
}

// === Response helpers ===

fn with_session(state: &ConsoleState, session: &Session, response: impl IntoResponse) -> Response {
    (
        [(header::SET_COOKIE, state.sessions.set_cookie(session))],
        response,
    )
        .into_response()
}

fn redirect_home(state: &ConsoleState, session: &Session) -> Response {
    with_session(state, session, Redirect::to("/"))
}

fn json_error(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
        .into_response()
}

fn non_empty(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.is_empty())
}

// === Pages ===

/// `GET /`: list the first visible messages of the session's queue
pub async fn index(State(state): State<Arc<ConsoleState>>, headers: HeaderMap) -> Response {
    let mut session = state.sessions.load(&headers);
    let queue = state.queue_for(&session);
    let mut flashes = session.take_flashes();

    let messages = match queue.peek().await {
        Ok(messages) => messages,
        Err(e) => {
            error!(queue = %queue.name(), error = %e, "Failed to peek messages");
            flashes.push(Flash::error(format!("Error: {e}")));
            Vec::new()
        }
    };

    let queues = match queue.list_queues().await {
        Ok(queues) => queues,
        Err(e) => {
            warn!(error = %e, "Failed to list queues");
            Vec::new()
        }
    };

    let html = pages::index_page(&IndexView {
        current_queue: queue.name(),
        queues: &queues,
        messages: &messages,
        flashes: &flashes,
    });

    with_session(&state, &session, Html(html))
}

/// `GET /read`
pub async fn read_page() -> Html<String> {
    Html(pages::read_page())
}

// === JSON endpoints ===

/// `GET /refresh`: the same peek as the list view, as JSON
pub async fn refresh(State(state): State<Arc<ConsoleState>>, headers: HeaderMap) -> Response {
    let session = state.sessions.load(&headers);
    let queue = state.queue_for(&session);

    match queue.peek().await {
        Ok(messages) => {
            let messages: Vec<MessageView<'_>> = messages.iter().map(MessageView::from).collect();
            Json(json!({ "messages": messages })).into_response()
        }
        Err(e) => {
            error!(queue = %queue.name(), error = %e, "Failed to peek messages");
            json_error(e.to_string())
        }
    }
}

/// `GET /read/next`: receive one message and delete it
pub async fn read_next(State(state): State<Arc<ConsoleState>>, headers: HeaderMap) -> Response {
    let session = state.sessions.load(&headers);
    let queue = state.queue_for(&session);

    match queue.pop_next().await {
        Ok(Some(message)) => Json(json!({
            "success": true,
            "message": MessageView::from(&message),
        }))
        .into_response(),
        Ok(None) => Json(json!({
            "success": false,
            "message": NO_MORE_MESSAGES,
        }))
        .into_response(),
        Err(e) => {
            error!(queue = %queue.name(), error = %e, "Failed to read next message");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

// === Form actions ===

/// `POST /add`
pub async fn add_message(
    State(state): State<Arc<ConsoleState>>,
    headers: HeaderMap,
    Form(form): Form<AddMessageForm>,
) -> Response {
    let Some(text) = non_empty(form.message) else {
        return Redirect::to("/").into_response();
    };

    let mut session = state.sessions.load(&headers);
    let queue = state.queue_for(&session);

    match queue.send(&text).await {
        Ok(message) => {
            info!(queue = %queue.name(), message_id = %message.id, "Added message");
            session.flash(Flash::success("Message added successfully!"));
        }
        Err(e) => {
            error!(queue = %queue.name(), error = %e, "Failed to add message");
            session.flash(Flash::error(format!("Error: {e}")));
        }
    }

    redirect_home(&state, &session)
}

/// `GET /delete/:message_id`
pub async fn delete_message(
    State(state): State<Arc<ConsoleState>>,
    headers: HeaderMap,
    Path(message_id): Path<String>,
) -> Response {
    let mut session = state.sessions.load(&headers);
    let queue = state.queue_for(&session);

    match queue.delete_by_id(&message_id).await {
        Ok(true) => session.flash(Flash::success("Message deleted successfully!")),
        Ok(false) => {
            info!(queue = %queue.name(), message_id = %message_id, "Message not visible, nothing deleted");
        }
        Err(e) => {
            error!(queue = %queue.name(), message_id = %message_id, error = %e, "Failed to delete message");
            session.flash(Flash::error(format!("Error: {e}")));
        }
    }

    redirect_home(&state, &session)
}

/// `POST /change_queue`
pub async fn change_queue(
    State(state): State<Arc<ConsoleState>>,
    headers: HeaderMap,
    Form(form): Form<ChangeQueueForm>,
) -> Response {
    let Some(name) = non_empty(form.queue_name) else {
        return Redirect::to("/").into_response();
    };

    let mut session = state.sessions.load(&headers);
    session.queue = Some(name.clone());

    match state.queues.queue(name.as_str()).ensure_exists().await {
        Ok(_) => {
            info!(queue = %name, "Switched queue");
            session.flash(Flash::success(format!("Switched to queue: {name}")));
        }
        Err(e) => {
            error!(queue = %name, error = %e, "Failed to ensure queue exists");
            session.flash(Flash::error(format!("Error: {e}")));
        }
    }

    redirect_home(&state, &session)
}

// === Health ===

/// `GET /health`
pub async fn health(State(state): State<Arc<ConsoleState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "running",
        "backend": state.queues.kind(),
    }))
}
