//! HTTP router for the console

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::ConsoleState;

/// Create the console router
pub fn create_router(state: ConsoleState) -> Router {
    let shared_state = Arc::new(state);

    Router::new()
        .route("/", get(handlers::index))
        .route("/read", get(handlers::read_page))
        .route("/read/next", get(handlers::read_next))
        .route("/refresh", get(handlers::refresh))
        .route("/add", post(handlers::add_message))
        .route("/delete/:message_id", get(handlers::delete_message))
        .route("/change_queue", post(handlers::change_queue))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Flash, FlashCategory, Session, SessionKey, SESSION_COOKIE};
    use axum::{
        body::Body,
        http::{header, Request, Response, StatusCode},
    };
    use queuedeck_core::{QueueAccessor, QueueBackend};
    use queuedeck_memory::MemoryQueueService;
    use serde_json::Value;
    use tower::ServiceExt;

    const SECRET: &str = "test-secret";
    const QUEUE: &str = "myqueue";

    fn setup() -> (Arc<MemoryQueueService>, Router) {
        let storage = Arc::new(MemoryQueueService::new());
        storage.create(QUEUE).unwrap();
        let backend: Arc<dyn QueueBackend> = storage.clone();
        let state = ConsoleState::new(QueueAccessor::new(backend), QUEUE, SessionKey::new(SECRET));
        (storage, create_router(state))
    }

    fn cookie_for(session: &Session) -> String {
        format!("{}={}", SESSION_COOKIE, SessionKey::new(SECRET).encode(session))
    }

    fn session_from(response: &Response<Body>) -> Session {
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("session cookie")
            .to_str()
            .unwrap();
        let value = set_cookie
            .split(';')
            .next()
            .and_then(|pair| pair.split_once('='))
            .map(|(_, v)| v)
            .unwrap();
        SessionKey::new(SECRET).decode(value).unwrap()
    }

    async fn body_string(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response<Body>) -> Value {
        serde_json::from_str(&body_string(response).await).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn form(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (_storage, app) = setup();
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "running");
        assert_eq!(body["backend"], "memory");
    }

    #[tokio::test]
    async fn test_index_lists_messages() {
        let (storage, app) = setup();
        storage.send(QUEUE, "<hello>").unwrap();

        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(header::SET_COOKIE));

        let html = body_string(response).await;
        assert!(html.contains("&lt;hello&gt;"));
        assert!(html.contains(r#"<span id="current-queue">myqueue</span>"#));
    }

    #[tokio::test]
    async fn test_index_renders_flashes_once() {
        let (_storage, app) = setup();
        let mut session = Session::default();
        session.flash(Flash::success("Message added successfully!"));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::COOKIE, cookie_for(&session))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(session_from(&response).flashes.is_empty());
        let html = body_string(response).await;
        assert!(html.contains(r#"<div class="flash success">Message added successfully!</div>"#));
    }

    #[tokio::test]
    async fn test_index_backend_error_shows_notice() {
        let (_storage, app) = setup();
        let session = Session {
            queue: Some("missing".to_string()),
            flashes: vec![],
        };

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::COOKIE, cookie_for(&session))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_string(response).await;
        assert!(html.contains(r#"<div class="flash error">Error: "#));
        assert!(html.contains("No messages"));
    }

    #[tokio::test]
    async fn test_refresh_returns_messages() {
        let (storage, app) = setup();
        let sent = storage.send(QUEUE, "hello").unwrap();

        let response = app.oneshot(get("/refresh")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["messages"][0]["id"], sent.id.as_str());
        assert_eq!(body["messages"][0]["content"], "hello");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_error_is_500() {
        let (storage, app) = setup();
        let session = Session {
            queue: Some("nowhere".to_string()),
            flashes: vec![],
        };
        assert!(!storage.exists("nowhere"));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/refresh")
                    .header(header::COOKIE, cookie_for(&session))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_read_next_pops_then_reports_empty() {
        let (storage, app) = setup();
        let sent = storage.send(QUEUE, "only").unwrap();

        let response = app.clone().oneshot(get("/read/next")).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"]["id"], sent.id.as_str());
        assert_eq!(body["message"]["content"], "only");

        let response = app.oneshot(get("/read/next")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "No more messages");
    }

    #[tokio::test]
    async fn test_read_page() {
        let (_storage, app) = setup();
        let response = app.oneshot(get("/read")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("/read/next"));
    }

    #[tokio::test]
    async fn test_add_message() {
        let (storage, app) = setup();

        let response = app
            .oneshot(form("/add", "message=hello+%26+goodbye"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");

        let session = session_from(&response);
        assert_eq!(session.flashes, vec![Flash::success("Message added successfully!")]);

        let messages = storage.peek(QUEUE, 32).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "hello & goodbye");
    }

    #[tokio::test]
    async fn test_add_empty_message_is_noop() {
        let (storage, app) = setup();

        for body in ["message=", ""] {
            let response = app.clone().oneshot(form("/add", body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert!(!response.headers().contains_key(header::SET_COOKIE));
        }
        assert!(storage.peek(QUEUE, 32).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_message() {
        let (storage, app) = setup();
        let keep = storage.send(QUEUE, "keep").unwrap();
        let target = storage.send(QUEUE, "target").unwrap();

        let response = app
            .oneshot(get(&crate::pages::delete_href(&target.id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(session_from(&response).flashes[0].category, FlashCategory::Success);

        let remaining: Vec<String> = storage
            .peek(QUEUE, 32)
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(remaining, vec![keep.id]);
    }

    #[tokio::test]
    async fn test_delete_unknown_message_is_silent() {
        let (storage, app) = setup();
        storage.send(QUEUE, "keep").unwrap();

        let response = app.oneshot(get("/delete/not-a-message")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(session_from(&response).flashes.is_empty());
        assert_eq!(storage.peek(QUEUE, 32).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_change_queue_creates_and_selects() {
        let (storage, app) = setup();

        let response = app
            .clone()
            .oneshot(form("/change_queue", "queue_name=orders"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(storage.exists("orders"));

        let session = session_from(&response);
        assert_eq!(session.queue.as_deref(), Some("orders"));
        assert_eq!(session.flashes, vec![Flash::success("Switched to queue: orders")]);

        // Later requests with that cookie target the new queue
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/add")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .header(header::COOKIE, cookie_for(&session))
                    .body(Body::from("message=for-orders"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(storage.peek("orders", 32).unwrap()[0].content, "for-orders");
        assert!(storage.peek(QUEUE, 32).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_change_queue_invalid_name_flashes_error() {
        let (storage, app) = setup();

        let response = app
            .oneshot(form("/change_queue", "queue_name=Bad_Name"))
            .await
            .unwrap();
        let session = session_from(&response);
        assert_eq!(session.queue.as_deref(), Some("Bad_Name"));
        assert_eq!(session.flashes[0].category, FlashCategory::Error);
        assert!(!storage.exists("Bad_Name"));
    }

    #[tokio::test]
    async fn test_change_queue_empty_is_noop() {
        let (_storage, app) = setup();
        let response = app
            .oneshot(form("/change_queue", "queue_name="))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(!response.headers().contains_key(header::SET_COOKIE));
    }

    #[tokio::test]
    async fn test_tampered_cookie_uses_default_queue() {
        let (storage, app) = setup();
        storage.send(QUEUE, "default").unwrap();

        let forged = format!(
            "{}={}",
            SESSION_COOKIE,
            SessionKey::new("wrong-secret").encode(&Session {
                queue: Some("elsewhere".to_string()),
                flashes: vec![],
            })
        );
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/refresh")
                    .header(header::COOKIE, forged)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(response).await["messages"][0]["content"], "default");
    }
}
