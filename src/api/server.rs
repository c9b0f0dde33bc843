//! API Server module
//!
//! HTTP surface over the session service: JSON endpoints under /api, a small
//! server-rendered garden UI under /ui, and an SSE stream for live refresh.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post, put},
    Json, Router,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::models::{Category, Core, Difficulty, SessionResponse};
use crate::service::{Service, ServiceError};

/// Request to add a task by hand
#[derive(Serialize, Deserialize)]
pub struct AddTaskRequest {
    pub text: String,
    pub category: Category,
    pub difficulty: Difficulty,
}

/// Request to toggle a task's completion state
#[derive(Serialize, Deserialize)]
pub struct ToggleTaskRequest {
    pub id: String,
}

/// Request to generate task suggestions
#[derive(Serialize, Deserialize)]
pub struct GenerateRequest {
    pub category: Category,
    pub mood: String,
}

/// Request to send one chat message to the coach
#[derive(Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Request to set the streak counter
#[derive(Serialize, Deserialize)]
pub struct StreakRequest {
    pub days: u32,
}

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub address: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 3000).into(),
        }
    }
}

/// API responses
#[derive(Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

fn ok_response<T: Serialize>(response: SessionResponse<T>) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(response))).into_response()
}

/// Maps service results to responses; `Busy` becomes 409 so a client can
/// tell "try again later" apart from a real failure.
fn map_service_result<T: Serialize>(result: Result<SessionResponse<T>, ServiceError>) -> Response {
    match result {
        Ok(response) => ok_response(response),
        Err(ServiceError::Busy) => (
            StatusCode::CONFLICT,
            Json(ApiResponse::<SessionResponse<T>>::error(
                "another request is already in flight".to_string(),
            )),
        )
            .into_response(),
    }
}

/// Builds the router; split from `serve` so tests can drive handlers
/// without binding a socket.
pub fn router(service: Service) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(|| async { Redirect::temporary("/ui") }))
        .route("/api/tasks", get(list_tasks_handler).post(add_task_handler))
        .route("/api/tasks/toggle", post(toggle_task_handler))
        .route("/api/generate", post(generate_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/chat", get(transcript_handler).post(chat_handler))
        .route("/api/streak", put(streak_handler))
        .route("/ui", get(ui_handler))
        .route("/ui/events", get(events_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(service)
}

/// Starts the API server
pub async fn serve(service: Service, config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let app = router(service);

    tracing::info!("Starting server on {}", config.address);
    let listener = TcpListener::bind(config.address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn list_tasks_handler(State(service): State<Service>) -> impl IntoResponse {
    ok_response(service.core().tasks())
}

async fn add_task_handler(
    State(service): State<Service>,
    Json(payload): Json<AddTaskRequest>,
) -> impl IntoResponse {
    let task = crate::models::Task::new(payload.text, payload.category, payload.difficulty);
    ok_response(service.core().add_tasks(vec![task]))
}

async fn toggle_task_handler(
    State(service): State<Service>,
    Json(payload): Json<ToggleTaskRequest>,
) -> impl IntoResponse {
    ok_response(service.core().toggle_task(&payload.id))
}

async fn generate_handler(
    State(service): State<Service>,
    Json(payload): Json<GenerateRequest>,
) -> impl IntoResponse {
    let result = service
        .request_generation(payload.category, &payload.mood)
        .await;
    map_service_result(result)
}

async fn stats_handler(State(service): State<Service>) -> impl IntoResponse {
    ok_response(service.core().stats())
}

async fn transcript_handler(State(service): State<Service>) -> impl IntoResponse {
    ok_response(service.core().transcript())
}

async fn chat_handler(
    State(service): State<Service>,
    Json(payload): Json<ChatRequest>,
) -> impl IntoResponse {
    let result = service.send_chat_message(&payload.message).await;
    map_service_result(result)
}

async fn streak_handler(
    State(service): State<Service>,
    Json(payload): Json<StreakRequest>,
) -> impl IntoResponse {
    ok_response(service.core().set_streak(payload.days))
}

// --- UI and Event Handlers --- //

async fn events_handler(State(service): State<Service>) -> impl IntoResponse {
    let core = service.core().clone();
    let receiver = core.subscribe();
    let stream = EventStream::new(core, receiver);

    let headers = [
        (
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("text/event-stream"),
        ),
        (
            axum::http::header::CACHE_CONTROL,
            axum::http::HeaderValue::from_static("no-cache"),
        ),
    ];

    (headers, axum::body::Body::from_stream(stream))
}

struct EventStream {
    core: Core,
    receiver: tokio::sync::broadcast::Receiver<()>,
}

impl EventStream {
    fn new(core: Core, receiver: tokio::sync::broadcast::Receiver<()>) -> Self {
        Self { core, receiver }
    }
}

impl Stream for EventStream {
    type Item = Result<String, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // Non-blocking poll of the broadcast channel
        match self.receiver.try_recv() {
            Ok(()) => Poll::Ready(Some(Ok("event: update\ndata: change\n\n".to_string()))),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty) => {
                // No updates available now, register the waker to be notified later
                let waker = cx.waker().clone();
                tokio::spawn(async move {
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    waker.wake();
                });
                Poll::Pending
            }
            Err(tokio::sync::broadcast::error::TryRecvError::Lagged(_)) => {
                // Missed some notifications; one refresh covers them all
                Poll::Ready(Some(Ok("event: update\ndata: change\n\n".to_string())))
            }
            Err(tokio::sync::broadcast::error::TryRecvError::Closed) => {
                // Resubscribe, and schedule a wake so the stream is polled
                // again with the fresh receiver
                self.receiver = self.core.subscribe();
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }
}

async fn ui_handler(State(service): State<Service>) -> impl IntoResponse {
    let tasks = service.core().tasks();
    let stats = tasks.stats.clone();
    let stage = tasks.garden_stage;
    let transcript = service.core().transcript().into_inner();
    Html(render_ui_template(&tasks.res, &stats, stage, &transcript))
}

fn render_ui_template(
    tasks: &[crate::models::Task],
    stats: &crate::models::UserStats,
    stage: crate::garden::GardenStage,
    transcript: &[crate::models::ChatMessage],
) -> String {
    let mut html = String::from(HTML_TEMPLATE_HEADER);

    html.push_str("<div class='garden-section'>");
    html.push_str(&format!("<h2>Garden: {}</h2>", stage.label()));
    html.push_str(&format!("<p class='garden-blurb'>{}</p>", stage.blurb()));
    html.push_str(&format!(
        "<p class='stats-line'>Level {} &middot; {} / {} XP &middot; {} day streak &middot; {} tasks done</p>",
        stats.level(),
        stats.xp(),
        stats.next_level_xp(),
        stats.streak(),
        stats.tasks_completed(),
    ));
    html.push_str("</div>");

    html.push_str("<div class='task-section'>");
    html.push_str("<h2>Micro-habits</h2>");
    if tasks.is_empty() {
        html.push_str(
            "<p>No tasks yet. Generate some with the CLI: <code>rebloom generate</code></p>",
        );
    } else {
        html.push_str("<ul class='task-list'>");
        for task in tasks {
            let class = if task.is_completed() { "completed" } else { "" };
            html.push_str(&format!(
                "<li class='{}'><span class='task-status'>{}</span><span class='task-desc'>{}</span><span class='task-meta'>{} / {}</span></li>",
                class,
                if task.is_completed() { "✓" } else { "○" },
                html_escape::encode_text(task.text()),
                task.category(),
                task.difficulty(),
            ));
        }
        html.push_str("</ul>");
    }
    html.push_str("</div>");

    html.push_str("<div class='chat-section'>");
    html.push_str("<h2>Coach</h2>");
    html.push_str("<ul class='chat-list'>");
    for message in transcript {
        html.push_str(&format!(
            "<li class='chat-{:?}'><span class='chat-ts'>{}</span>{}</li>",
            message.role(),
            message.timestamp().format("%H:%M"),
            html_escape::encode_text(message.text()),
        ));
    }
    html.push_str("</ul></div>");

    html.push_str(HTML_TEMPLATE_FOOTER);
    html
}

// HTML template header with CSS styles
const HTML_TEMPLATE_HEADER: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>ReBloom</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, Cantarell, 'Open Sans', 'Helvetica Neue', sans-serif;
            line-height: 1.6;
            color: #333;
            max-width: 900px;
            margin: 0 auto;
            padding: 20px;
            background-color: #f4faf4;
        }
        h1 {
            color: #2c5e2e;
            border-bottom: 2px solid #5cb85c;
            padding-bottom: 10px;
        }
        h2 {
            color: #3c763d;
            margin-top: 30px;
        }
        .garden-section, .task-section, .chat-section {
            background: white;
            padding: 20px;
            border-radius: 8px;
            box-shadow: 0 2px 10px rgba(0,0,0,0.08);
            margin-bottom: 20px;
        }
        .garden-blurb {
            font-style: italic;
            color: #555;
        }
        .stats-line {
            color: #3c763d;
            font-weight: bold;
        }
        .task-list, .chat-list {
            list-style-type: none;
            padding-left: 0;
        }
        .task-list li {
            display: flex;
            align-items: center;
            padding: 8px 0;
            gap: 10px;
            border-bottom: 1px solid #eee;
        }
        .task-status {
            color: #5cb85c;
            font-weight: bold;
        }
        .task-desc {
            flex-grow: 1;
        }
        .task-meta {
            color: #7f8c8d;
            font-size: 0.85em;
        }
        .completed .task-desc {
            color: #7f8c8d;
            text-decoration: line-through;
        }
        .chat-list li {
            padding: 6px 0;
        }
        .chat-Model {
            color: #2c5e2e;
        }
        .chat-ts {
            color: #7f8c8d;
            font-size: 0.8em;
            margin-right: 8px;
        }
        .reactive-status {
            font-size: 0.85em;
            color: #7f8c8d;
        }
    </style>
</head>
<body>
    <h1>ReBloom</h1>
    <p class="reactive-status" id="status-text">Waiting to connect...</p>
"#;

// HTML template footer with EventSource JavaScript for reactive refreshing
const HTML_TEMPLATE_FOOTER: &str = r#"
    <script>
        const statusText = document.getElementById('status-text');
        let eventSource;

        function connectEvents() {
            eventSource = new EventSource('/ui/events');

            eventSource.onopen = () => {
                statusText.textContent = 'Connected: listening for changes';
            };

            eventSource.addEventListener('update', () => {
                window.location.reload();
            });

            eventSource.onerror = () => {
                statusText.textContent = 'Connection lost. Reconnecting...';
                eventSource.close();
                setTimeout(connectEvents, 3000);
            };
        }

        window.addEventListener('load', connectEvents);
        window.addEventListener('beforeunload', () => {
            if (eventSource) {
                eventSource.close();
            }
        });
    </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatTurn, Session, Task};
    use crate::providers::{CoachProvider, ContentProvider, ProviderError, TaskCandidate};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt; // for `collect`
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt; // for `oneshot`

    struct StubContent;

    #[async_trait]
    impl ContentProvider for StubContent {
        async fn generate(
            &self,
            _category: Category,
            _mood: &str,
        ) -> Result<Vec<TaskCandidate>, ProviderError> {
            Ok(vec![TaskCandidate {
                text: "Step outside for a moment".to_string(),
                difficulty: "easy".to_string(),
            }])
        }
    }

    struct StubCoach;

    #[async_trait]
    impl CoachProvider for StubCoach {
        async fn converse(
            &self,
            message: &str,
            _history: &[ChatTurn],
        ) -> Result<String, ProviderError> {
            Ok(format!("I hear you: {message}"))
        }
    }

    /// Provider that announces when a call starts and blocks until released,
    /// so tests can overlap a second request with one in flight
    struct GatedContent {
        started: Arc<tokio::sync::Notify>,
        release: Arc<tokio::sync::Notify>,
    }

    #[async_trait]
    impl ContentProvider for GatedContent {
        async fn generate(
            &self,
            _category: Category,
            _mood: &str,
        ) -> Result<Vec<TaskCandidate>, ProviderError> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(vec![TaskCandidate {
                text: "Stand up and stretch".to_string(),
                difficulty: "easy".to_string(),
            }])
        }
    }

    struct GatedCoach {
        started: Arc<tokio::sync::Notify>,
        release: Arc<tokio::sync::Notify>,
    }

    #[async_trait]
    impl CoachProvider for GatedCoach {
        async fn converse(
            &self,
            _message: &str,
            _history: &[ChatTurn],
        ) -> Result<String, ProviderError> {
            self.started.notify_one();
            self.release.notified().await;
            Ok("Take your time.".to_string())
        }
    }

    fn setup_test_app() -> (Service, Router) {
        let service = Service::new(
            Core::new(Session::new()),
            Arc::new(StubContent),
            Arc::new(StubCoach),
        );
        let app = router(service.clone());
        (service, app)
    }

    async fn request_json(app: &Router, method: &str, uri: &str, body: Body) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("Content-Type", "application/json")
                    .body(body)
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_list_tasks_empty() {
        let (_service, app) = setup_test_app();

        let (status, body) = request_json(&app, "GET", "/api/tasks", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["res"], json!([]));
        assert_eq!(body["data"]["stats"]["level"], 1);
        assert_eq!(body["data"]["garden_stage"], "sprout");
    }

    #[tokio::test]
    async fn test_add_and_toggle_task() {
        let (service, app) = setup_test_app();

        let add_body = Body::from(
            json!({"text": "Water a plant", "category": "life", "difficulty": "medium"})
                .to_string(),
        );
        let (status, body) = request_json(&app, "POST", "/api/tasks", add_body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["res"], 1);

        let id = service.core().tasks().into_inner()[0].id().to_string();
        let toggle_body = Body::from(json!({"id": id}).to_string());
        let (status, body) = request_json(&app, "POST", "/api/tasks/toggle", toggle_body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["res"], true);
        assert_eq!(body["data"]["stats"]["xp"], 20);
        assert_eq!(body["data"]["stats"]["tasks_completed"], 1);
    }

    #[tokio::test]
    async fn test_toggle_unknown_id_is_silent() {
        let (_service, app) = setup_test_app();

        let toggle_body = Body::from(json!({"id": "no-such-task"}).to_string());
        let (status, body) = request_json(&app, "POST", "/api/tasks/toggle", toggle_body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["res"], Value::Null);
        assert_eq!(body["data"]["stats"]["xp"], 0);
    }

    #[tokio::test]
    async fn test_generate_adds_tasks() {
        let (service, app) = setup_test_app();

        let gen_body = Body::from(json!({"category": "health", "mood": "tired"}).to_string());
        let (status, body) = request_json(&app, "POST", "/api/generate", gen_body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["res"][0]["text"], "Step outside for a moment");

        assert_eq!(service.core().tasks().into_inner().len(), 1);
    }

    #[tokio::test]
    async fn test_chat_round_trip() {
        let (_service, app) = setup_test_app();

        let chat_body = Body::from(json!({"message": "rough day"}).to_string());
        let (status, body) = request_json(&app, "POST", "/api/chat", chat_body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["res"]["role"], "model");
        assert_eq!(body["data"]["res"]["text"], "I hear you: rough day");

        let (status, body) = request_json(&app, "GET", "/api/chat", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        // welcome + user + reply
        assert_eq!(body["data"]["res"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_streak_update() {
        let (_service, app) = setup_test_app();

        let streak_body = Body::from(json!({"days": 4}).to_string());
        let (status, body) = request_json(&app, "PUT", "/api/streak", streak_body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["stats"]["streak"], 4);
    }

    #[tokio::test]
    async fn test_stats_endpoint_reports_garden_stage() {
        let (service, app) = setup_test_app();

        // Enough completions to pass level 3
        for _ in 0..11 {
            let task = Task::new("quick win".to_string(), Category::Study, Difficulty::Hard);
            let id = task.id().to_string();
            service.core().add_tasks(vec![task]);
            service.core().toggle_task(&id);
        }

        let (status, body) = request_json(&app, "GET", "/api/stats", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["stats"]["level"].as_u64().unwrap() >= 3);
        assert_eq!(body["data"]["garden_stage"], "flower");
    }

    #[tokio::test]
    async fn test_ui_renders_tasks_escaped() {
        let (service, app) = setup_test_app();
        service.core().add_tasks(vec![Task::new(
            "<script>alert(1)</script>".to_string(),
            Category::Life,
            Difficulty::Easy,
        )]);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/ui").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8_lossy(&body_bytes);
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>alert(1)</script>"));
    }

    #[tokio::test]
    async fn test_concurrent_generate_returns_conflict() {
        let started = Arc::new(tokio::sync::Notify::new());
        let release = Arc::new(tokio::sync::Notify::new());
        let service = Service::new(
            Core::new(Session::new()),
            Arc::new(GatedContent {
                started: started.clone(),
                release: release.clone(),
            }),
            Arc::new(StubCoach),
        );
        let app = router(service.clone());

        let first = tokio::spawn({
            let app = app.clone();
            async move {
                let body =
                    Body::from(json!({"category": "health", "mood": "tired"}).to_string());
                request_json(&app, "POST", "/api/generate", body).await
            }
        });

        // Wait until the first request is inside the provider call
        started.notified().await;

        let body = Body::from(json!({"category": "health", "mood": "tired"}).to_string());
        let (status, value) = request_json(&app, "POST", "/api/generate", body).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(value["success"], false);

        // The rejected request must not have touched the store
        let (_, tasks) = request_json(&app, "GET", "/api/tasks", Body::empty()).await;
        assert_eq!(tasks["data"]["res"], json!([]));

        release.notify_one();
        let (status, _) = first.await.unwrap();
        assert_eq!(status, StatusCode::OK);

        // Only the first request's task landed
        let (_, tasks) = request_json(&app, "GET", "/api/tasks", Body::empty()).await;
        assert_eq!(tasks["data"]["res"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_chat_returns_conflict() {
        let started = Arc::new(tokio::sync::Notify::new());
        let release = Arc::new(tokio::sync::Notify::new());
        let service = Service::new(
            Core::new(Session::new()),
            Arc::new(StubContent),
            Arc::new(GatedCoach {
                started: started.clone(),
                release: release.clone(),
            }),
        );
        let app = router(service.clone());

        let first = tokio::spawn({
            let app = app.clone();
            async move {
                let body = Body::from(json!({"message": "long week"}).to_string());
                request_json(&app, "POST", "/api/chat", body).await
            }
        });

        started.notified().await;

        let body = Body::from(json!({"message": "hello again"}).to_string());
        let (status, value) = request_json(&app, "POST", "/api/chat", body).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(value["success"], false);

        // welcome + the first request's user message, nothing from the rejected one
        let (_, chat) = request_json(&app, "GET", "/api/chat", Body::empty()).await;
        assert_eq!(chat["data"]["res"].as_array().unwrap().len(), 2);

        release.notify_one();
        let (status, _) = first.await.unwrap();
        assert_eq!(status, StatusCode::OK);

        let (_, chat) = request_json(&app, "GET", "/api/chat", Body::empty()).await;
        let transcript = chat["data"]["res"].as_array().unwrap();
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[2]["text"], "Take your time.");
    }

    #[tokio::test]
    async fn test_event_stream_wakes_after_channel_close() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::task::{Wake, Waker};

        struct CountingWaker(AtomicUsize);

        impl Wake for CountingWaker {
            fn wake(self: Arc<Self>) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
            fn wake_by_ref(self: &Arc<Self>) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let core = Core::new(Session::new());

        // Receiver whose sender is gone, so the first poll sees Closed
        let (dead_tx, dead_rx) = tokio::sync::broadcast::channel::<()>(1);
        drop(dead_tx);

        let counter = Arc::new(CountingWaker(AtomicUsize::new(0)));
        let waker = Waker::from(counter.clone());
        let mut cx = Context::from_waker(&waker);

        let mut stream = EventStream::new(core.clone(), dead_rx);
        assert!(matches!(
            Pin::new(&mut stream).poll_next(&mut cx),
            Poll::Pending
        ));
        // A wake must be scheduled, or the stream would never be polled again
        assert!(counter.0.load(Ordering::SeqCst) >= 1);

        // The stream resubscribed to the live channel and now sees updates
        core.add_tasks(vec![Task::new(
            "stretch".to_string(),
            Category::Life,
            Difficulty::Easy,
        )]);
        match Pin::new(&mut stream).poll_next(&mut cx) {
            Poll::Ready(Some(Ok(event))) => assert!(event.contains("update")),
            other => panic!("expected an update event, got {other:?}"),
        }
    }
}
