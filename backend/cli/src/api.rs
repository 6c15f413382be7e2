use std::sync::Arc;

use axum::{
    extract::{
        rejection::JsonRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use futures::stream::StreamExt;
use serde_json::{json, Value};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, warn};

use cmdhub_core::{DispatchResult, InboundEvent};
use cmdhub_dispatch::CommandProcessor;
use cmdhub_infra::BroadcastPublisher;

/// Shared application state for API handlers.
pub struct AppState {
    pub processor: Arc<CommandProcessor>,
    pub outbound: Arc<BroadcastPublisher>,
}

/// Build the Axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/v1/events", post(post_event))
        .route("/api/v1/responses/:session_id", get(get_response))
        .route("/api/v1/outbound/ws", get(ws_handler))
        .with_state(state)
}

/// Platform adapters post normalized events here; the result is always 200.
async fn post_event(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<InboundEvent>, JsonRejection>,
) -> Json<DispatchResult> {
    match payload {
        Ok(Json(event)) => Json(state.processor.process_event(event).await),
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Unreadable inbound event");
            Json(DispatchResult::failed(
                None,
                format!("invalid event: {}", rejection.body_text()),
            ))
        }
    }
}

async fn get_response(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match state.processor.get_response(&session_id).await {
        Some(response) => Ok(Json(response)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "error": "response not found"})),
        )),
    }
}

/// Streams outbound events to platform action wrappers.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let mut stream = BroadcastStream::new(state.outbound.subscribe());

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(event) => {
                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(error = %e, "Failed to serialize outbound event");
                        continue;
                    }
                };
                if socket.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "Outbound subscriber lagged; events dropped");
            }
        }
    }
    debug!("Outbound websocket closed");
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "cmdhub",
        "version": env!("CARGO_PKG_VERSION"),
        "pending_tasks": state.processor.pending_tasks(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdhub_config::{CommandRow, HubConfig};
    use cmdhub_core::CommandInfo;
    use tokio::net::TcpListener;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(module_url: &str) -> HubConfig {
        let mut config = HubConfig::default();
        config.dispatch.module_timeout_secs = 2;
        config.dispatch.backoff_base_ms = 10;
        config.directory.entities.insert("disc-1".into(), "community-1".into());
        config.directory.commands.push(CommandRow {
            community_id: None,
            info: CommandInfo {
                command: "!so".into(),
                module_name: "shoutout".into(),
                module_url: module_url.into(),
                is_enabled: true,
                cooldown_seconds: 0,
            },
        });
        config
    }

    async fn spawn_app(config: &HubConfig) -> (String, Arc<AppState>) {
        let outbound = Arc::new(BroadcastPublisher::default());
        let processor = CommandProcessor::builder(config).publisher(outbound.clone()).build();
        let state = Arc::new(AppState {
            processor: Arc::new(processor),
            outbound,
        });
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = build_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), state)
    }

    #[tokio::test]
    async fn health_reports_service() {
        let (base, _) = spawn_app(&HubConfig::default()).await;
        let body: Value = reqwest::get(format!("{base}/api/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "cmdhub");
        assert_eq!(body["pending_tasks"], 0);
    }

    #[tokio::test]
    async fn command_round_trip_through_http() {
        let module = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/execute"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "go follow bob"})))
            .expect(1)
            .mount(&module)
            .await;
        let (base, state) = spawn_app(&config(&module.uri())).await;
        let mut outbound = state.outbound.subscribe();

        let client = reqwest::Client::new();
        let resp = client
            .post(format!("{base}/api/v1/events"))
            .json(&json!({
                "entity_id": "disc-1",
                "user_id": "user-1",
                "username": "alice",
                "platform": "discord",
                "channel_id": "chan-1",
                "message": "!so @bob",
                "message_type": "chatMessage",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["success"], true, "{body}");
        assert_eq!(body["kind"], "command");
        assert_eq!(body["module"], "shoutout");
        let session_id = body["session_id"].as_str().unwrap().to_string();

        let stored: Value = client
            .get(format!("{base}/api/v1/responses/{session_id}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(stored, json!({"text": "go follow bob"}));

        let event = tokio::time::timeout(std::time::Duration::from_secs(2), outbound.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.session_id, session_id);
        assert_eq!(event.channel_id, "chan-1");
    }

    #[tokio::test]
    async fn missing_entity_is_a_refusal_not_an_http_error() {
        let (base, _) = spawn_app(&HubConfig::default()).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/api/v1/events"))
            .json(&json!({"message": "!so", "message_type": "chatMessage"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "entity_id is required");
    }

    #[tokio::test]
    async fn mistyped_metadata_still_gets_a_result() {
        let (base, _) = spawn_app(&HubConfig::default()).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/api/v1/events"))
            .json(&json!({
                "entity_id": "twitch-1",
                "message_type": "cheer",
                "metadata": {"tier": 1000, "amount": "500", "viewers": -1, "translation": "es"},
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert!(body["success"].is_boolean(), "{body}");
        assert!(body["session_id"].is_string(), "{body}");
    }

    #[tokio::test]
    async fn unparseable_body_is_a_structured_failure() {
        let (base, _) = spawn_app(&HubConfig::default()).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/api/v1/events"))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().starts_with("invalid event: "), "{body}");
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let (base, _) = spawn_app(&HubConfig::default()).await;
        let resp = reqwest::get(format!("{base}/api/v1/responses/sess_missing"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND.as_u16());
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({"success": false, "error": "response not found"}));
    }
}
