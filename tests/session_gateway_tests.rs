//! Session Gateway Tests
//!
//! End-to-end WebSocket sessions against a real axum server on an ephemeral
//! port, with mock backends behind the connector.

mod mock_backends;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use assistant_gateway::{
    ServerConfig, middleware::connection_limit_middleware, routes, state::AppState,
};
use axum::{
    body::Body, extract::connect_info::MockConnectInfo, http::Request, http::StatusCode,
    middleware,
};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, Message},
};
use tower::util::ServiceExt;

use mock_backends::{MockBackends, MockConnector, MockQuery, MockSpeech, MockSynthesis};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What the client observed on the wire.
#[derive(Debug, Clone, PartialEq)]
enum Frame {
    Json(Value),
    Audio(usize),
}

fn build_app(state: Arc<AppState>) -> axum::Router {
    let assistant_routes = routes::assistant::create_assistant_router().layer(
        middleware::from_fn_with_state(state.clone(), connection_limit_middleware),
    );
    routes::api::create_api_router()
        .merge(assistant_routes)
        .with_state(state)
}

async fn spawn_server(connector: Arc<MockConnector>, config: ServerConfig) -> SocketAddr {
    let state = AppState::with_connector(config, connector);
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _response) = connect_async(format!("ws://{addr}/chat"))
        .await
        .expect("WebSocket handshake failed");
    ws
}

/// Next data frame from the server; `None` once the socket closes.
async fn next_frame(ws: &mut Client) -> Option<Frame> {
    loop {
        let msg = timeout(Duration::from_secs(3), ws.next())
            .await
            .expect("timed out waiting for server frame")?;
        match msg {
            Ok(Message::Text(text)) => {
                let value: Value = serde_json::from_str(text.as_str()).expect("invalid JSON");
                return Some(Frame::Json(value));
            }
            Ok(Message::Binary(data)) => return Some(Frame::Audio(data.len())),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
}

/// Frames up to and including `audio.end`.
async fn collect_turn(ws: &mut Client) -> Vec<Frame> {
    let mut frames = Vec::new();
    while let Some(frame) = next_frame(ws).await {
        let done = frame == Frame::Json(json!({"type": "audio.end"}));
        frames.push(frame);
        if done {
            break;
        }
    }
    frames
}

async fn send_json(ws: &mut Client, value: Value) {
    ws.send(Message::text(value.to_string())).await.unwrap();
}

fn voice_mocks() -> MockBackends {
    MockBackends::new(
        MockSpeech::hearing("turn on the light").with_partial("turn on"),
        MockSynthesis::with_chunks(2, 640),
        MockQuery::answering("Done."),
    )
}

#[tokio::test]
async fn test_voice_turn_over_websocket() {
    let mocks = voice_mocks();
    let connector = Arc::new(MockConnector::new(mocks.clone()));
    let addr = spawn_server(connector.clone(), ServerConfig::default()).await;
    let mut ws = connect(addr).await;

    for byte in 1..=3u8 {
        ws.send(Message::binary(vec![byte; 320])).await.unwrap();
    }
    send_json(&mut ws, json!({"action": "finalize"})).await;

    let frames = collect_turn(&mut ws).await;
    assert_eq!(
        frames,
        vec![
            Frame::Json(json!({"type": "transcript", "text": "turn on", "final": false})),
            Frame::Json(json!({"type": "transcript", "text": "turn on the light", "final": true})),
            Frame::Json(json!({"type": "response", "text": "Done."})),
            Frame::Audio(640),
            Frame::Audio(640),
            Frame::Json(json!({"type": "audio.end"})),
        ]
    );

    assert_eq!(connector.connects(), 1);
    assert_eq!(mocks.speech.chunks().len(), 3);
    assert_eq!(mocks.speech.ends(), 1);
}

#[tokio::test]
async fn test_text_query_over_websocket() {
    let mocks = voice_mocks();
    let connector = Arc::new(MockConnector::new(mocks.clone()));
    let addr = spawn_server(connector, ServerConfig::default()).await;
    let mut ws = connect(addr).await;

    send_json(&mut ws, json!({"type": "text", "text": "status"})).await;

    let frames = collect_turn(&mut ws).await;
    assert_eq!(
        frames.first(),
        Some(&Frame::Json(json!({"type": "response", "text": "Done."})))
    );
    let responses = frames
        .iter()
        .filter(|frame| matches!(frame, Frame::Json(v) if v["type"] == "response"))
        .count();
    assert_eq!(responses, 1);
    assert_eq!(mocks.speech.opens(), 0);
    assert_eq!(mocks.query.queries(), vec!["status".to_string()]);
}

#[tokio::test]
async fn test_audio_metadata_frames_when_enabled() {
    let mocks = MockBackends::new(
        MockSpeech::hearing("unused"),
        MockSynthesis::with_chunks(1, 960).with_sample_rate(16000),
        MockQuery::answering("Hi."),
    );
    let config = ServerConfig {
        send_audio_metadata: true,
        ..ServerConfig::default()
    };
    let addr = spawn_server(Arc::new(MockConnector::new(mocks)), config).await;
    let mut ws = connect(addr).await;

    send_json(&mut ws, json!({"type": "text", "text": "hello"})).await;

    let frames = collect_turn(&mut ws).await;
    assert_eq!(
        frames,
        vec![
            Frame::Json(json!({"type": "response", "text": "Hi."})),
            Frame::Json(json!({
                "type": "audio.metadata",
                "format": "pcm",
                "samplerate": 16000,
                "encoding": "pcm16",
                "length_bytes": 960
            })),
            Frame::Audio(960),
            Frame::Json(json!({"type": "audio.end"})),
        ]
    );
}

#[tokio::test]
async fn test_malformed_message_keeps_session_alive() {
    let addr = spawn_server(
        Arc::new(MockConnector::new(voice_mocks())),
        ServerConfig::default(),
    )
    .await;
    let mut ws = connect(addr).await;

    ws.send(Message::text("not json")).await.unwrap();
    let Some(Frame::Json(error)) = next_frame(&mut ws).await else {
        panic!("expected an error event");
    };
    assert_eq!(error["type"], "error");
    assert_eq!(error["code"], "malformed_input");

    send_json(&mut ws, json!({"action": "dance"})).await;
    let Some(Frame::Json(error)) = next_frame(&mut ws).await else {
        panic!("expected an error event");
    };
    assert_eq!(error["code"], "malformed_input");

    // The session still serves a normal turn.
    send_json(&mut ws, json!({"type": "text", "text": "status"})).await;
    let frames = collect_turn(&mut ws).await;
    assert_eq!(frames.last(), Some(&Frame::Json(json!({"type": "audio.end"}))));
}

#[tokio::test]
async fn test_busy_while_speaking() {
    let mocks = MockBackends::new(
        MockSpeech::hearing("unused"),
        MockSynthesis::with_chunks(3, 320).with_chunk_delay(Duration::from_millis(100)),
        MockQuery::answering("A long story."),
    );
    let addr = spawn_server(Arc::new(MockConnector::new(mocks.clone())), ServerConfig::default()).await;
    let mut ws = connect(addr).await;

    send_json(&mut ws, json!({"type": "text", "text": "story"})).await;
    assert_eq!(
        next_frame(&mut ws).await,
        Some(Frame::Json(json!({"type": "response", "text": "A long story."})))
    );

    ws.send(Message::binary(vec![0u8; 320])).await.unwrap();

    let frames = collect_turn(&mut ws).await;
    let busy = frames
        .iter()
        .filter(|frame| matches!(frame, Frame::Json(v) if v["code"] == "busy"))
        .count();
    assert_eq!(busy, 1);
    assert_eq!(frames.iter().filter(|f| matches!(f, Frame::Audio(_))).count(), 3);
    assert_eq!(mocks.speech.opens(), 0);
}

#[tokio::test]
async fn test_backend_setup_failure_reports_and_closes() {
    let connector = Arc::new(MockConnector::failing(voice_mocks()));
    let addr = spawn_server(connector, ServerConfig::default()).await;
    let mut ws = connect(addr).await;

    let Some(Frame::Json(error)) = next_frame(&mut ws).await else {
        panic!("expected an error event");
    };
    assert_eq!(error["type"], "error");
    assert_eq!(error["code"], "backend_unavailable");
    assert_eq!(next_frame(&mut ws).await, None);
}

#[tokio::test]
async fn test_idle_session_is_closed() {
    let config = ServerConfig {
        idle_timeout_seconds: 1,
        ..ServerConfig::default()
    };
    let addr = spawn_server(Arc::new(MockConnector::new(voice_mocks())), config).await;
    let mut ws = connect(addr).await;

    let Some(Frame::Json(error)) = next_frame(&mut ws).await else {
        panic!("expected an idle timeout event");
    };
    assert_eq!(error["code"], "idle_timeout");
    assert_eq!(next_frame(&mut ws).await, None);
}

#[tokio::test]
async fn test_disconnect_releases_backends() {
    let mocks = voice_mocks();
    let addr = spawn_server(Arc::new(MockConnector::new(mocks.clone())), ServerConfig::default()).await;
    let mut ws = connect(addr).await;

    ws.send(Message::binary(vec![1u8; 320])).await.unwrap();
    ws.close(None).await.unwrap();

    let released = timeout(Duration::from_secs(3), async {
        while !(mocks.speech.released() && mocks.synthesis.released() && mocks.query.released()) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(released.is_ok(), "backends were not released on disconnect");
}

#[tokio::test]
async fn test_per_ip_limit_rejects_second_session() {
    let config = ServerConfig {
        max_connections_per_ip: 1,
        ..ServerConfig::default()
    };
    let addr = spawn_server(Arc::new(MockConnector::new(voice_mocks())), config).await;

    let mut first = connect(addr).await;
    let second = connect_async(format!("ws://{addr}/chat")).await;
    match second {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status().as_u16(), 429);
        }
        other => panic!("expected HTTP 429, got {:?}", other.map(|_| ())),
    }

    // Closing the first session frees the slot.
    first.close(None).await.unwrap();
    let reconnected = timeout(Duration::from_secs(3), async {
        loop {
            if connect_async(format!("ws://{addr}/chat")).await.is_ok() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    assert!(reconnected.is_ok(), "slot was not released");
}

#[tokio::test]
async fn test_failed_upgrade_frees_slot() {
    let config = ServerConfig {
        max_connections_per_ip: 2,
        max_websocket_connections: Some(2),
        ..ServerConfig::default()
    };
    let state = AppState::with_connector(config, Arc::new(MockConnector::new(voice_mocks())));
    let app = build_app(state.clone())
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));

    // Upgrade header alone: no `Connection: upgrade`, no key.
    for _ in 0..3 {
        let request = Request::builder()
            .uri("/chat")
            .header("upgrade", "websocket")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.ws_connection_count(), 0);
    }
}

#[tokio::test]
async fn test_long_answer_outlives_idle_timeout() {
    let mocks = MockBackends::new(
        MockSpeech::hearing("unused"),
        MockSynthesis::with_chunks(3, 320).with_chunk_delay(Duration::from_millis(600)),
        MockQuery::answering("A long story."),
    );
    let config = ServerConfig {
        idle_timeout_seconds: 1,
        ..ServerConfig::default()
    };
    let addr = spawn_server(Arc::new(MockConnector::new(mocks)), config).await;
    let mut ws = connect(addr).await;

    send_json(&mut ws, json!({"type": "text", "text": "story"})).await;

    let frames = collect_turn(&mut ws).await;
    assert!(
        !frames
            .iter()
            .any(|frame| matches!(frame, Frame::Json(v) if v["code"] == "idle_timeout")),
        "session idled out mid-answer: {frames:?}"
    );
    assert_eq!(frames.iter().filter(|f| matches!(f, Frame::Audio(_))).count(), 3);
    assert_eq!(frames.last(), Some(&Frame::Json(json!({"type": "audio.end"}))));
}

#[tokio::test]
async fn test_health_check() {
    let state = AppState::with_connector(
        ServerConfig::default(),
        Arc::new(MockConnector::new(voice_mocks())),
    );
    let app = build_app(state);

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value, json!({"status": "OK"}));
}
