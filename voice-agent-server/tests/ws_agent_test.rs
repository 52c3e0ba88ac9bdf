//! `/ws/agent` のプロトコル整合性を、実ネットワークを使わず
//! Mock ASR/LLM/TTS クライアントで検証する end-to-end テスト。
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use voice_agent_core::asr::MockAsrClient;
use voice_agent_core::llm::MockLlmClient;
use voice_agent_core::session::Session;
use voice_agent_core::tts::MockTtsClient;
use voice_agent_core::Settings;
use voice_agent_server::handlers::AppState;

fn test_settings() -> Settings {
    std::env::set_var("ASR_WS_URL", "ws://127.0.0.1:1/asr");
    std::env::set_var("ASR_API_KEY", "unused");
    std::env::set_var("LLM_BASE_URL", "http://127.0.0.1:1/v1/chat/completions");
    std::env::set_var("LLM_API_KEY", "unused");
    std::env::set_var("LLM_MODEL", "unused");
    std::env::set_var("TTS_API_KEY", "unused");
    std::env::set_var("TTS_VOICE_ID", "unused");
    std::env::set_var("SERVER_BIND_ADDR", "127.0.0.1:0");
    Settings::load_from_env().expect("all required env vars are set above")
}

async fn spawn_test_server(asr: MockAsrClient, history_max: usize) -> SocketAddr {
    let settings = test_settings();

    let session_factory: voice_agent_server::handlers::SessionFactory = {
        let asr = asr.clone();
        Arc::new(move || {
            Session::new(
                Arc::new(asr.clone()),
                Arc::new(MockLlmClient::new(vec![vec!["hi".into(), " there".into()]])),
                Arc::new(MockTtsClient::new(vec![vec![bytes::Bytes::from_static(&[
                    1, 2, 3, 4,
                ])]])),
                history_max,
            )
        })
    };

    let app_state = AppState::with_session_factory(settings, session_factory);
    let app = voice_agent_server::create_app(app_state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn next_text(
    ws: &mut tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
) -> serde_json::Value {
    loop {
        match tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a server event")
            .expect("websocket closed unexpectedly")
            .unwrap()
        {
            WsMessage::Text(text) => return serde_json::from_str(&text).unwrap(),
            WsMessage::Binary(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

#[tokio::test]
async fn single_turn_emits_full_event_sequence() {
    let asr = MockAsrClient::new();
    let addr = spawn_test_server(asr.clone(), 16).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws/agent"))
        .await
        .unwrap();

    assert_eq!(next_text(&mut ws).await, json!({"type": "status", "message": "connected"}));

    ws.send(WsMessage::Text(json!({"type": "start"}).to_string()))
        .await
        .unwrap();
    assert_eq!(
        next_text(&mut ws).await,
        json!({"type": "status", "message": "initializing"})
    );
    assert_eq!(next_text(&mut ws).await, json!({"type": "status", "message": "ready"}));

    asr.emit_final("hello there");
    assert_eq!(
        next_text(&mut ws).await,
        json!({"type": "asr_final", "text": "hello there"})
    );

    // At least one llm_token event should stream in before the turn completes.
    let event = next_text(&mut ws).await;
    assert_eq!(event["type"], "llm_token");

    // Drain remaining events up to turn_done.
    let mut saw_audio_start = false;
    let mut saw_segment_done = false;
    let mut saw_turn_done = false;
    for _ in 0..20 {
        let event = next_text(&mut ws).await;
        match event["type"].as_str().unwrap() {
            "llm_token" => {}
            "audio_start" => saw_audio_start = true,
            "segment_done" => saw_segment_done = true,
            "turn_done" => {
                saw_turn_done = true;
                break;
            }
            other => panic!("unexpected event type: {other}"),
        }
    }
    assert!(saw_audio_start, "expected at least one audio_start event");
    assert!(saw_segment_done, "expected at least one segment_done event");
    assert!(saw_turn_done, "expected a turn_done event to close out the turn");

    ws.send(WsMessage::Text(json!({"type": "stop"}).to_string()))
        .await
        .unwrap();
    assert_eq!(next_text(&mut ws).await, json!({"type": "done"}));
}
