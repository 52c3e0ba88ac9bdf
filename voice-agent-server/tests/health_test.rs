use std::net::SocketAddr;

use voice_agent_core::Settings;
use voice_agent_server::handlers::AppState;

fn test_settings() -> Settings {
    // SAFETY-ish: tests run single-threaded per-process here; these vars are
    // only ever read by `Settings::load_from_env` below.
    std::env::set_var("ASR_WS_URL", "ws://127.0.0.1:1/asr");
    std::env::set_var("ASR_API_KEY", "test-asr-key");
    std::env::set_var("LLM_BASE_URL", "http://127.0.0.1:1/v1/chat/completions");
    std::env::set_var("LLM_API_KEY", "test-llm-key");
    std::env::set_var("LLM_MODEL", "test-model");
    std::env::set_var("TTS_API_KEY", "test-tts-key");
    std::env::set_var("TTS_VOICE_ID", "test-voice");
    std::env::set_var("SERVER_BIND_ADDR", "127.0.0.1:0");

    Settings::load_from_env().expect("all required env vars are set above")
}

#[tokio::test]
async fn health_endpoint_returns_ok() {
    let app = voice_agent_server::create_app(AppState::new(test_settings()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let body = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "ok");
}
