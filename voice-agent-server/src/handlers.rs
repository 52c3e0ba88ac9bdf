//! `/ws/agent` websocketハンドラ
//!
//! 接続ごとに [`Session`] を1つ生成し、クライアントからの制御メッセージ
//! (`start`/`stop`)とPCMフレームを取り込みつつ、`Session` のコールバック
//! から届くイベントを outbound チャネル経由でクライアントへ折り返す。
//! 送受信を別タスクに分けるのは `mmogr-gglib` の voice_ws ハンドラに倣った
//! 構成(ingest/egressの二分割、`tokio::select!` でどちらかの終了を待つ)。
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

use voice_agent_core::asr::WsAsrClient;
use voice_agent_core::llm::ReqwestLlmClient;
use voice_agent_core::session::{Session, SessionCallbacks};
use voice_agent_core::tts::ReqwestTtsClient;
use voice_agent_core::Settings;

use crate::protocol::{ClientMessage, ServerEvent};

/// セッション1件分のASR/LLM/TTSクライアント組を組み立てるファクトリ。
/// 実運用では実クライアントを、テストではモッククライアントを束ねた
/// `Session` を返す差し替え口として `AppState` に保持する。
pub type SessionFactory = Arc<dyn Fn() -> Arc<Session> + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    session_factory: SessionFactory,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let settings = Arc::new(settings);
        let factory_settings = settings.clone();
        Self {
            settings,
            session_factory: Arc::new(move || build_real_session(&factory_settings)),
        }
    }

    /// テスト用: ASR/LLM/TTSクライアントの組み立てを差し替える。
    pub fn with_session_factory(settings: Settings, factory: SessionFactory) -> Self {
        Self {
            settings: Arc::new(settings),
            session_factory: factory,
        }
    }
}

fn build_real_session(settings: &Settings) -> Arc<Session> {
    let asr = Arc::new(WsAsrClient::new(Arc::new(settings.asr.clone())));
    let llm = Arc::new(ReqwestLlmClient::new(Arc::new(settings.llm.clone())));
    let tts = Arc::new(ReqwestTtsClient::new(Arc::new(settings.tts.clone())));
    Session::new(asr, llm, tts, settings.server.history_max_messages)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws/agent", get(ws_agent))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_agent(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// 送信側タスクへ渡す一フレーム。テキスト(JSONイベント)と
/// バイナリ(TTS音声)の両方をこの1本のチャネルで直列化する。
enum OutboundFrame {
    Text(String),
    Binary(Bytes),
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<OutboundFrame>();

    let mut egress = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let message = match frame {
                OutboundFrame::Text(text) => Message::Text(text.into()),
                OutboundFrame::Binary(bytes) => Message::Binary(bytes),
            };
            if ws_sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let _ = out_tx.send(OutboundFrame::Text(
        ServerEvent::status("connected").to_json(),
    ));

    let mut session: Option<Arc<Session>> = None;
    let mut session_started = false;

    loop {
        let Some(msg_result) = ws_receiver.next().await else {
            break;
        };
        let msg = match msg_result {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "websocket receive error");
                break;
            }
        };

        match msg {
            Message::Binary(data) => {
                if session_started {
                    if let Some(session) = &session {
                        if let Err(e) = session.feed_pcm(data) {
                            warn!(session_id = session.id(), error = %e, "dropping pcm frame");
                        }
                    }
                }
            }
            Message::Text(text) => {
                let parsed: Result<ClientMessage, _> = serde_json::from_str(&text);
                let Ok(client_msg) = parsed else {
                    warn!(raw = %text, "ignoring malformed control message");
                    continue;
                };
                match client_msg {
                    ClientMessage::Start => {
                        if session_started {
                            continue;
                        }
                        let _ = out_tx.send(OutboundFrame::Text(
                            ServerEvent::status("initializing").to_json(),
                        ));
                        match start_session(&state, out_tx.clone()).await {
                            Ok(new_session) => {
                                info!(session_id = new_session.id(), "session started");
                                session = Some(new_session);
                                session_started = true;
                                let _ = out_tx.send(OutboundFrame::Text(
                                    ServerEvent::status("ready").to_json(),
                                ));
                            }
                            Err(e) => {
                                warn!(error = %e, "failed to start session");
                                let _ = out_tx.send(OutboundFrame::Text(
                                    ServerEvent::status(format!("error: {e}")).to_json(),
                                ));
                                break;
                            }
                        }
                    }
                    ClientMessage::Stop => {
                        if let Some(session) = &session {
                            session.stop().await;
                        }
                        let _ = out_tx.send(OutboundFrame::Text(ServerEvent::Done.to_json()));
                        break;
                    }
                }
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    let closed_session_id = session.as_ref().map(|s| s.id());
    if let Some(session) = session {
        session.close().await;
    }
    drop(out_tx);
    let _ = (&mut egress).await;

    info!(session_id = ?closed_session_id, "/ws/agent session closed");
}

async fn start_session(
    state: &AppState,
    out_tx: mpsc::UnboundedSender<OutboundFrame>,
) -> Result<Arc<Session>, voice_agent_core::session::SessionError> {
    let session = (state.session_factory)();

    let callbacks = {
        let asr_final_tx = out_tx.clone();
        let token_tx = out_tx.clone();
        let audio_start_tx = out_tx.clone();
        let audio_chunk_tx = out_tx.clone();
        let segment_done_tx = out_tx.clone();
        let turn_done_tx = out_tx.clone();

        SessionCallbacks::new()
            .with_asr_final(move |text| {
                let _ = asr_final_tx.send(OutboundFrame::Text(
                    ServerEvent::AsrFinal { text }.to_json(),
                ));
            })
            .with_token(move |text| {
                let _ = token_tx.send(OutboundFrame::Text(
                    ServerEvent::LlmToken { text }.to_json(),
                ));
            })
            .with_audio_start(move || {
                let _ = audio_start_tx
                    .send(OutboundFrame::Text(ServerEvent::AudioStart.to_json()));
            })
            .with_audio_chunk(move |chunk| {
                let _ = audio_chunk_tx.send(OutboundFrame::Binary(chunk));
            })
            .with_segment_done(move || {
                let _ = segment_done_tx
                    .send(OutboundFrame::Text(ServerEvent::SegmentDone.to_json()));
            })
            .with_turn_done(move || {
                let _ =
                    turn_done_tx.send(OutboundFrame::Text(ServerEvent::TurnDone.to_json()));
            })
    };

    session.start(callbacks).await?;
    Ok(session)
}
