//! 実ASRサービスへの全二重WebSocketクライアント
//!
//! 状態遷移: INIT -> CONNECTING -> RUNNING -> STOPPING -> STOPPED。
//! RUNNING中は送信・受信・最終結果ディスパッチの3タスクが協調動作する。
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::config::AsrSettings;

use super::client::{AsrCallbacks, StreamingAsrClient};
use super::error::AsrError;
use super::queue::DropOldestQueue;

const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    Connecting,
    Running,
    Stopping,
    Stopped,
}

enum SendItem {
    Frame(Bytes),
    Eos,
}

enum FinalItem {
    Text(String),
    Done,
}

struct RunningHandles {
    sender: JoinHandle<()>,
    receiver: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

pub struct WsAsrClient {
    settings: Arc<AsrSettings>,
    /// State-transition mutations (`start`/`stop`'s check-then-set) are
    /// serialized through this lock; the `watch` pair is what lets
    /// `send_pcm` wait for a state change without polling.
    transition_lock: Mutex<()>,
    state_tx: watch::Sender<State>,
    state_rx: watch::Receiver<State>,
    send_queue: parking_lot::Mutex<Option<Arc<DropOldestQueue<SendItem>>>>,
    final_queue: parking_lot::Mutex<Option<Arc<DropOldestQueue<FinalItem>>>>,
    handles: Mutex<Option<RunningHandles>>,
}

impl WsAsrClient {
    pub fn new(settings: Arc<AsrSettings>) -> Self {
        let (state_tx, state_rx) = watch::channel(State::Init);
        Self {
            settings,
            transition_lock: Mutex::new(()),
            state_tx,
            state_rx,
            send_queue: parking_lot::Mutex::new(None),
            final_queue: parking_lot::Mutex::new(None),
            handles: Mutex::new(None),
        }
    }

    fn state(&self) -> State {
        *self.state_rx.borrow()
    }

    fn start_message(&self) -> Value {
        let vad = &self.settings.vad;
        json!({
            "type": "start",
            "sample_rate": self.settings.sample_rate,
            "channels": self.settings.channels,
            "single_utterance": false,
            "format": "pcm_s16le",
            "vad": {
                "threshold": vad.threshold,
                "min_silence_ms": vad.min_silence_ms,
                "speech_pad_ms": vad.speech_pad_ms,
                "final_silence_s": vad.final_silence_s,
                "start_trigger_ms": vad.start_trigger_ms,
                "min_voiced_ms": vad.min_voiced_ms,
                "min_chars": vad.min_chars,
                "min_words": vad.min_words,
                "amp_extend": vad.amp_extend,
                "force_decode_ms": vad.force_decode_ms,
            }
        })
    }
}

#[async_trait]
impl StreamingAsrClient for WsAsrClient {
    async fn start(&self, callbacks: AsrCallbacks) -> Result<(), AsrError> {
        {
            let _guard = self.transition_lock.lock().await;
            match self.state() {
                State::Running | State::Connecting => return Ok(()),
                State::Stopping => return Ok(()),
                State::Init | State::Stopped => {
                    let _ = self.state_tx.send(State::Connecting);
                }
            }
        }

        let connect = connect_async(&self.settings.ws_url);
        let (ws_stream, _response) = match timeout(self.settings.open_timeout(), connect).await {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                let _ = self.state_tx.send(State::Init);
                return Err(AsrError::Connect {
                    message: e.to_string(),
                });
            }
            Err(_) => {
                let _ = self.state_tx.send(State::Init);
                return Err(AsrError::Connect {
                    message: "connect timed out".to_string(),
                });
            }
        };

        let (mut sink, mut stream) = ws_stream.split();

        if let Err(e) = sink
            .send(Message::Text(self.start_message().to_string()))
            .await
        {
            let _ = self.state_tx.send(State::Init);
            return Err(AsrError::Connect {
                message: e.to_string(),
            });
        }

        let send_queue = Arc::new(DropOldestQueue::new(self.settings.send_queue_capacity));
        let final_queue = Arc::new(DropOldestQueue::new(self.settings.final_queue_capacity));

        // Liveness: the sender periodically pings the socket and bails out
        // if no pong has landed within `ping_interval + ping_timeout`,
        // surfacing a stalled connection as a TransportError-style close
        // rather than hanging the sender forever.
        let ping_interval = self.settings.ping_interval();
        let ping_timeout = self.settings.ping_timeout();
        let last_pong = Arc::new(parking_lot::Mutex::new(Instant::now()));
        let last_pong_recv = last_pong.clone();

        let sender_queue = send_queue.clone();
        let sender = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(ping_interval);
            ticker.tick().await; // first tick fires immediately; consume it
            loop {
                tokio::select! {
                    item = sender_queue.pop() => {
                        match item {
                            SendItem::Frame(bytes) => {
                                if sink.send(Message::Binary(bytes.to_vec())).await.is_err() {
                                    break;
                                }
                            }
                            SendItem::Eos => {
                                let _ = sink
                                    .send(Message::Text(json!({"type": "eos"}).to_string()))
                                    .await;
                                let _ = sink.close().await;
                                break;
                            }
                        }
                    }
                    _ = ticker.tick() => {
                        if last_pong.lock().elapsed() > ping_interval + ping_timeout {
                            warn!("asr ping timeout, closing connection");
                            let _ = sink.close().await;
                            break;
                        }
                        if sink.send(Message::Ping(Vec::new())).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let final_queue_recv = final_queue.clone();
        let on_partial = callbacks.on_partial.clone();
        let receiver = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        handle_transcript_message(&text, &final_queue_recv, on_partial.as_deref());
                    }
                    Ok(Message::Pong(_)) => {
                        *last_pong_recv.lock() = Instant::now();
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "asr websocket read error");
                        break;
                    }
                }
            }
            final_queue_recv.push(FinalItem::Done);
        });

        let callback_timeout = self.settings.callback_timeout();
        let final_queue_dispatch = final_queue.clone();
        let on_final = callbacks.on_final.clone();
        let dispatcher = tokio::spawn(async move {
            loop {
                match final_queue_dispatch.pop().await {
                    FinalItem::Text(text) => {
                        let on_final = on_final.clone();
                        let join = tokio::task::spawn_blocking(move || (on_final)(text));
                        match timeout(callback_timeout, join).await {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => warn!(error = %e, "asr on_final callback panicked"),
                            Err(_) => warn!("asr on_final callback timed out"),
                        }
                    }
                    FinalItem::Done => break,
                }
            }
        });

        *self.send_queue.lock() = Some(send_queue);
        *self.final_queue.lock() = Some(final_queue);
        *self.handles.lock().await = Some(RunningHandles {
            sender,
            receiver,
            dispatcher,
        });
        let _ = self.state_tx.send(State::Running);
        info!(url = %self.settings.ws_url, "asr client started");
        Ok(())
    }

    async fn send_pcm(&self, frame: Bytes) -> Result<(), AsrError> {
        let mut rx = self.state_rx.clone();
        loop {
            match *rx.borrow() {
                State::Running => break,
                State::Stopping | State::Stopped => return Err(AsrError::NotRunning),
                State::Init | State::Connecting => {}
            }
            if rx.changed().await.is_err() {
                return Err(AsrError::NotRunning);
            }
        }

        let guard = self.send_queue.lock();
        match guard.as_ref() {
            Some(queue) => {
                if queue.push(SendItem::Frame(frame)) {
                    debug!("asr send queue full, dropped oldest frame");
                }
                Ok(())
            }
            None => Err(AsrError::NotRunning),
        }
    }

    async fn stop(&self) {
        {
            let _guard = self.transition_lock.lock().await;
            match self.state() {
                State::Init | State::Stopped | State::Stopping => return,
                State::Connecting | State::Running => {
                    let _ = self.state_tx.send(State::Stopping);
                }
            }
        }

        if let Some(queue) = self.send_queue.lock().clone() {
            queue.push(SendItem::Eos);
        }
        if let Some(queue) = self.final_queue.lock().clone() {
            queue.push(FinalItem::Done);
        }

        if let Some(mut handles) = self.handles.lock().await.take() {
            if timeout(SHUTDOWN_JOIN_TIMEOUT, &mut handles.sender)
                .await
                .is_err()
            {
                warn!("asr sender task did not shut down in time, aborting");
                handles.sender.abort();
            }
            if timeout(SHUTDOWN_JOIN_TIMEOUT, &mut handles.receiver)
                .await
                .is_err()
            {
                warn!("asr receiver task did not shut down in time, aborting");
                handles.receiver.abort();
            }
            if timeout(SHUTDOWN_JOIN_TIMEOUT, &mut handles.dispatcher)
                .await
                .is_err()
            {
                warn!("asr dispatcher task did not shut down in time, aborting");
                handles.dispatcher.abort();
            }
        }

        *self.send_queue.lock() = None;
        *self.final_queue.lock() = None;
        let _ = self.state_tx.send(State::Stopped);
        info!("asr client stopped");
    }
}

fn handle_transcript_message(
    text: &str,
    final_queue: &DropOldestQueue<FinalItem>,
    on_partial: Option<&(dyn Fn(String) + Send + Sync)>,
) {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "skipping malformed asr message");
            return;
        }
    };

    let is_final = value.get("final").and_then(Value::as_bool) == Some(true)
        || value.get("is_final").and_then(Value::as_bool) == Some(true)
        || matches!(
            value.get("type").and_then(Value::as_str),
            Some("final") | Some("transcript_final") | Some("eos")
        );

    let transcript = value
        .get("text")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or("");

    if transcript.is_empty() {
        return;
    }

    if is_final {
        if final_queue.push(FinalItem::Text(transcript.to_string())) {
            debug!("asr final queue full, dropped oldest final");
        }
    } else if let Some(cb) = on_partial {
        cb(transcript.to_string());
    }
}
