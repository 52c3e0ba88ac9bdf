//! セッションオーケストレーター
//!
//! クライアント接続ごとに1つ生成される。ASR/LLM/TTSの3クライアントを
//! 所有し、確定済み文字起こし(final)ごとにバージイン判定、履歴の
//! スナップショット、新規ターンの起動を行う(spec.md §4.5)。
mod callbacks;
mod error;
mod history;
mod turn;

pub use callbacks::SessionCallbacks;
pub use error::SessionError;
pub use history::History;
pub use turn::TurnOutcome;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::asr::{AsrCallbacks, StreamingAsrClient};
use crate::llm::LlmClient;
use crate::tts::TtsClient;

use turn::TurnHandle;

/// Session::stop() がターンの自然完了を待つ上限。
const STOP_TURN_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
/// 入力取り込みタスクの停止を待つ上限。
const INGRESS_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// プロセス内で一意な `Session` id を払い出す(ログの相関用。接続元の
/// アイデンティティではないので、ワイヤプロトコルには一切現れない)。
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

pub struct Session {
    id: u64,
    asr: Arc<dyn StreamingAsrClient>,
    llm: Arc<dyn LlmClient>,
    tts: Arc<dyn TtsClient>,
    history: Arc<History>,
    history_max: usize,
    callbacks: Mutex<Option<SessionCallbacks>>,
    current_turn: Mutex<Option<TurnHandle>>,
    turn_seq: AtomicU64,
    ingress_tx: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    ingress_task: Mutex<Option<JoinHandle<()>>>,
    final_task: Mutex<Option<JoinHandle<()>>>,
    /// Self-reference used only to hand an `Arc<Session>` to the
    /// final-dispatch task spawned from `start`; never escapes this module.
    self_weak: Mutex<Weak<Session>>,
}

impl Session {
    pub fn new(
        asr: Arc<dyn StreamingAsrClient>,
        llm: Arc<dyn LlmClient>,
        tts: Arc<dyn TtsClient>,
        history_max: usize,
    ) -> Arc<Self> {
        let session = Arc::new(Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            asr,
            llm,
            tts,
            history: Arc::new(History::new()),
            history_max,
            callbacks: Mutex::new(None),
            current_turn: Mutex::new(None),
            turn_seq: AtomicU64::new(0),
            ingress_tx: Mutex::new(None),
            ingress_task: Mutex::new(None),
            final_task: Mutex::new(None),
            self_weak: Mutex::new(Weak::new()),
        });
        *session.self_weak.lock() = Arc::downgrade(&session);
        session
    }

    /// ログ相関用のプロセス内セッションid。
    pub fn id(&self) -> u64 {
        self.id
    }

    /// テスト/診断用。現在の履歴メッセージ数を返す。
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn history_snapshot(&self, max: usize) -> Vec<crate::llm::ChatMessage> {
        self.history.snapshot(max)
    }

    /// ASR接続を開き、入力取り込みポンプとfinalディスパッチループを
    /// 起動する。冪等ではない: 既に開始済みのセッションで再度呼ぶと
    /// ASRクライアント自身の冪等性に委ねられる。
    pub async fn start(&self, callbacks: SessionCallbacks) -> Result<(), SessionError> {
        *self.callbacks.lock() = Some(callbacks);

        let (final_tx, mut final_rx) = mpsc::unbounded_channel::<String>();
        let asr_callbacks = AsrCallbacks::new(move |text| {
            let _ = final_tx.send(text);
        });
        self.asr.start(asr_callbacks).await?;

        let (ingress_tx, mut ingress_rx) = mpsc::unbounded_channel::<Bytes>();
        *self.ingress_tx.lock() = Some(ingress_tx);
        let asr_for_pump = self.asr.clone();
        let session_id = self.id;
        let ingress_task = tokio::spawn(async move {
            while let Some(frame) = ingress_rx.recv().await {
                if let Err(e) = asr_for_pump.send_pcm(frame).await {
                    warn!(session_id, error = %e, "dropping pcm frame, asr client not running");
                }
            }
        });
        *self.ingress_task.lock() = Some(ingress_task);

        let session = self
            .self_weak
            .lock()
            .upgrade()
            .expect("session must be alive while start() runs");
        let final_task = tokio::spawn(async move {
            while let Some(text) = final_rx.recv().await {
                session.handle_final(text).await;
            }
        });
        *self.final_task.lock() = Some(final_task);

        Ok(())
    }

    /// PCMフレームを取り込みキューへ投入する。非ブロッキング。
    pub fn feed_pcm(&self, frame: Bytes) -> Result<(), SessionError> {
        match self.ingress_tx.lock().as_ref() {
            Some(tx) => {
                let _ = tx.send(frame);
                Ok(())
            }
            None => Err(SessionError::NotStarted),
        }
    }

    /// 確定済み文字起こし1件を処理する。
    ///
    /// 1. 進行中のターンがあればキャンセルし、その終了を**待つ**
    ///    (I1/I3を満たすための直列化)。
    /// 2. `asr_final` をクライアントへ通知する(I6)。
    /// 3. 履歴をスナップショットし、新しいターンを起動する。
    async fn handle_final(&self, text: String) {
        if let Some(turn) = self.current_turn.lock().take() {
            info!(session_id = self.id, "barge-in detected, cancelling in-flight turn");
            turn.cancel_and_await().await;
        }

        let callbacks = match self.callbacks.lock().clone() {
            Some(cb) => cb,
            None => return,
        };
        (callbacks.asr_final)(text.clone());

        let turn_seq = self.turn_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let snapshot = self.history.snapshot(self.history_max);
        let turn = TurnHandle::spawn(
            self.id,
            turn_seq,
            self.llm.clone(),
            self.tts.clone(),
            text,
            snapshot,
            self.history.clone(),
            self.history_max,
            callbacks,
        );
        *self.current_turn.lock() = Some(turn);
    }

    /// 現在のターンを(キャンセルせず)自然完了まで最大5秒待ち、
    /// 入力取り込みを終了する。ASR/TTSクライアント自体は閉じない。
    pub async fn stop(&self) {
        if let Some(turn) = self.current_turn.lock().take() {
            let _ = timeout(STOP_TURN_DRAIN_TIMEOUT, turn.wait()).await;
        }
        if let Some(tx) = self.ingress_tx.lock().take() {
            drop(tx);
        }
        if let Some(task) = self.ingress_task.lock().take() {
            let _ = timeout(INGRESS_SHUTDOWN_TIMEOUT, task).await;
        }
    }

    /// `stop()` に加えてASR/TTSクライアントを閉じる。以後このセッションは
    /// 再利用できない。
    pub async fn close(&self) {
        self.stop().await;
        if let Some(task) = self.final_task.lock().take() {
            task.abort();
        }
        self.asr.stop().await;
        self.tts.close().await;
    }
}
