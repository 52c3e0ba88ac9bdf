//! ターンパイプライン: LLMトークン列 → セグメンター → TTS音声 の
//! 2段プロデューサ/コンシューマ
//!
//! 両段は `tokio::join!` で同一タスク内を協調的に進行する。
//! `CancellationToken` はLLM/TTSの下層HTTP読み出しまで貫通しており、
//! バージイン時は `cancel_and_await` が戻った時点で両方の接続が
//! 解放されていることを保証する。
use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::llm::{ChatMessage, LlmClient};
use crate::segmenter::Segmenter;
use crate::tts::TtsClient;

use super::callbacks::SessionCallbacks;
use super::history::History;

const SEGMENT_QUEUE_CAPACITY: usize = 8;

enum SegmentItem {
    Text(String),
    End,
}

/// 1ターンの終局状態。`completed` が `false` の場合はバージインで
/// 取り消されたターンであり、履歴への反映や `turn_done` 通知を
/// 行ってはならない。
pub struct TurnOutcome {
    pub user_text: String,
    pub reply_text: String,
    pub completed: bool,
}

/// 進行中のターンへのハンドル。`Session` はこれを1つだけ保持する(I1)。
pub struct TurnHandle {
    pub cancel: CancellationToken,
    join: JoinHandle<TurnOutcome>,
}

impl TurnHandle {
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        session_id: u64,
        turn_seq: u64,
        llm: Arc<dyn LlmClient>,
        tts: Arc<dyn TtsClient>,
        user_text: String,
        history_snapshot: Vec<ChatMessage>,
        history: Arc<History>,
        history_max: usize,
        callbacks: SessionCallbacks,
    ) -> Self {
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let join = tokio::spawn(async move {
            let outcome = run_turn(
                session_id,
                turn_seq,
                llm,
                tts,
                user_text,
                history_snapshot,
                task_cancel,
                callbacks.clone(),
            )
            .await;

            if outcome.completed {
                if !outcome.reply_text.trim().is_empty() {
                    history.commit(
                        outcome.user_text.clone(),
                        outcome.reply_text.clone(),
                        history_max,
                    );
                }
                (callbacks.turn_done)();
            }

            outcome
        });
        Self { cancel, join }
    }

    /// ターンをキャンセルし、その終了を待つ。後続ターンを開始する前に
    /// 必ず呼ぶこと(fire-and-forgetなキャンセルはI1違反のバグになる)。
    pub async fn cancel_and_await(self) {
        self.cancel.cancel();
        let _ = self.join.await;
    }

    /// キャンセルせず、自然完了を待つだけ(`Session::stop` 用)。
    pub async fn wait(self) -> Option<TurnOutcome> {
        self.join.await.ok()
    }
}

async fn run_turn(
    session_id: u64,
    turn_seq: u64,
    llm: Arc<dyn LlmClient>,
    tts: Arc<dyn TtsClient>,
    user_text: String,
    history_snapshot: Vec<ChatMessage>,
    cancel: CancellationToken,
    callbacks: SessionCallbacks,
) -> TurnOutcome {
    let (segment_tx, segment_rx) = mpsc::channel(SEGMENT_QUEUE_CAPACITY);

    let producer = run_producer(
        session_id,
        turn_seq,
        llm,
        user_text.clone(),
        history_snapshot,
        cancel.clone(),
        segment_tx,
        callbacks.clone(),
    );
    let consumer = run_consumer(session_id, turn_seq, tts, segment_rx, cancel.clone(), callbacks);

    let (reply_text, ()) = tokio::join!(producer, consumer);

    TurnOutcome {
        user_text,
        reply_text,
        completed: !cancel.is_cancelled(),
    }
}

async fn run_producer(
    session_id: u64,
    turn_seq: u64,
    llm: Arc<dyn LlmClient>,
    user_text: String,
    history_snapshot: Vec<ChatMessage>,
    cancel: CancellationToken,
    segment_tx: mpsc::Sender<SegmentItem>,
    callbacks: SessionCallbacks,
) -> String {
    let mut reply = String::new();
    let mut segmenter = Segmenter::new();

    let stream = match llm
        .stream_reply(&user_text, &history_snapshot, cancel.clone())
        .await
    {
        Ok(stream) => stream,
        Err(e) => {
            warn!(session_id, turn_seq, error = %e, "llm stream failed to start");
            let _ = segment_tx.send(SegmentItem::End).await;
            return reply;
        }
    };
    tokio::pin!(stream);

    let started_at = Instant::now();
    let mut first_token_logged = false;
    let mut cancelled = false;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => { cancelled = true; None }
            next = stream.next() => next,
        };
        let Some(token) = next else {
            if cancelled {
                debug!(session_id, turn_seq, "llm token stream cancelled (barge-in)");
            }
            break;
        };
        if token.is_empty() {
            continue;
        }

        reply.push_str(&token);
        (callbacks.token)(token.clone());
        if !first_token_logged {
            first_token_logged = true;
            info!(
                session_id,
                turn_seq,
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "llm first token"
            );
        }

        if let Some(segment) = segmenter.push(&token) {
            if segment_tx.send(SegmentItem::Text(segment)).await.is_err() {
                break;
            }
        }
    }

    // Only flush a trailing partial segment on natural completion; a
    // cancelled turn must not leak a final segment into the TTS queue.
    if !cancelled {
        if let Some(tail) = segmenter.finish() {
            let _ = segment_tx.send(SegmentItem::Text(tail)).await;
        }
    }
    let _ = segment_tx.send(SegmentItem::End).await;
    reply
}

async fn run_consumer(
    session_id: u64,
    turn_seq: u64,
    tts: Arc<dyn TtsClient>,
    mut segment_rx: mpsc::Receiver<SegmentItem>,
    cancel: CancellationToken,
    callbacks: SessionCallbacks,
) {
    let mut segment_started_at = None;
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            next = segment_rx.recv() => next,
        };
        let Some(item) = next else { return };
        let text = match item {
            SegmentItem::End => return,
            SegmentItem::Text(text) => text,
        };
        segment_started_at.get_or_insert_with(Instant::now);

        let stream = match tts.synthesize(&text, cancel.clone()).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(session_id, turn_seq, error = %e, "tts synthesis failed to start");
                (callbacks.segment_done)();
                continue;
            }
        };
        tokio::pin!(stream);

        let mut started = false;
        loop {
            let frame = tokio::select! {
                biased;
                // Mid-segment cancellation must not emit segment_done: the
                // client's own barge-in flush already discards it.
                _ = cancel.cancelled() => return,
                frame = stream.next() => frame,
            };
            match frame {
                Some(frame) => {
                    if !started {
                        started = true;
                        (callbacks.audio_start)();
                        if let Some(started_at) = segment_started_at.take() {
                            info!(
                                session_id,
                                turn_seq,
                                elapsed_ms = started_at.elapsed().as_millis() as u64,
                                "first audio frame"
                            );
                        }
                    }
                    (callbacks.audio_chunk)(frame);
                }
                None => break,
            }
        }
        (callbacks.segment_done)();
    }
}
