//! `Session` の結合テスト: バージイン/キャンセル、履歴の不変条件、
//! セグメント単位のTTS障害耐性を、Mockクライアント越しに検証する。
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use voice_agent_core::asr::MockAsrClient;
use voice_agent_core::llm::MockLlmClient;
use voice_agent_core::session::{Session, SessionCallbacks};
use voice_agent_core::tts::{AudioStream, MockTtsClient, TtsClient, TtsError};

const HISTORY_MAX: usize = 16;

/// 常に `synthesize` が失敗するTTSクライアント。セグメント単位での
/// 障害継続(次のセグメントへ進む)を検証するためのテスト専用実装。
struct FailingTtsClient {
    failures: AtomicUsize,
}

impl FailingTtsClient {
    fn new() -> Self {
        Self {
            failures: AtomicUsize::new(0),
        }
    }

    fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TtsClient for FailingTtsClient {
    async fn synthesize(&self, _text: &str, _cancel: CancellationToken) -> Result<AudioStream, TtsError> {
        self.failures.fetch_add(1, Ordering::Relaxed);
        Err(TtsError::Connect {
            message: "synthetic failure".into(),
        })
    }
}

/// 長い台本を少しずつ送るTTSクライアント。バージインが発話途中で
/// 割り込むタイミングを安定させるために用いる。
struct SlowTtsClient;

#[async_trait]
impl TtsClient for SlowTtsClient {
    async fn synthesize(&self, text: &str, cancel: CancellationToken) -> Result<AudioStream, TtsError> {
        if text.trim().is_empty() {
            let (_tx, rx) = mpsc::channel::<Bytes>(1);
            return Ok(Box::pin(ReceiverStream::new(rx)));
        }
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            for _ in 0..6 {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(Duration::from_millis(15)) => {}
                }
                if tx.send(Bytes::from_static(&[0, 1, 2, 3])).await.is_err() {
                    return;
                }
            }
        });
        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

#[derive(Default)]
struct Recorder {
    asr_finals: Mutex<Vec<String>>,
    tokens: Mutex<Vec<String>>,
    audio_starts: AtomicUsize,
    segment_dones: AtomicUsize,
    turn_dones: AtomicUsize,
}

fn callbacks_with_recorder(recorder: Arc<Recorder>) -> SessionCallbacks {
    let r1 = recorder.clone();
    let r2 = recorder.clone();
    let r3 = recorder.clone();
    let r4 = recorder.clone();
    let r5 = recorder.clone();
    SessionCallbacks::new()
        .with_asr_final(move |text| r1.asr_finals.lock().push(text))
        .with_token(move |text| r2.tokens.lock().push(text))
        .with_audio_start(move || {
            r3.audio_starts.fetch_add(1, Ordering::Relaxed);
        })
        .with_segment_done(move || {
            r4.segment_dones.fetch_add(1, Ordering::Relaxed);
        })
        .with_turn_done(move || {
            r5.turn_dones.fetch_add(1, Ordering::Relaxed);
        })
}

#[tokio::test]
async fn single_turn_completes_and_commits_history() {
    let asr = MockAsrClient::new();
    let llm = MockLlmClient::new(vec![vec!["hi".into(), " there".into()]]);
    let tts = MockTtsClient::new(vec![vec![Bytes::from_static(&[1, 2, 3])]]);
    let session = Session::new(Arc::new(asr.clone()), Arc::new(llm), Arc::new(tts), HISTORY_MAX);

    let recorder = Arc::new(Recorder::default());
    session.start(callbacks_with_recorder(recorder.clone())).await.unwrap();

    asr.emit_final("hello there");
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(*recorder.asr_finals.lock(), vec!["hello there".to_string()]);
    assert_eq!(recorder.tokens.lock().join(""), "hi there");
    assert!(recorder.audio_starts.load(Ordering::Relaxed) >= 1);
    assert!(recorder.segment_dones.load(Ordering::Relaxed) >= 1);
    assert_eq!(recorder.turn_dones.load(Ordering::Relaxed), 1);

    assert_eq!(session.history_len(), 2);
    let snapshot = session.history_snapshot(HISTORY_MAX);
    assert_eq!(snapshot[0].content, "hello there");
    assert_eq!(snapshot[1].content, "hi there");

    session.close().await;
}

#[tokio::test]
async fn barge_in_cancels_in_flight_turn_without_leaking_history() {
    let asr = MockAsrClient::new();
    let llm = MockLlmClient::new(vec![
        vec!["first".into(); 10],
        vec!["second reply".into()],
    ]);
    let session = Session::new(Arc::new(asr.clone()), Arc::new(llm), Arc::new(SlowTtsClient), HISTORY_MAX);

    let recorder = Arc::new(Recorder::default());
    session.start(callbacks_with_recorder(recorder.clone())).await.unwrap();

    asr.emit_final("first utterance");
    // Interrupt mid-turn, before the ten-token script and 20-frame TTS
    // script have had time to finish naturally.
    tokio::time::sleep(Duration::from_millis(30)).await;
    asr.emit_final("second utterance");

    tokio::time::sleep(Duration::from_millis(300)).await;

    // Only the second (completed) turn may reach history; the barge-in
    // must not leave a dangling partial reply from the first.
    assert_eq!(session.history_len(), 2);
    let snapshot = session.history_snapshot(HISTORY_MAX);
    assert_eq!(snapshot[0].content, "second utterance");
    assert_eq!(snapshot[1].content, "second reply");

    assert_eq!(
        *recorder.asr_finals.lock(),
        vec!["first utterance".to_string(), "second utterance".to_string()]
    );
    // Exactly one turn_done: the cancelled first turn must never fire it.
    assert_eq!(recorder.turn_dones.load(Ordering::Relaxed), 1);

    session.close().await;
}

#[tokio::test]
async fn rapid_fire_finals_only_keep_last_turn() {
    let asr = MockAsrClient::new();
    let llm = MockLlmClient::new(vec![
        vec!["a".into(); 10],
        vec!["b".into(); 10],
        vec!["c reply".into()],
    ]);
    let session = Session::new(Arc::new(asr.clone()), Arc::new(llm), Arc::new(SlowTtsClient), HISTORY_MAX);

    let recorder = Arc::new(Recorder::default());
    session.start(callbacks_with_recorder(recorder.clone())).await.unwrap();

    asr.emit_final("one");
    asr.emit_final("two");
    asr.emit_final("three");

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(recorder.turn_dones.load(Ordering::Relaxed), 1);
    assert_eq!(session.history_len(), 2);
    let snapshot = session.history_snapshot(HISTORY_MAX);
    assert_eq!(snapshot[0].content, "three");
    assert_eq!(snapshot[1].content, "c reply");

    session.close().await;
}

#[tokio::test]
async fn tts_failure_on_one_segment_still_reaches_turn_done() {
    let asr = MockAsrClient::new();
    let llm = MockLlmClient::new(vec![vec!["a reply.".into()]]);
    let tts = Arc::new(FailingTtsClient::new());
    let session = Session::new(Arc::new(asr.clone()), Arc::new(llm), tts.clone(), HISTORY_MAX);

    let recorder = Arc::new(Recorder::default());
    session.start(callbacks_with_recorder(recorder.clone())).await.unwrap();

    asr.emit_final("question");
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(tts.failures() >= 1);
    assert_eq!(recorder.audio_starts.load(Ordering::Relaxed), 0);
    // segment_done still fires even though synthesize errored, so the
    // consumer doesn't stall waiting on a connection that never opened.
    assert!(recorder.segment_dones.load(Ordering::Relaxed) >= 1);
    assert_eq!(recorder.turn_dones.load(Ordering::Relaxed), 1);
    assert_eq!(session.history_len(), 2);

    session.close().await;
}

#[tokio::test]
async fn stop_drains_in_flight_turn_naturally() {
    let asr = MockAsrClient::new();
    let llm = MockLlmClient::new(vec![vec!["done".into()]]);
    let tts = MockTtsClient::new(vec![vec![Bytes::from_static(&[9, 9])]]);
    let session = Session::new(Arc::new(asr.clone()), Arc::new(llm), Arc::new(tts), HISTORY_MAX);

    let recorder = Arc::new(Recorder::default());
    session.start(callbacks_with_recorder(recorder.clone())).await.unwrap();

    asr.emit_final("last words");
    session.stop().await;

    assert_eq!(recorder.turn_dones.load(Ordering::Relaxed), 1);
    assert_eq!(session.history_len(), 2);

    session.close().await;
}
