//! セッションからクライアント(呼び出し側)への通知コールバック集合
//!
//! 各イベントは同期クロージャとして登録する。実際の配信先
//! (WebSocketフレームへの変換等)は呼び出し側の責務で、`Session` は
//! 配信手段を一切知らない。
use std::sync::Arc;

use bytes::Bytes;

#[derive(Clone)]
pub struct SessionCallbacks {
    pub(crate) asr_final: Arc<dyn Fn(String) + Send + Sync>,
    pub(crate) token: Arc<dyn Fn(String) + Send + Sync>,
    pub(crate) audio_start: Arc<dyn Fn() + Send + Sync>,
    pub(crate) audio_chunk: Arc<dyn Fn(Bytes) + Send + Sync>,
    pub(crate) segment_done: Arc<dyn Fn() + Send + Sync>,
    pub(crate) turn_done: Arc<dyn Fn() + Send + Sync>,
}

impl SessionCallbacks {
    pub fn new() -> Self {
        Self {
            asr_final: Arc::new(|_| {}),
            token: Arc::new(|_| {}),
            audio_start: Arc::new(|| {}),
            audio_chunk: Arc::new(|_| {}),
            segment_done: Arc::new(|| {}),
            turn_done: Arc::new(|| {}),
        }
    }

    pub fn with_asr_final(mut self, f: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.asr_final = Arc::new(f);
        self
    }

    pub fn with_token(mut self, f: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.token = Arc::new(f);
        self
    }

    pub fn with_audio_start(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.audio_start = Arc::new(f);
        self
    }

    pub fn with_audio_chunk(mut self, f: impl Fn(Bytes) + Send + Sync + 'static) -> Self {
        self.audio_chunk = Arc::new(f);
        self
    }

    pub fn with_segment_done(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.segment_done = Arc::new(f);
        self
    }

    pub fn with_turn_done(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.turn_done = Arc::new(f);
        self
    }
}

impl Default for SessionCallbacks {
    fn default() -> Self {
        Self::new()
    }
}
