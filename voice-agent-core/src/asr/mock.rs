//! テスト用ASRクライアント
//!
//! 実ソケットを使わず、テストコードが任意のタイミングで
//! `emit_partial`/`emit_final` を呼ぶことで `Session` の挙動
//! (バージイン、順序保証)を検証できるようにする。
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use super::client::{AsrCallbacks, StreamingAsrClient};
use super::error::AsrError;

#[derive(Default)]
struct Inner {
    callbacks: Mutex<Option<AsrCallbacks>>,
    frames_received: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct MockAsrClient {
    inner: Arc<Inner>,
}

impl MockAsrClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit_final(&self, text: impl Into<String>) {
        if let Some(cb) = self.inner.callbacks.lock().as_ref() {
            (cb.on_final)(text.into());
        }
    }

    pub fn emit_partial(&self, text: impl Into<String>) {
        if let Some(cb) = self.inner.callbacks.lock().as_ref() {
            if let Some(on_partial) = &cb.on_partial {
                on_partial(text.into());
            }
        }
    }

    pub fn frames_received(&self) -> usize {
        self.inner.frames_received.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl StreamingAsrClient for MockAsrClient {
    async fn start(&self, callbacks: AsrCallbacks) -> Result<(), AsrError> {
        *self.inner.callbacks.lock() = Some(callbacks);
        Ok(())
    }

    async fn send_pcm(&self, _frame: Bytes) -> Result<(), AsrError> {
        self.inner.frames_received.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn stop(&self) {
        *self.inner.callbacks.lock() = None;
    }
}
