//! テスト用TTSクライアント。あらかじめ用意した音声フレーム列を
//! 呼び出し順に返す。キャンセルされれば即座に送信を止める。
use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use super::client::{AudioStream, TtsClient};
use super::error::TtsError;

pub struct MockTtsClient {
    scripts: Mutex<VecDeque<Vec<Bytes>>>,
    frame_delay: Duration,
}

impl MockTtsClient {
    pub fn new(scripts: Vec<Vec<Bytes>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            frame_delay: Duration::from_millis(5),
        }
    }
}

#[async_trait]
impl TtsClient for MockTtsClient {
    async fn synthesize(
        &self,
        text: &str,
        cancel: CancellationToken,
    ) -> Result<AudioStream, TtsError> {
        if text.trim().is_empty() {
            let (_tx, rx) = mpsc::channel::<Bytes>(1);
            return Ok(Box::pin(ReceiverStream::new(rx)));
        }

        let frames = self.scripts.lock().pop_front().unwrap_or_default();
        let (tx, rx) = mpsc::channel(frames.len().max(1));
        let delay = self.frame_delay;
        tokio::spawn(async move {
            for frame in frames {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
                if tx.send(frame).await.is_err() {
                    return;
                }
            }
        });
        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
