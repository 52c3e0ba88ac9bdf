//! テスト用LLMクライアント。あらかじめ用意したトークン列を
//! 呼び出し順に返す。キャンセルされれば即座に送信を止める。
use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use super::client::{LlmClient, TokenStream};
use super::error::LlmError;
use super::message::ChatMessage;

pub struct MockLlmClient {
    scripts: Mutex<VecDeque<Vec<String>>>,
    token_delay: Duration,
}

impl MockLlmClient {
    pub fn new(scripts: Vec<Vec<String>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            token_delay: Duration::from_millis(5),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn stream_reply(
        &self,
        _user_text: &str,
        _history: &[ChatMessage],
        cancel: CancellationToken,
    ) -> Result<TokenStream, LlmError> {
        let tokens = self.scripts.lock().pop_front().unwrap_or_default();
        let (tx, rx) = mpsc::channel(tokens.len().max(1));
        let delay = self.token_delay;
        tokio::spawn(async move {
            for token in tokens {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
                if tx.send(token).await.is_err() {
                    return;
                }
            }
        });
        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
