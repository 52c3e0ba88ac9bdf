//! OpenAI互換 chat/completions ストリーミングクライアント
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::LlmSettings;

use super::client::{LlmClient, TokenStream};
use super::error::LlmError;
use super::message::ChatMessage;

const TOKEN_CHANNEL_CAPACITY: usize = 64;

pub struct ReqwestLlmClient {
    http: reqwest::Client,
    settings: Arc<LlmSettings>,
}

impl ReqwestLlmClient {
    pub fn new(settings: Arc<LlmSettings>) -> Self {
        let http = reqwest::Client::builder()
            .build()
            .expect("failed to build llm http client");
        Self { http, settings }
    }

    /// ベースのシステムプロンプトに、設定されていれば感情タグ規約の
    /// 補足断片を続けて付与する。未設定なら素通し。
    fn system_prompt(&self) -> String {
        match &self.settings.emotion_tags_prompt {
            Some(extra) if !extra.is_empty() => {
                format!("{}\n\n{extra}", self.settings.system_prompt)
            }
            _ => self.settings.system_prompt.clone(),
        }
    }
}

#[async_trait]
impl LlmClient for ReqwestLlmClient {
    async fn stream_reply(
        &self,
        user_text: &str,
        history: &[ChatMessage],
        cancel: CancellationToken,
    ) -> Result<TokenStream, LlmError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt()));
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(user_text.to_string()));

        let body = json!({
            "model": self.settings.model,
            "messages": messages,
            "temperature": self.settings.temperature,
            "top_p": self.settings.top_p,
            "max_tokens": self.settings.max_tokens,
            "presence_penalty": self.settings.presence_penalty,
            "frequency_penalty": self.settings.frequency_penalty,
            "stream": true,
        });

        let url = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Connect {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(LlmError::Connect {
                message: format!("unexpected status {}", response.status()),
            });
        }

        let (tx, rx) = mpsc::channel::<String>(TOKEN_CHANNEL_CAPACITY);
        tokio::spawn(read_sse_loop(response, tx, cancel));

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

async fn read_sse_loop(
    response: reqwest::Response,
    tx: mpsc::Sender<String>,
    cancel: CancellationToken,
) {
    let mut body = response.bytes_stream();
    let mut buffer = String::new();

    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => return,
            chunk = body.next() => chunk,
        };
        let Some(chunk) = chunk else { return };
        let chunk = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "llm stream read error");
                return;
            }
        };
        buffer.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(pos) = buffer.find('\n') {
            let line = buffer[..pos].trim().to_string();
            buffer.drain(..=pos);
            if line.is_empty() {
                continue;
            }
            let Some(payload) = line.strip_prefix("data:") else {
                continue;
            };
            let payload = payload.trim();
            if payload == "[DONE]" {
                return;
            }
            let value: Value = match serde_json::from_str(payload) {
                Ok(v) => v,
                Err(e) => {
                    debug!(error = %e, "skipping malformed llm chunk");
                    continue;
                }
            };
            if let Some(token) = value["choices"][0]["delta"]["content"].as_str() {
                if !token.is_empty() && tx.send(token.to_string()).await.is_err() {
                    return;
                }
            }
        }
    }
}
