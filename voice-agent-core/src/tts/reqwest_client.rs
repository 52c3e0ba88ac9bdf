//! HTTP/2 NDJSONストリーミングTTSクライアント
//!
//! リクエストごとに新しいHTTP接続を張るのではなく、`reqwest::Client`
//! (内部でコネクションプールを保持する)をセッション内の全セグメントで
//! 共有する。レスポンスは改行区切りJSONで、各行の `result.audioContent`
//! がBase64エンコードされたWAVチャンク。先頭44バイトのWAVヘッダーを
//! 取り除いた残りを生PCMとして払い出す。
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::TtsSettings;

use super::client::{AudioStream, TtsClient};
use super::error::TtsError;

const AUDIO_CHANNEL_CAPACITY: usize = 32;
const WAV_HEADER_LEN: usize = 44;
const TTS_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);
const TTS_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const ERROR_SNIPPET_LEN: usize = 200;

pub struct ReqwestTtsClient {
    http: reqwest::Client,
    settings: Arc<TtsSettings>,
}

impl ReqwestTtsClient {
    pub fn new(settings: Arc<TtsSettings>) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(TTS_CONNECT_TIMEOUT)
            .timeout(TTS_REQUEST_TIMEOUT)
            .build()
            .expect("failed to build tts http client");
        Self { http, settings }
    }

    fn empty_stream() -> AudioStream {
        let (_tx, rx) = mpsc::channel::<Bytes>(1);
        Box::pin(ReceiverStream::new(rx))
    }
}

#[async_trait]
impl TtsClient for ReqwestTtsClient {
    async fn synthesize(
        &self,
        text: &str,
        cancel: CancellationToken,
    ) -> Result<AudioStream, TtsError> {
        if text.trim().is_empty() {
            return Ok(Self::empty_stream());
        }

        let body = json!({
            "text": text,
            "voiceId": self.settings.voice_id,
            "modelId": self.settings.model_id,
            "temperature": self.settings.temperature,
            "audio_config": {
                "audio_encoding": "LINEAR16",
                "sample_rate_hertz": self.settings.sample_rate_hertz,
            },
        });

        let response = self
            .http
            .post(&self.settings.base_url)
            .header("Authorization", format!("Basic {}", self.settings.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| TtsError::Connect {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let snippet = match response.text().await {
                Ok(body) => body.chars().take(ERROR_SNIPPET_LEN).collect::<String>(),
                Err(e) => format!("<failed to read error body: {e}>"),
            };
            warn!(status = %status, "tts http error, no audio for segment");
            debug!(status = %status, body = %snippet, "tts error response body");
            return Ok(Self::empty_stream());
        }

        let (tx, rx) = mpsc::channel::<Bytes>(AUDIO_CHANNEL_CAPACITY);
        tokio::spawn(read_ndjson_loop(response, tx, cancel));
        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

async fn read_ndjson_loop(response: reqwest::Response, tx: mpsc::Sender<Bytes>, cancel: CancellationToken) {
    let mut body = response.bytes_stream();
    let mut buffer = String::new();

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            chunk = body.next() => chunk,
        };
        let Some(chunk) = chunk else { return };
        let chunk = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "tts stream read error");
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
            let Some(pcm) = decode_line(&line) else {
                continue;
            };
            if tx.send(pcm).await.is_err() {
                return;
            }
        }
    }
}

fn decode_line(line: &str) -> Option<Bytes> {
    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "skipping malformed tts line");
            return None;
        }
    };
    let b64 = value.get("result")?.get("audioContent")?.as_str()?;
    let wav = match BASE64.decode(b64) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, "skipping invalid base64 tts chunk");
            return None;
        }
    };
    if wav.len() <= WAV_HEADER_LEN {
        return None;
    }
    Some(Bytes::copy_from_slice(&wav[WAV_HEADER_LEN..]))
}
