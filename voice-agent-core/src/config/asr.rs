//! ASRクライアント設定
use std::time::Duration;

use super::error::ConfigError;
use super::{env_default, env_required};

/// VADパラメータ。開始メッセージへそのまま転送される。
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct VadSettings {
    pub threshold: f32,
    pub min_silence_ms: u32,
    pub speech_pad_ms: u32,
    pub final_silence_s: f32,
    pub start_trigger_ms: u32,
    pub min_voiced_ms: u32,
    pub min_chars: u32,
    pub min_words: u32,
    pub amp_extend: u32,
    pub force_decode_ms: u32,
}

impl Default for VadSettings {
    fn default() -> Self {
        Self {
            threshold: 0.40,
            min_silence_ms: 200,
            speech_pad_ms: 240,
            final_silence_s: 0.20,
            start_trigger_ms: 24,
            min_voiced_ms: 36,
            min_chars: 1,
            min_words: 1,
            amp_extend: 1200,
            force_decode_ms: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AsrSettings {
    pub ws_url: String,
    pub api_key: String,
    pub sample_rate: u32,
    pub channels: u8,
    pub send_queue_capacity: usize,
    pub final_queue_capacity: usize,
    pub ping_interval_ms: u64,
    pub ping_timeout_ms: u64,
    pub open_timeout_ms: u64,
    pub callback_timeout_ms: u64,
    pub vad: VadSettings,
}

impl AsrSettings {
    pub(super) fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            ws_url: env_required("ASR_WS_URL")?,
            api_key: env_required("ASR_API_KEY")?,
            sample_rate: env_default("ASR_SAMPLE_RATE", 16_000)?,
            channels: env_default("ASR_CHANNELS", 1)?,
            send_queue_capacity: env_default("ASR_SEND_QUEUE_CAPACITY", 256)?,
            final_queue_capacity: env_default("ASR_FINAL_QUEUE_CAPACITY", 64)?,
            ping_interval_ms: env_default("ASR_PING_INTERVAL_MS", 5_000)?,
            ping_timeout_ms: env_default("ASR_PING_TIMEOUT_MS", 5_000)?,
            open_timeout_ms: env_default("ASR_OPEN_TIMEOUT_MS", 30_000)?,
            callback_timeout_ms: env_default("ASR_CALLBACK_TIMEOUT_MS", 5_000)?,
            vad: VadSettings::default(),
        })
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_millis(self.callback_timeout_ms)
    }
}
