//! TTS(音声合成)クライアント設定
use super::error::ConfigError;
use super::{env_default, env_required};

#[derive(Debug, Clone)]
pub struct TtsSettings {
    pub base_url: String,
    pub api_key: String,
    pub voice_id: String,
    pub model_id: String,
    pub sample_rate_hertz: u32,
    pub temperature: f32,
}

impl TtsSettings {
    pub(super) fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: env_default(
                "TTS_BASE_URL",
                "https://api.inworld.ai/tts/v1/voice:stream".to_string(),
            )?,
            api_key: env_required("TTS_API_KEY")?,
            voice_id: env_required("TTS_VOICE_ID")?,
            model_id: env_default("TTS_MODEL_ID", "inworld-tts-1".to_string())?,
            sample_rate_hertz: env_default("TTS_SAMPLE_RATE_HERTZ", 48_000)?,
            temperature: env_default("TTS_TEMPERATURE", 1.2)?,
        })
    }
}
