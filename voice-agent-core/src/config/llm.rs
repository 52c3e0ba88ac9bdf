//! LLM(対話生成)クライアント設定
use super::error::ConfigError;
use super::{env_default, env_optional, env_required};

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
    /// 発話スタイル/感情タグ（例: `[happy]`, `[sigh]`）の使用をアシスタントに
    /// 許可する追加のプロンプト断片。タグの意味づけはTTS側の規約であり、
    /// このクレートは素通りさせるだけ。未設定なら完全に無効。
    pub emotion_tags_prompt: Option<String>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
}

impl LlmSettings {
    pub(super) fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: env_required("LLM_BASE_URL")?,
            api_key: env_required("LLM_API_KEY")?,
            model: env_required("LLM_MODEL")?,
            system_prompt: env_default(
                "LLM_SYSTEM_PROMPT",
                "You are a helpful, concise voice assistant. Keep replies to one or two short \
                 sentences unless asked for more detail.".to_string(),
            )?,
            emotion_tags_prompt: env_optional("LLM_EMOTION_TAGS_PROMPT"),
            temperature: env_default("LLM_TEMPERATURE", 0.2)?,
            top_p: env_default("LLM_TOP_P", 1.0)?,
            max_tokens: env_default("LLM_MAX_TOKENS", 256)?,
            presence_penalty: env_default("LLM_PRESENCE_PENALTY", 0.0)?,
            frequency_penalty: env_default("LLM_FREQUENCY_PENALTY", 0.0)?,
        })
    }
}
