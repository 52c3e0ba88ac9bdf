//! セッション/リスナー共通設定
use super::error::ConfigError;
use super::env_default;

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind_addr: String,
    pub history_max_messages: usize,
}

impl ServerSettings {
    pub(super) fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: env_default("SERVER_BIND_ADDR", "0.0.0.0:8080".to_string())?,
            history_max_messages: env_default("HISTORY_MAX_MESSAGES", 16)?,
        })
    }
}
