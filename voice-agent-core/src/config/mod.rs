//! 設定モジュール（環境変数読み込み）
//!
//! `Settings` はプロセス起動時に一度だけ環境変数から構築され、
//! ASR/LLM/TTSの各クライアントとセッションリスナーへ渡されます。
//! 必須項目（各サービスのAPIキー等）が欠落している場合は起動時に
//! `ConfigError` として失敗し、接続処理の途中で落ちることを防ぎます。
mod asr;
mod error;
mod llm;
mod server;
mod tts;

use std::str::FromStr;

pub use asr::{AsrSettings, VadSettings};
pub use error::ConfigError;
pub use llm::LlmSettings;
pub use server::ServerSettings;
pub use tts::TtsSettings;

#[derive(Debug, Clone)]
pub struct Settings {
    pub asr: AsrSettings,
    pub llm: LlmSettings,
    pub tts: TtsSettings,
    pub server: ServerSettings,
}

impl Settings {
    /// `.env`(存在すれば)を読み込んだ上で環境変数から設定一式を構築
    pub fn load_from_env() -> Result<Self, ConfigError> {
        // ローカル開発用。本番環境では既に環境変数が設定されている想定で無視してよい。
        let _ = dotenvy::dotenv();

        Ok(Self {
            asr: AsrSettings::from_env()?,
            llm: LlmSettings::from_env()?,
            tts: TtsSettings::from_env()?,
            server: ServerSettings::from_env()?,
        })
    }
}

/// 必須環境変数を読み取る。未設定なら `ConfigError::MissingVar`。
fn env_required(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name))
}

/// 環境変数を読み取り、未設定ならデフォルト値を使う。設定されていて
/// パースに失敗した場合のみエラーにする。
fn env_default<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
{
    match std::env::var(name) {
        Ok(raw) => raw.parse::<T>().map_err(|_| ConfigError::InvalidVar {
            name,
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

/// 任意の環境変数を読み取る。未設定なら `None`（機能自体が無効）。
fn env_optional(name: &'static str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
