//! 設定読み込み時のエラー定義
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("invalid value for environment variable {name}: {value:?}")]
    InvalidVar { name: &'static str, value: String },
}
