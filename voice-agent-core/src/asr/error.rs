use thiserror::Error;

#[derive(Debug, Error)]
pub enum AsrError {
    #[error("asr connection failed: {message}")]
    Connect { message: String },
    #[error("asr transport error: {message}")]
    Transport { message: String },
    #[error("asr client is not running")]
    NotRunning,
}
