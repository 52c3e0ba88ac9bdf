use thiserror::Error;

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("tts connection failed: {message}")]
    Connect { message: String },
    #[error("tts transport error: {message}")]
    Transport { message: String },
}
