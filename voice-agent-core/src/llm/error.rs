use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm connection failed: {message}")]
    Connect { message: String },
    #[error("llm transport error: {message}")]
    Transport { message: String },
}
