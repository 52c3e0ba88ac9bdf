use thiserror::Error;

use crate::asr::AsrError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("asr client error: {0}")]
    Asr(#[from] AsrError),
    #[error("session is not started")]
    NotStarted,
}
