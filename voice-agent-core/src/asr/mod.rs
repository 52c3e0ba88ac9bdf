//! ASR(自動音声認識) クライアントモジュール
//!
//! `Session` は1つの `StreamingAsrClient` 実装を所有し、PCMフレームを
//! 送信しながら最終/途中の文字起こしをコールバックで受け取る。
mod client;
mod error;
mod mock;
mod queue;
mod ws_client;

pub use client::{AsrCallbacks, StreamingAsrClient};
pub use error::AsrError;
pub use mock::MockAsrClient;
pub use ws_client::WsAsrClient;
