//! TTS(音声合成) セグメントシンセサイザーモジュール
//!
//! `Turn` の消費側(TTSコンシューマ)は1セグメントのテキストを
//! `TtsClient::synthesize` に渡し、返ってくる生PCM16のストリームを
//! そのままクライアントへ転送する。
mod client;
mod error;
mod mock;
mod reqwest_client;

pub use client::{AudioStream, TtsClient};
pub use error::TtsError;
pub use mock::MockTtsClient;
pub use reqwest_client::ReqwestTtsClient;
