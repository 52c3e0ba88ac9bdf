//! LLM(対話生成) ストリーミングクライアントモジュール
mod client;
mod error;
mod message;
mod mock;
mod reqwest_client;

pub use client::{LlmClient, TokenStream};
pub use error::LlmError;
pub use message::{ChatMessage, Role};
pub use mock::MockLlmClient;
pub use reqwest_client::ReqwestLlmClient;
