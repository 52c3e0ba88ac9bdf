//! LLMクライアントの最小インタフェース
use std::pin::Pin;

use async_trait::async_trait;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

use super::error::LlmError;
use super::message::ChatMessage;

/// トークン列。`cancel` が発火すると速やかに終了する。
pub type TokenStream = Pin<Box<dyn Stream<Item = String> + Send>>;

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// ユーザー発話と履歴スナップショットから返信トークン列を生成する。
    /// `cancel` が発火したら上流HTTP読み出しも含めて速やかに終了すること。
    async fn stream_reply(
        &self,
        user_text: &str,
        history: &[ChatMessage],
        cancel: CancellationToken,
    ) -> Result<TokenStream, LlmError>;
}
