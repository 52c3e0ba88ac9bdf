//! TTSクライアントの最小インタフェース
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

use super::error::TtsError;

/// 生PCM16LEフレームの列。`cancel` が発火すると速やかに終了する。
pub type AudioStream = Pin<Box<dyn Stream<Item = Bytes> + Send>>;

#[async_trait]
pub trait TtsClient: Send + Sync {
    /// 1セグメント分のテキストを音声へ変換する。空白のみの入力は
    /// 空のストリームを返す。`cancel` が発火したら上流HTTP読み出しも
    /// 含めて速やかに終了すること。
    async fn synthesize(&self, text: &str, cancel: CancellationToken) -> Result<AudioStream, TtsError>;

    /// 下層コネクションを解放する。セッション終了時に一度だけ呼ばれる。
    async fn close(&self) {}
}
