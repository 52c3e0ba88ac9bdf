//! ASRクライアント共通の型とトレイト
//!
//! `StreamingAsrClient` は最終/途中の文字起こしイベントをコールバックで
//! 通知する全二重クライアントの最小インタフェース。実装は `WsAsrClient`
//! (実際のASRサービスへ接続)と `MockAsrClient`(テスト用)の2つ。
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::error::AsrError;

/// `on_final`/`on_partial` に渡すコールバック集合
#[derive(Clone)]
pub struct AsrCallbacks {
    pub on_final: Arc<dyn Fn(String) + Send + Sync>,
    pub on_partial: Option<Arc<dyn Fn(String) + Send + Sync>>,
}

impl AsrCallbacks {
    pub fn new(on_final: impl Fn(String) + Send + Sync + 'static) -> Self {
        Self {
            on_final: Arc::new(on_final),
            on_partial: None,
        }
    }

    pub fn with_partial(mut self, on_partial: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_partial = Some(Arc::new(on_partial));
        self
    }
}

/// 全二重ASRクライアントの最小インタフェース
#[async_trait]
pub trait StreamingAsrClient: Send + Sync {
    /// 接続を開始する。既に実行中であれば何もしない(冪等)。
    async fn start(&self, callbacks: AsrCallbacks) -> Result<(), AsrError>;

    /// PCM16LEフレームを送信キューへ投入する。`start()` が完了するまで
    /// 待機し(未開始/接続中の間はブロックする)、投入できた時点で返る。
    /// 既に停止済み/停止中であればエラー。キューが満杯の場合は
    /// 最も古いフレームを破棄して投入する。
    async fn send_pcm(&self, frame: Bytes) -> Result<(), AsrError>;

    /// 切断処理を行う。既に停止していれば何もしない(冪等)。
    async fn stop(&self);
}
