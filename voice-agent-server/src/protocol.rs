//! `/ws/agent` のJSONイベント形式(spec.md §6)
//!
//! クライアント→サーバーのテキストフレームは `type` フィールドで
//! タグ付けされた小さなメッセージ集合、サーバー→クライアントは
//! `ServerEvent` の内部タグ付きenumとしてシリアライズする。
use serde::{Deserialize, Serialize};

/// クライアントから受信するテキストフレーム。
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// セッションを初期化する(ASR接続・VAD送信)。
    Start,
    /// 現在のターンを(境界付きで)完了させてから切断する。
    Stop,
}

/// サーバーからクライアントへ送るテキストフレーム。
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Status { message: String },
    AsrFinal { text: String },
    LlmToken { text: String },
    AudioStart,
    SegmentDone,
    TurnDone,
    Done,
}

impl ServerEvent {
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
        }
    }

    /// `axum::extract::ws::Message::Text` へ変換するためのJSON文字列化。
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("ServerEvent serialization is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_event_shape() {
        let event = ServerEvent::status("ready");
        assert_eq!(event.to_json(), r#"{"type":"status","message":"ready"}"#);
    }

    #[test]
    fn asr_final_event_shape() {
        let event = ServerEvent::AsrFinal {
            text: "hello there".to_string(),
        };
        assert_eq!(
            event.to_json(),
            r#"{"type":"asr_final","text":"hello there"}"#
        );
    }

    #[test]
    fn unit_variant_event_shapes() {
        assert_eq!(ServerEvent::AudioStart.to_json(), r#"{"type":"audio_start"}"#);
        assert_eq!(ServerEvent::SegmentDone.to_json(), r#"{"type":"segment_done"}"#);
        assert_eq!(ServerEvent::TurnDone.to_json(), r#"{"type":"turn_done"}"#);
        assert_eq!(ServerEvent::Done.to_json(), r#"{"type":"done"}"#);
    }

    #[test]
    fn client_start_and_stop_parse() {
        let start: ClientMessage = serde_json::from_str(r#"{"type":"start"}"#).unwrap();
        assert!(matches!(start, ClientMessage::Start));
        let stop: ClientMessage = serde_json::from_str(r#"{"type":"stop"}"#).unwrap();
        assert!(matches!(stop, ClientMessage::Stop));
    }
}
