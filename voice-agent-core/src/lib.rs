//! voice-agent-core クレート
//!
//! ASR(自動音声認識)・LLM(対話生成)・TTS(音声合成)の3つの上流サービスを
//! 1クライアント接続ごとに束ね、バージイン(割り込み)を伴う音声対話を
//! 成立させるオーケストレーションライブラリです。
//!
//! 主なモジュール:
//! - `asr`: ASRサービスへの全二重ストリーミングクライアント
//! - `llm`: キャンセル可能なトークンストリーミングクライアント
//! - `tts`: セグメント単位の音声合成クライアント
//! - `segmenter`: トークン列からTTSセグメントへの純粋変換
//! - `session`: セッション/ターンのオーケストレーション
//! - `config`: 環境変数ベースの設定読み込み
pub mod asr;
pub mod config;
pub mod llm;
pub mod segmenter;
pub mod session;
pub mod tts;

pub use config::Settings;
