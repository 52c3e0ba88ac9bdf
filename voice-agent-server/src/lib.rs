//! 最小限のaxumリスナー(SPEC_FULL §9.7)
//!
//! ここは意図的に薄い: CORS・静的ファイル配信・認証は追加しない。
//! コア(`voice-agent-core`)を実行可能・疎通確認可能にするための
//! リファレンスハーネスであり、より大きなリスナーに組み込む場合は
//! それらを呼び出し側が用意する。
pub mod handlers;
pub mod protocol;

use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub use handlers::AppState;

pub fn create_app(app_state: AppState) -> axum::Router {
    handlers::router(app_state).layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
