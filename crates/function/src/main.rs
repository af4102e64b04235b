//! # FOP Function
//!
//! 署名付きXSL-FO文書をPDFに変換するHTTP関数。
//! Azure Functionsのカスタムハンドラーとして動作する。
//!
//! ## API エンドポイント
//! - `GET|POST /api/Fop?sig=<hex>`: ボディのXSL-FO文書をPDFに変換
//!
//! ## 環境変数
//! - `FOP_CONFIG_PATH` / `FOP_FONT_CACHE_PATH` / `PASSWORD_KEY`: 最初のリクエストで読み込む
//! - `FUNCTIONS_CUSTOMHANDLER_PORT` / `FOP_TEMP_DIR` / `FOP_MAX_BODY_BYTES` /
//!   `FOP_EXPOSE_ERRORS`: 起動時に読み込む

mod config;
mod endpoints;
mod engine;
mod error;
mod staging;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;

use config::{FunctionState, ProcessEnv, ServiceSettings};
use endpoints::handle_convert;

/// 関数のルート
const FUNCTION_ROUTE: &str = "/api/Fop";

fn router(state: Arc<FunctionState>) -> axum::Router {
    let max_body_bytes = state.settings.max_body_bytes;
    axum::Router::new()
        .route(
            FUNCTION_ROUTE,
            axum::routing::get(handle_convert).post(handle_convert),
        )
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let source = Arc::new(ProcessEnv);
    let settings = ServiceSettings::from_source(source.as_ref());
    tracing::info!(
        temp_dir = %settings.temp_dir.display(),
        max_body_bytes = settings.max_body_bytes,
        expose_errors = settings.expose_errors,
        "設定を読み込みました"
    );

    let addr = format!("0.0.0.0:{}", settings.port);
    let state = Arc::new(FunctionState::new(settings, source));
    let app = router(state);

    tracing::info!("FOP Functionを {} で起動します", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
