//! # レンダリングエンジンの遅延初期化
//!
//! エンジンファクトリと署名シークレットは最初のリクエストで一度だけ構築し、
//! 以降は全リクエストで共有する。同時に到着した最初のリクエスト群は
//! 一つの初期化の完了を待つ。
//!
//! 初期化に失敗した場合は結果を保持せず、次のリクエストで再試行する。

use std::sync::Arc;

use fopfn_render::EngineFactory;
use tokio::sync::OnceCell;

use crate::config::{ConfigSource, ENV_CONFIG_PATH, ENV_FONT_CACHE_PATH, ENV_PASSWORD_KEY};
use crate::error::FunctionError;

/// 初期化済みの変換ランタイム。
pub struct ConversionRuntime {
    pub factory: Arc<EngineFactory>,
    /// HMAC-SHA1の鍵
    pub secret: String,
}

impl ConversionRuntime {
    /// 設定元から構築する。シークレットは空であってはならない。
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self, FunctionError> {
        let config_path = required(source, ENV_CONFIG_PATH)?;
        let font_cache_path = required(source, ENV_FONT_CACHE_PATH)?;
        let secret = required(source, ENV_PASSWORD_KEY)?;

        let factory = EngineFactory::new(&config_path, font_cache_path)?;

        Ok(Self {
            factory: Arc::new(factory),
            secret,
        })
    }
}

fn required(source: &dyn ConfigSource, key: &str) -> Result<String, FunctionError> {
    source
        .get(key)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| FunctionError::Conversion(format!("環境変数 {key} が設定されていません")))
}

/// 変換ランタイムを保持するセル。
pub struct EngineCell {
    source: Arc<dyn ConfigSource>,
    cell: OnceCell<Arc<ConversionRuntime>>,
}

impl EngineCell {
    pub fn new(source: Arc<dyn ConfigSource>) -> Self {
        Self {
            source,
            cell: OnceCell::new(),
        }
    }

    /// 初期化済みのランタイムを返す。未初期化なら初期化する。
    pub async fn get(&self) -> Result<Arc<ConversionRuntime>, FunctionError> {
        self.cell
            .get_or_try_init(|| async {
                let runtime = ConversionRuntime::from_source(self.source.as_ref())?;
                tracing::info!(
                    font_cache = %runtime.factory.font_cache_path().display(),
                    strict_validation = runtime.factory.config().strict_validation,
                    "レンダリングエンジンを初期化しました"
                );
                Ok(Arc::new(runtime))
            })
            .await
            .map(Arc::clone)
    }

    #[cfg(test)]
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}
