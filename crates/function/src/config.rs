//! # 関数設定・共有状態
//!
//! 環境変数からの設定読み込みと関数の共有状態の定義。
//!
//! エンジン関連の変数（`FOP_CONFIG_PATH` / `FOP_FONT_CACHE_PATH` / `PASSWORD_KEY`）は
//! 起動時ではなく最初のリクエストで読み込む（`engine` モジュール参照）。

use std::path::PathBuf;
use std::sync::Arc;

use crate::engine::EngineCell;

/// エンジン設定ファイルのパス
pub const ENV_CONFIG_PATH: &str = "FOP_CONFIG_PATH";
/// フォントキャッシュファイルのパス
pub const ENV_FONT_CACHE_PATH: &str = "FOP_FONT_CACHE_PATH";
/// リクエスト署名の共有シークレット
pub const ENV_PASSWORD_KEY: &str = "PASSWORD_KEY";
/// Azure Functionsカスタムハンドラーの待ち受けポート
pub const ENV_PORT: &str = "FUNCTIONS_CUSTOMHANDLER_PORT";
/// 一時ファイルの作成先
pub const ENV_TEMP_DIR: &str = "FOP_TEMP_DIR";
/// リクエストボディの上限（バイト）
pub const ENV_MAX_BODY_BYTES: &str = "FOP_MAX_BODY_BYTES";
/// 500レスポンスにエラーメッセージを含めるか
pub const ENV_EXPOSE_ERRORS: &str = "FOP_EXPOSE_ERRORS";

const DEFAULT_PORT: u16 = 7071;
const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// 設定値の取得元。
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// プロセスの環境変数。
pub struct ProcessEnv;

impl ConfigSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// 起動時に読み込むサービス設定。
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    pub port: u16,
    pub temp_dir: PathBuf,
    pub max_body_bytes: usize,
    /// `false` の場合、500レスポンスの本文は汎用メッセージになる
    pub expose_errors: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            temp_dir: std::env::temp_dir(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            expose_errors: true,
        }
    }
}

impl ServiceSettings {
    /// 設定を読み込む。解釈できない値は警告を出して既定値を使う。
    pub fn from_source(source: &dyn ConfigSource) -> Self {
        let defaults = Self::default();
        Self {
            port: parse_or(source, ENV_PORT, defaults.port),
            temp_dir: source
                .get(ENV_TEMP_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_dir),
            max_body_bytes: parse_or(source, ENV_MAX_BODY_BYTES, defaults.max_body_bytes),
            expose_errors: parse_or(source, ENV_EXPOSE_ERRORS, defaults.expose_errors),
        }
    }
}

fn parse_or<T: std::str::FromStr + std::fmt::Display>(
    source: &dyn ConfigSource,
    key: &str,
    default: T,
) -> T {
    match source.get(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default = %default, "設定値を解釈できないため既定値を使用します");
            default
        }),
        None => default,
    }
}

/// 関数の共有状態。
pub struct FunctionState {
    pub settings: ServiceSettings,
    /// 遅延初期化されるレンダリングエンジン
    pub engine: EngineCell,
}

impl FunctionState {
    pub fn new(settings: ServiceSettings, source: Arc<dyn ConfigSource>) -> Self {
        Self {
            settings,
            engine: EngineCell::new(source),
        }
    }
}

/// テスト用のマップ形式の設定。
#[cfg(test)]
#[derive(Default)]
pub struct MapSource(std::sync::RwLock<std::collections::HashMap<String, String>>);

#[cfg(test)]
impl MapSource {
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let source = Self::default();
        for (key, value) in pairs {
            source.set(key, value);
        }
        source
    }

    pub fn set(&self, key: &str, value: &str) {
        self.0
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

#[cfg(test)]
impl ConfigSource for MapSource {
    fn get(&self, key: &str) -> Option<String> {
        self.0.read().unwrap().get(key).cloned()
    }
}
