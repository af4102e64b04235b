//! # 関数のエラー型

use axum::http::StatusCode;

/// 500レスポンスでメッセージを伏せる場合の本文
const REDACTED_MESSAGE: &str = "変換処理に失敗しました";

/// 変換関数のエラー型。
#[derive(Debug, thiserror::Error)]
pub enum FunctionError {
    /// 署名が一致しない（`sig` 未指定を含む）
    #[error("署名が一致しません: expected={expected}, sig={supplied}")]
    SignatureMismatch {
        /// ボディから計算した署名
        expected: String,
        /// クエリで渡された署名（未指定なら空文字列）
        supplied: String,
    },
    /// 署名検証以外の失敗（エンジン初期化・入出力・FO文書の不正）
    #[error("{0}")]
    Conversion(String),
}

impl FunctionError {
    /// メッセージを汎用のものに置き換える。署名不一致はそのまま返す。
    pub fn redacted(self) -> Self {
        match self {
            FunctionError::Conversion(_) => FunctionError::Conversion(REDACTED_MESSAGE.to_string()),
            other => other,
        }
    }
}

impl From<fopfn_render::RenderError> for FunctionError {
    fn from(e: fopfn_render::RenderError) -> Self {
        FunctionError::Conversion(e.to_string())
    }
}

impl From<fopfn_crypto::CryptoError> for FunctionError {
    fn from(e: fopfn_crypto::CryptoError) -> Self {
        FunctionError::Conversion(e.to_string())
    }
}

impl From<std::io::Error> for FunctionError {
    fn from(e: std::io::Error) -> Self {
        FunctionError::Conversion(format!("入出力エラー: {e}"))
    }
}

impl axum::response::IntoResponse for FunctionError {
    fn into_response(self) -> axum::response::Response {
        match self {
            FunctionError::SignatureMismatch { .. } => StatusCode::FORBIDDEN.into_response(),
            FunctionError::Conversion(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
            }
        }
    }
}
