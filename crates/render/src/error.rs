//! # レンダリングエンジンのエラー型

/// レンダリングエンジンのエラー型。
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// エンジン設定ファイルの読み込み・解析に失敗
    #[error("エンジン設定の読み込みに失敗: {0}")]
    Config(String),
    /// FO文書の構文・構造が不正
    #[error("FO文書の解析に失敗: {0}")]
    Fo(String),
    /// 長さ指定が解釈できない
    #[error("不正な長さ指定です: {0}")]
    InvalidLength(String),
    /// ページ領域にレイアウトできない
    #[error("レイアウトに失敗: {0}")]
    Layout(String),
    /// 未対応の出力形式
    #[error("未対応の出力形式です: {0}")]
    UnsupportedFormat(String),
    /// PDFの書き出しに失敗
    #[error("PDFの生成に失敗: {0}")]
    Pdf(String),
    /// 入出力エラー
    #[error("入出力エラー: {0}")]
    Io(#[from] std::io::Error),
}

/// レンダリングエンジンの `Result` 型
pub type Result<T> = std::result::Result<T, RenderError>;
